//! Connector assembling contract-chain strategies.

use std::sync::Arc;

use async_trait::async_trait;
use chainevents_core::{ChainStrategy, Connector, Error, ListenerConfig, Network, Result, StorageFetcher};

use crate::client::{EvmClientFactory, EvmRpcClient};
use crate::poller::{LogBatch, LogPoller};
use crate::processor::EvmProcessor;
use crate::protocol::ContractProtocol;
use crate::protocols::{
    AaveProtocol, AaveStorageFetcher, CompoundProtocol, CompoundStorageFetcher, Erc20Protocol, Erc721Protocol,
    MolochProtocol, MolochStorageFetcher,
};
use crate::source_map::EventSourceMap;
use crate::subscriber::{PollConfig, PollingSubscriber};

/// Opens one JSON-RPC client per connection and builds the strategy for a
/// contract network. Governance networks backfill from contract storage;
/// token networks replay logs.
pub struct EvmConnector {
    network: Network,
    factory: Arc<dyn EvmClientFactory>,
}

impl EvmConnector {
    pub fn new(network: Network, factory: Arc<dyn EvmClientFactory>) -> Result<Self> {
        if !network.is_contract_based() {
            return Err(Error::Config(format!("{network} is not a contract network")));
        }
        Ok(Self { network, factory })
    }
}

#[async_trait]
impl Connector for EvmConnector {
    type Raw = LogBatch;

    fn network(&self) -> Network {
        self.network
    }

    async fn connect(&self, config: &ListenerConfig) -> Result<ChainStrategy<LogBatch>> {
        let client = self.factory.connect(&config.url).await?;
        let head = client.block_number().await?;
        tracing::info!(
            chain = %config.chain,
            network = %self.network,
            head,
            contracts = config.contract_addresses.len(),
            "Connected to node"
        );

        let primary = config
            .contract_addresses
            .first()
            .ok_or_else(|| Error::Config(format!("{} requires a contract address", self.network)))?;
        let chain = config.chain.as_str();
        match self.network {
            Network::Compound => {
                let storage = Arc::new(CompoundStorageFetcher::new(chain, client.clone(), primary));
                Ok(assemble(config, client, CompoundProtocol::new())?.backfill_from_storage(storage))
            }
            Network::Aave => {
                let storage = Arc::new(AaveStorageFetcher::new(chain, client.clone(), primary));
                Ok(assemble(config, client, AaveProtocol::new())?.backfill_from_storage(storage))
            }
            Network::Moloch => {
                let storage: Arc<dyn StorageFetcher> =
                    Arc::new(MolochStorageFetcher::new(chain, client.clone(), primary));
                let protocol = MolochProtocol::new(client.clone());
                Ok(assemble(config, client, protocol)?.backfill_from_storage(storage))
            }
            Network::Erc20 => {
                let protocol = Erc20Protocol::new(client.clone(), config.balance_transfer_threshold_permill);
                assemble(config, client, protocol)
            }
            Network::Erc721 => assemble(config, client, Erc721Protocol::new()),
            Network::Substrate => Err(Error::Config("substrate is not a contract network".into())),
        }
    }
}

/// Processor, subscriber and poller for `protocol`, all reading the
/// configured contracts through one client.
fn assemble<P: ContractProtocol>(
    config: &ListenerConfig,
    client: Arc<dyn EvmRpcClient>,
    protocol: P,
) -> Result<ChainStrategy<LogBatch>> {
    let sources = Arc::new(EventSourceMap::for_contracts(
        &config.contract_addresses,
        &protocol.topics(),
    )?);
    let chain = config.chain.as_str();
    Ok(ChainStrategy::new(
        Arc::new(EvmProcessor::new(chain, protocol)),
        Arc::new(PollingSubscriber::new(
            chain,
            client.clone(),
            sources.clone(),
            PollConfig::from(config),
        )),
        Arc::new(LogPoller::new(chain, client, sources)),
    ))
}
