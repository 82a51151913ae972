//! Connector assembling the runtime-events strategy.

use std::sync::Arc;

use async_trait::async_trait;
use chainevents_core::{ChainStrategy, Connector, ListenerConfig, Network, Result};

use crate::api::SubstrateApiFactory;
use crate::enricher::EnricherConfig;
use crate::poller::SubstratePoller;
use crate::processor::SubstrateProcessor;
use crate::storage::SubstrateStorageFetcher;
use crate::subscriber::SubstrateSubscriber;
use crate::types::Block;

/// Opens one client per connection and shares it across the processor,
/// push subscriber, poller and storage fetcher. Backfill replays blocks.
pub struct SubstrateConnector {
    factory: Arc<dyn SubstrateApiFactory>,
}

impl SubstrateConnector {
    pub fn new(factory: Arc<dyn SubstrateApiFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl Connector for SubstrateConnector {
    type Raw = Block;

    fn network(&self) -> Network {
        Network::Substrate
    }

    async fn connect(&self, config: &ListenerConfig) -> Result<ChainStrategy<Block>> {
        let api = self.factory.connect(&config.url).await?;
        let version = api.runtime_version().await?;
        tracing::info!(
            chain = %config.chain,
            spec_name = %version.spec_name,
            spec_version = version.spec_version,
            "Connected to runtime"
        );

        let enricher = EnricherConfig {
            balance_transfer_threshold_permill: config.balance_transfer_threshold_permill,
        };
        let chain = config.chain.as_str();
        Ok(ChainStrategy::new(
            Arc::new(SubstrateProcessor::new(chain, api.clone(), enricher)),
            Arc::new(SubstrateSubscriber::new(chain, api.clone())),
            Arc::new(SubstratePoller::new(chain, api.clone(), config.archival)),
        )
        .with_storage(Arc::new(SubstrateStorageFetcher::new(chain, api))))
    }
}
