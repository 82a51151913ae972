//! ERC-20 token transfers and approvals.

use std::sync::Arc;

use alloy_primitives::{B256, U256};
use alloy_sol_types::{sol, SolEvent};
use async_trait::async_trait;
use chainevents_core::payload::{Erc20Event, Erc20Kind};
use chainevents_core::{CanonicalEvent, Error, Network, Result};

use crate::abi::{address, call, decode_log};
use crate::client::{EvmRpcClient, RawLog};
use crate::protocol::ContractProtocol;

sol! {
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);

        function totalSupply() external view returns (uint256);
    }
}

const SIGNATURES: [(B256, Erc20Kind); 2] = [
    (IERC20::Transfer::SIGNATURE_HASH, Erc20Kind::Transfer),
    (IERC20::Approval::SIGNATURE_HASH, Erc20Kind::Approval),
];

/// Token events. With a threshold set, transfers moving less than that share
/// of the token supply are dropped.
pub struct Erc20Protocol {
    client: Arc<dyn EvmRpcClient>,
    threshold_permill: Option<u64>,
}

impl Erc20Protocol {
    /// `threshold_permill`: minimum share of `totalSupply`, in parts per
    /// million, for a transfer to be delivered.
    pub fn new(client: Arc<dyn EvmRpcClient>, threshold_permill: Option<u64>) -> Self {
        Self {
            client,
            threshold_permill,
        }
    }

    async fn meets_threshold(&self, token: &str, value: U256) -> Result<bool> {
        let permill = match self.threshold_permill {
            None | Some(0) => return Ok(true),
            Some(permill) => permill,
        };
        let supply = call(self.client.as_ref(), token, &IERC20::totalSupplyCall {}).await?._0;
        let scaled = value.saturating_mul(U256::from(1_000_000u64)) / U256::from(permill);
        Ok(scaled >= supply)
    }
}

#[async_trait]
impl ContractProtocol for Erc20Protocol {
    type Kind = Erc20Kind;

    fn network(&self) -> Network {
        Network::Erc20
    }

    fn topics(&self) -> Vec<B256> {
        SIGNATURES.iter().map(|(topic, _)| *topic).collect()
    }

    fn classify(&self, log: &RawLog) -> Option<Erc20Kind> {
        let topic0 = log.topic0()?;
        SIGNATURES
            .iter()
            .find(|(topic, _)| *topic == topic0)
            .map(|(_, kind)| *kind)
    }

    async fn enrich(
        &self,
        chain: &str,
        block: u64,
        log: &RawLog,
        kind: Erc20Kind,
    ) -> Result<Option<CanonicalEvent>> {
        let token_address = log.address.to_lowercase();
        let enriched = async {
            let event = match kind {
                Erc20Kind::Transfer => {
                    let ev: IERC20::Transfer = decode_log(log)?;
                    if !self.meets_threshold(&token_address, ev.value).await? {
                        return Ok(None);
                    }
                    let (from, to) = (address(&ev.from), address(&ev.to));
                    let parties = vec![from.clone(), to.clone()];
                    CanonicalEvent::new(
                        chain,
                        block,
                        Erc20Event::Transfer {
                            token_address: token_address.clone(),
                            from,
                            to,
                            value: ev.value.to_string(),
                        },
                    )
                    .exclude(parties)
                }
                Erc20Kind::Approval => {
                    let ev: IERC20::Approval = decode_log(log)?;
                    CanonicalEvent::new(
                        chain,
                        block,
                        Erc20Event::Approval {
                            token_address: token_address.clone(),
                            owner: address(&ev.owner),
                            spender: address(&ev.spender),
                            value: ev.value.to_string(),
                        },
                    )
                }
            };
            Ok::<_, Error>(Some(event))
        };
        enriched.await.map_err(|e| Error::enrich(kind, e.to_string()))
    }
}
