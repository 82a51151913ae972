//! Push subscription over the node's new-heads stream.

use std::sync::Arc;

use async_trait::async_trait;
use chainevents_core::{EventSubscriber, Result, SubscriptionSlot, SubscriptionToken};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::api::SubstrateApi;
use crate::types::Block;

/// Fetches the full block behind each new head and forwards it in delivery order.
pub struct SubstrateSubscriber {
    api: Arc<dyn SubstrateApi>,
    slot: SubscriptionSlot,
    span: tracing::Span,
}

impl SubstrateSubscriber {
    pub fn new(chain: &str, api: Arc<dyn SubstrateApi>) -> Self {
        Self {
            api,
            slot: SubscriptionSlot::new(),
            span: tracing::info_span!("subscriber", chain, network = "substrate"),
        }
    }
}

#[async_trait]
impl EventSubscriber<Block> for SubstrateSubscriber {
    async fn subscribe(&self, sink: mpsc::UnboundedSender<Block>) -> Result<SubscriptionToken> {
        let token = match self.slot.claim() {
            Ok(token) => token,
            Err(existing) => {
                tracing::info!(parent: &self.span, "Already subscribed");
                return Ok(existing);
            }
        };

        let mut heads = match self.api.subscribe_new_heads().await {
            Ok(heads) => heads,
            Err(e) => {
                self.slot.release();
                return Err(e);
            }
        };

        let api = self.api.clone();
        let stop = token.clone();
        tokio::spawn(
            async move {
                tracing::info!("Subscribed to new heads");
                loop {
                    tokio::select! {
                        biased;
                        _ = stop.cancelled() => break,
                        header = heads.recv() => {
                            let Some(header) = header else {
                                tracing::warn!("New-heads stream ended");
                                break;
                            };
                            match api.block(&header.hash).await {
                                Ok(block) => {
                                    if sink.send(block).is_err() {
                                        tracing::debug!("Block sink closed");
                                        break;
                                    }
                                }
                                Err(e) => tracing::warn!(
                                    block = header.number,
                                    error = %e,
                                    "Failed to fetch new block"
                                ),
                            }
                        }
                    }
                }
                stop.cancel();
                tracing::info!("New-heads subscription stopped");
            }
            .instrument(self.span.clone()),
        );

        Ok(token)
    }

    async fn unsubscribe(&self) {
        if self.slot.release() {
            tracing::info!(parent: &self.span, "Unsubscribed from new heads");
        }
    }

    fn is_subscribed(&self) -> bool {
        self.slot.is_active()
    }
}
