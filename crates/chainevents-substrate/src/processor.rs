//! Block → canonical events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chainevents_core::{CanonicalEvent, EventProcessor};
use tracing::Instrument;

use crate::api::SubstrateApi;
use crate::classifier::{classify_event, classify_extrinsic};
use crate::enricher::{Enricher, EnricherConfig, RawRecord};
use crate::types::Block;

/// Classifies and enriches every event and successful extrinsic of a block.
pub struct SubstrateProcessor {
    enricher: Enricher,
    /// Highest processed block plus one; zero until the first block.
    last_block: AtomicU64,
    span: tracing::Span,
}

impl SubstrateProcessor {
    pub fn new(chain: &str, api: Arc<dyn SubstrateApi>, config: EnricherConfig) -> Self {
        Self {
            enricher: Enricher::new(chain, api, config),
            last_block: AtomicU64::new(0),
            span: tracing::info_span!("processor", chain, network = "substrate"),
        }
    }
}

#[async_trait]
impl EventProcessor<Block> for SubstrateProcessor {
    async fn process(&self, block: &Block) -> Vec<CanonicalEvent> {
        let number = block.header.number;
        self.last_block
            .fetch_max(number.saturating_add(1), Ordering::SeqCst);

        async {
            let mut out = Vec::new();

            for event in &block.events {
                let Some(kind) = classify_event(&block.version, &event.section, &event.method) else {
                    tracing::trace!(block = number, section = %event.section, method = %event.method, "Skipping untracked event");
                    continue;
                };
                match self.enricher.enrich(&block.header, kind, RawRecord::Event(event)).await {
                    Ok(Some(ev)) => out.push(ev),
                    Ok(None) => tracing::trace!(block = number, kind = %kind, "Event below delivery threshold"),
                    Err(e) => tracing::warn!(
                        block = number,
                        section = %event.section,
                        method = %event.method,
                        error = %e,
                        "Event enrichment failed"
                    ),
                }
            }

            for extrinsic in block.extrinsics.iter().filter(|x| x.success) {
                let Some(kind) = classify_extrinsic(&extrinsic.section, &extrinsic.method) else {
                    continue;
                };
                match self
                    .enricher
                    .enrich(&block.header, kind, RawRecord::Extrinsic(extrinsic))
                    .await
                {
                    Ok(Some(ev)) => out.push(ev),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(
                        block = number,
                        section = %extrinsic.section,
                        method = %extrinsic.method,
                        error = %e,
                        "Extrinsic enrichment failed"
                    ),
                }
            }

            tracing::debug!(block = number, events = out.len(), "Processed block");
            out
        }
        .instrument(self.span.clone())
        .await
    }

    fn last_block(&self) -> Option<u64> {
        self.last_block.load(Ordering::SeqCst).checked_sub(1)
    }
}
