//! Adaptive-interval polling subscription.
//!
//! Contract chains are followed by polling the head: on start the subscriber
//! samples recent block timestamps to pick an interval close to the chain's
//! block time, then on each tick fetches the tracked logs of every new block.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chainevents_core::{
    EventSubscriber, ListenerConfig, Result, SubscriptionSlot, SubscriptionToken,
};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::client::EvmRpcClient;
use crate::poller::{fetch_batches, LogBatch};
use crate::source_map::EventSourceMap;

/// Poll interval settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Fixed interval; `None` = adaptive.
    pub interval_override: Option<Duration>,
    /// Recent blocks sampled for the adaptive interval.
    pub sample_size: u64,
    /// Used when the sampled blocks share a timestamp.
    pub fallback: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_override: None,
            sample_size: 10,
            fallback: Duration::from_secs(12),
        }
    }
}

impl From<&ListenerConfig> for PollConfig {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            interval_override: config.poll_interval_ms.map(Duration::from_millis),
            sample_size: config.adaptive_sample_size,
            fallback: Duration::from_millis(config.default_poll_interval_ms),
        }
    }
}

/// The largest gap between consecutive timestamps among the last
/// `sample_size` blocks, or the fallback when that gap is zero.
pub async fn compute_poll_interval(client: &dyn EvmRpcClient, config: &PollConfig) -> Result<Duration> {
    if let Some(fixed) = config.interval_override {
        return Ok(fixed);
    }
    let head = client.block_number().await?;
    let first = head.saturating_sub(config.sample_size.saturating_sub(1));

    let mut timestamps = Vec::new();
    for number in first..=head {
        if let Some(block) = client.block(number).await? {
            timestamps.push(block.timestamp);
        }
    }
    let max_delta = timestamps
        .windows(2)
        .map(|w| w[1].saturating_sub(w[0]).max(0))
        .max()
        .unwrap_or(0);

    if max_delta == 0 {
        Ok(config.fallback)
    } else {
        Ok(Duration::from_secs(max_delta.unsigned_abs()))
    }
}

/// Tracks the last-seen head and fetches the logs of blocks past it.
pub struct LogFollower {
    client: Arc<dyn EvmRpcClient>,
    sources: Arc<EventSourceMap>,
    last_seen: u64,
}

impl LogFollower {
    pub fn new(client: Arc<dyn EvmRpcClient>, sources: Arc<EventSourceMap>, last_seen: u64) -> Self {
        Self {
            client,
            sources,
            last_seen,
        }
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    /// One tick: batches for `(last_seen, head]`, ascending.
    ///
    /// The last-seen head only advances once the logs are fetched, so a
    /// failed tick is retried in full by the next one.
    pub async fn poll_once(&mut self) -> Result<Vec<LogBatch>> {
        let head = self.client.block_number().await?;
        if head <= self.last_seen {
            return Ok(Vec::new());
        }
        let batches = fetch_batches(self.client.as_ref(), &self.sources, self.last_seen + 1..=head).await?;
        self.last_seen = head;
        Ok(batches)
    }
}

/// Polls the head at an adaptive interval and forwards new log batches.
pub struct PollingSubscriber {
    client: Arc<dyn EvmRpcClient>,
    sources: Arc<EventSourceMap>,
    config: PollConfig,
    slot: SubscriptionSlot,
    span: tracing::Span,
}

impl PollingSubscriber {
    pub fn new(
        chain: &str,
        client: Arc<dyn EvmRpcClient>,
        sources: Arc<EventSourceMap>,
        config: PollConfig,
    ) -> Self {
        Self {
            client,
            sources,
            config,
            slot: SubscriptionSlot::new(),
            span: tracing::info_span!("subscriber", chain, network = "evm"),
        }
    }
}

#[async_trait]
impl EventSubscriber<LogBatch> for PollingSubscriber {
    async fn subscribe(&self, sink: mpsc::UnboundedSender<LogBatch>) -> Result<SubscriptionToken> {
        let token = match self.slot.claim() {
            Ok(token) => token,
            Err(existing) => {
                tracing::info!(parent: &self.span, "Already subscribed");
                return Ok(existing);
            }
        };

        let start = async {
            let interval = compute_poll_interval(self.client.as_ref(), &self.config).await?;
            let head = self.client.block_number().await?;
            Ok::<_, chainevents_core::Error>((interval, head))
        };
        let (interval, head) = match start.await {
            Ok(started) => started,
            Err(e) => {
                self.slot.release();
                return Err(e);
            }
        };

        let mut follower = LogFollower::new(self.client.clone(), self.sources.clone(), head);
        let stop = token.clone();
        tokio::spawn(
            async move {
                tracing::info!(interval_ms = interval.as_millis() as u64, head, "Polling for new blocks");
                'poll: loop {
                    tokio::select! {
                        biased;
                        _ = stop.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {}
                    }
                    match follower.poll_once().await {
                        Ok(batches) => {
                            for batch in batches {
                                if sink.send(batch).is_err() {
                                    tracing::debug!("Log sink closed");
                                    break 'poll;
                                }
                            }
                        }
                        Err(e) => tracing::warn!(
                            last_seen = follower.last_seen(),
                            error = %e,
                            "Poll tick failed"
                        ),
                    }
                }
                stop.cancel();
                tracing::info!("Polling stopped");
            }
            .instrument(self.span.clone()),
        );

        Ok(token)
    }

    async fn unsubscribe(&self) {
        if self.slot.release() {
            tracing::info!(parent: &self.span, "Unsubscribed from block polling");
        }
    }

    fn is_subscribed(&self) -> bool {
        self.slot.is_active()
    }
}
