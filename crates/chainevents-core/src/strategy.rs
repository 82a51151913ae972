//! Pluggable pieces a listener is assembled from.
//!
//! A [`Connector`] connects to one kind of chain and produces a
//! [`ChainStrategy`]: the processor, subscriber, poller and optional storage
//! fetcher that share a single chain client. The listener only ever talks to
//! these traits.

use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ListenerConfig;
use crate::entity::EntityKind;
use crate::error::{Error, Result};
use crate::event::CanonicalEvent;
use crate::types::{DisconnectedRange, Network};

/// A chain-native item (block, log batch) before processing.
pub trait RawItem: Send + Sync + 'static {
    /// Height the item belongs to.
    fn block_number(&self) -> u64;
}

/// Turns raw items into canonical events.
#[async_trait]
pub trait EventProcessor<R: RawItem>: Send + Sync {
    /// Classify and enrich every record in `raw`. Unknown or unenrichable
    /// records are logged and skipped, never returned as errors.
    async fn process(&self, raw: &R) -> Vec<CanonicalEvent>;

    /// Highest block seen so far.
    fn last_block(&self) -> Option<u64>;
}

/// Fetches historical raw items over a block range.
#[async_trait]
pub trait EventPoller<R: RawItem>: Send + Sync {
    /// Current chain head.
    async fn head(&self) -> Result<u64>;

    /// Raw items in `range`, oldest first, requested `chunk_size` blocks at a time.
    async fn poll(&self, range: &DisconnectedRange, chunk_size: u64) -> Result<Vec<R>>;
}

/// Delivers new raw items as they appear.
#[async_trait]
pub trait EventSubscriber<R: RawItem>: Send + Sync {
    /// Start delivering into `sink`. Subscribing twice returns the existing token.
    async fn subscribe(&self, sink: mpsc::UnboundedSender<R>) -> Result<SubscriptionToken>;

    /// Stop delivery. No-op when not subscribed.
    async fn unsubscribe(&self);

    fn is_subscribed(&self) -> bool;
}

/// Reconstructs governance history from current contract or runtime storage.
#[async_trait]
pub trait StorageFetcher: Send + Sync {
    /// Events for every entity in `range` (`None` = everything available).
    async fn fetch(
        &self,
        range: Option<&DisconnectedRange>,
        fetch_all_completed: bool,
    ) -> Result<Vec<CanonicalEvent>>;

    /// Events for a single entity.
    async fn fetch_one(&self, id: &str, entity: EntityKind) -> Result<Vec<CanonicalEvent>>;
}

/// Where backfill reads history from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillSource {
    /// Replay raw items through the poller and processor.
    Poller,
    /// Ask the storage fetcher for the chunk's range.
    Storage,
}

/// Everything a listener needs for one connected chain.
pub struct ChainStrategy<R: RawItem> {
    pub processor: Arc<dyn EventProcessor<R>>,
    pub subscriber: Arc<dyn EventSubscriber<R>>,
    pub poller: Arc<dyn EventPoller<R>>,
    pub storage: Option<Arc<dyn StorageFetcher>>,
    pub backfill: BackfillSource,
}

impl<R: RawItem> ChainStrategy<R> {
    pub fn new(
        processor: Arc<dyn EventProcessor<R>>,
        subscriber: Arc<dyn EventSubscriber<R>>,
        poller: Arc<dyn EventPoller<R>>,
    ) -> Self {
        Self {
            processor,
            subscriber,
            poller,
            storage: None,
            backfill: BackfillSource::Poller,
        }
    }

    /// Attach a storage fetcher (used for migrations only).
    pub fn with_storage(mut self, storage: Arc<dyn StorageFetcher>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Attach a storage fetcher and use it for backfill.
    pub fn backfill_from_storage(mut self, storage: Arc<dyn StorageFetcher>) -> Self {
        self.storage = Some(storage);
        self.backfill = BackfillSource::Storage;
        self
    }
}

impl<R: RawItem> Clone for ChainStrategy<R> {
    fn clone(&self) -> Self {
        Self {
            processor: self.processor.clone(),
            subscriber: self.subscriber.clone(),
            poller: self.poller.clone(),
            storage: self.storage.clone(),
            backfill: self.backfill,
        }
    }
}

/// Connects to a chain and assembles its strategy.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Raw: RawItem;

    fn network(&self) -> Network;

    /// One connection attempt; the listener applies the retry policy.
    async fn connect(&self, config: &ListenerConfig) -> Result<ChainStrategy<Self::Raw>>;
}

// ─── Subscription handles ─────────────────────────────────────────────────────

/// Handle to a running subscription. Cancelling it stops delivery.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionToken {
    cancel: CancellationToken,
}

impl SubscriptionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// The underlying cancellation token, for `select!` loops.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// At most one live subscription, shared by subscriber implementations.
#[derive(Debug, Default)]
pub struct SubscriptionSlot {
    active: Mutex<Option<SubscriptionToken>>,
}

impl SubscriptionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current token, if a subscription is live.
    pub fn current(&self) -> Option<SubscriptionToken> {
        self.lock().as_ref().filter(|t| !t.is_cancelled()).cloned()
    }

    /// Claim the slot. Returns `Err(existing)` if a subscription is live.
    pub fn claim(&self) -> std::result::Result<SubscriptionToken, SubscriptionToken> {
        let mut slot = self.lock();
        if let Some(existing) = slot.as_ref().filter(|t| !t.is_cancelled()) {
            return Err(existing.clone());
        }
        let token = SubscriptionToken::new();
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Cancel and clear the live subscription. Returns `false` if none was live.
    pub fn release(&self) -> bool {
        match self.lock().take() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.current().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<SubscriptionToken>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ─── Reconnect range discovery ────────────────────────────────────────────────

/// Tells a listener which blocks it missed while disconnected.
#[async_trait]
pub trait ReconnectRangeSource: Send + Sync {
    async fn discover(&self, chain: &str) -> Result<Option<DisconnectedRange>>;
}

/// Adapter returned by [`reconnect_range_fn`].
pub struct FnRangeSource<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ReconnectRangeSource for FnRangeSource<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<DisconnectedRange>>> + Send,
{
    async fn discover(&self, chain: &str) -> Result<Option<DisconnectedRange>> {
        (self.f)(chain.to_string()).await
    }
}

/// Wrap an async closure as a [`ReconnectRangeSource`].
pub fn reconnect_range_fn<F, Fut>(f: F) -> Arc<dyn ReconnectRangeSource>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<DisconnectedRange>>> + Send + 'static,
{
    Arc::new(FnRangeSource { f })
}

/// Source used when no range is discoverable; always reports a fixed answer.
pub struct StaticRangeSource(pub Option<DisconnectedRange>);

#[async_trait]
impl ReconnectRangeSource for StaticRangeSource {
    async fn discover(&self, _chain: &str) -> Result<Option<DisconnectedRange>> {
        Ok(self.0)
    }
}

impl<R: RawItem> ChainStrategy<R> {
    /// The storage fetcher backfill should use, if the strategy is storage-based.
    pub fn backfill_storage(&self) -> Result<Option<Arc<dyn StorageFetcher>>> {
        match (self.backfill, &self.storage) {
            (BackfillSource::Poller, _) => Ok(None),
            (BackfillSource::Storage, Some(s)) => Ok(Some(s.clone())),
            (BackfillSource::Storage, None) => Err(Error::Config(
                "storage backfill selected without a storage fetcher".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_allows_one_live_subscription() {
        let slot = SubscriptionSlot::new();
        let first = slot.claim().unwrap();
        let again = slot.claim().unwrap_err();
        assert!(!again.is_cancelled());
        assert!(slot.is_active());

        assert!(slot.release());
        assert!(first.is_cancelled());
        assert!(!slot.release());
        assert!(slot.claim().is_ok());
    }

    #[tokio::test]
    async fn closure_range_source() {
        let source = reconnect_range_fn(|chain: String| async move {
            Ok((chain == "edgeware").then(|| DisconnectedRange::from_block(42)))
        });
        assert_eq!(
            source.discover("edgeware").await.unwrap(),
            Some(DisconnectedRange::from_block(42))
        );
        assert_eq!(source.discover("kusama").await.unwrap(), None);
    }
}
