//! Listener lifecycle, backfill and live delivery against an in-memory chain.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chainevents_core::payload::SubstrateEvent;
use chainevents_core::{
    reconnect_range_fn, CanonicalEvent, ChainListener, ChainStrategy, Connector, DisconnectedRange,
    Error, EventHandler, EventPoller, EventProcessor, EventSubscriber, HandlerChain,
    ListenerBuilder, ListenerConfig, ListenerState, Listener, Network, RawItem,
    ReconfigureRequest, Result, StaticRangeSource, SubscriptionSlot, SubscriptionToken,
};
use serde_json::Value;
use tokio::sync::{mpsc, Notify};

// ─── Mock chain ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct MockBlock {
    number: u64,
}

impl RawItem for MockBlock {
    fn block_number(&self) -> u64 {
        self.number
    }
}

#[derive(Default)]
struct MockChain {
    head: AtomicU64,
    connects: AtomicU32,
    failing_connects: AtomicU32,
    polls: Mutex<Vec<(u64, u64)>>,
    fail_poll_from: Mutex<Option<u64>>,
    gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
    sink: Mutex<Option<mpsc::UnboundedSender<MockBlock>>>,
    slot: SubscriptionSlot,
}

impl MockChain {
    fn with_head(head: u64) -> Arc<Self> {
        let chain = Self::default();
        chain.head.store(head, Ordering::SeqCst);
        Arc::new(chain)
    }

    fn push(&self, number: u64) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => sink.send(MockBlock { number }).is_ok(),
            None => false,
        }
    }

    /// Node drops the stream without the subscriber being told.
    fn end_stream(&self) {
        self.sink.lock().unwrap().take();
    }

    fn polls(&self) -> Vec<(u64, u64)> {
        self.polls.lock().unwrap().clone()
    }
}

fn reward(block: u64) -> CanonicalEvent {
    CanonicalEvent::new(
        "edgeware",
        block,
        SubstrateEvent::Reward {
            validator: None,
            amount: block.to_string(),
        },
    )
}

struct MockProcessor {
    last: AtomicU64,
}

#[async_trait]
impl EventProcessor<MockBlock> for MockProcessor {
    async fn process(&self, raw: &MockBlock) -> Vec<CanonicalEvent> {
        self.last.fetch_max(raw.number + 1, Ordering::SeqCst);
        vec![reward(raw.number)]
    }

    fn last_block(&self) -> Option<u64> {
        self.last.load(Ordering::SeqCst).checked_sub(1)
    }
}

struct MockPoller(Arc<MockChain>);

#[async_trait]
impl EventPoller<MockBlock> for MockPoller {
    async fn head(&self) -> Result<u64> {
        Ok(self.0.head.load(Ordering::SeqCst))
    }

    async fn poll(&self, range: &DisconnectedRange, _chunk_size: u64) -> Result<Vec<MockBlock>> {
        let end = range.end_or(self.0.head.load(Ordering::SeqCst));
        self.0.polls.lock().unwrap().push((range.start_block, end));

        let gate = self.0.gate.lock().unwrap().clone();
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }
        if let Some(from) = *self.0.fail_poll_from.lock().unwrap() {
            if range.start_block >= from {
                return Err(Error::Rpc("node went away".into()));
            }
        }
        Ok((range.start_block..=end).map(|number| MockBlock { number }).collect())
    }
}

struct MockSubscriber(Arc<MockChain>);

#[async_trait]
impl EventSubscriber<MockBlock> for MockSubscriber {
    async fn subscribe(&self, sink: mpsc::UnboundedSender<MockBlock>) -> Result<SubscriptionToken> {
        match self.0.slot.claim() {
            Ok(token) => {
                *self.0.sink.lock().unwrap() = Some(sink);
                Ok(token)
            }
            Err(existing) => Ok(existing),
        }
    }

    async fn unsubscribe(&self) {
        if self.0.slot.release() {
            self.0.sink.lock().unwrap().take();
        }
    }

    fn is_subscribed(&self) -> bool {
        self.0.slot.is_active()
    }
}

struct MockConnector(Arc<MockChain>);

#[async_trait]
impl Connector for MockConnector {
    type Raw = MockBlock;

    fn network(&self) -> Network {
        Network::Substrate
    }

    async fn connect(&self, _config: &ListenerConfig) -> Result<ChainStrategy<MockBlock>> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        if self.0.failing_connects.load(Ordering::SeqCst) > 0 {
            self.0.failing_connects.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Rpc("connection refused".into()));
        }
        Ok(ChainStrategy::new(
            Arc::new(MockProcessor {
                last: AtomicU64::new(0),
            }),
            Arc::new(MockSubscriber(self.0.clone())),
            Arc::new(MockPoller(self.0.clone())),
        ))
    }
}

#[derive(Default)]
struct Recorder {
    blocks: Mutex<Vec<u64>>,
}

impl Recorder {
    fn blocks(&self) -> Vec<u64> {
        self.blocks.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for Recorder {
    async fn handle(&self, event: &CanonicalEvent, previous: Option<Value>) -> Result<Option<Value>> {
        self.blocks.lock().unwrap().push(event.block_number);
        Ok(previous)
    }

    fn name(&self) -> &str {
        "recorder"
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("chainevents_core=debug")
        .with_test_writer()
        .try_init();
}

fn listener(chain: &Arc<MockChain>, config: ListenerConfig) -> (Listener<MockConnector>, Arc<Recorder>) {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let handlers = Arc::new(HandlerChain::new());
    handlers.register(recorder.clone());
    let listener = Listener::new(MockConnector(chain.clone()), config, handlers).unwrap();
    (listener, recorder)
}

fn fast_config() -> ListenerBuilder {
    ListenerBuilder::new().connect_retry(3, 1)
}

async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

// ─── Lifecycle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn subscribe_requires_init() {
    let chain = MockChain::with_head(100);
    let (listener, _) = listener(&chain, fast_config().build_config().unwrap());

    let err = listener.subscribe().await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    assert_eq!(listener.state(), ListenerState::Uninitialized);

    listener.init().await.unwrap();
    assert_eq!(listener.state(), ListenerState::Initialized);
    assert_eq!(listener.chain(), "edgeware");
    assert_eq!(listener.network(), Network::Substrate);
}

#[tokio::test]
async fn unsubscribe_is_idempotent() {
    let chain = MockChain::with_head(100);
    let (listener, _) = listener(
        &chain,
        fast_config().skip_catchup(true).build_config().unwrap(),
    );
    listener.unsubscribe().await;
    assert_eq!(listener.state(), ListenerState::Uninitialized);

    listener.init().await.unwrap();
    listener.subscribe().await.unwrap();
    assert_eq!(listener.state(), ListenerState::Subscribed);
    listener.subscribe().await.unwrap();
    assert_eq!(listener.state(), ListenerState::Subscribed);

    listener.unsubscribe().await;
    listener.unsubscribe().await;
    assert_eq!(listener.state(), ListenerState::Unsubscribed);
    assert!(!chain.slot.is_active());

    listener.subscribe().await.unwrap();
    assert_eq!(listener.state(), ListenerState::Subscribed);
}

#[tokio::test]
async fn connect_failures_exhaust_retry_budget() {
    let chain = MockChain::with_head(100);
    chain.failing_connects.store(10, Ordering::SeqCst);
    let (listener, _) = listener(&chain, fast_config().build_config().unwrap());

    let err = listener.init().await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, Error::Connection { attempts: 3, .. }));
    assert_eq!(chain.connects.load(Ordering::SeqCst), 3);
    assert_eq!(listener.state(), ListenerState::Uninitialized);
    assert!(listener.storage_fetcher().is_none());
}

#[tokio::test]
async fn connect_succeeds_after_transient_failure() {
    let chain = MockChain::with_head(100);
    chain.failing_connects.store(1, Ordering::SeqCst);
    let (listener, _) = listener(&chain, fast_config().build_config().unwrap());
    listener.init().await.unwrap();
    assert_eq!(chain.connects.load(Ordering::SeqCst), 2);
}

// ─── Backfill ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn backfill_window_is_clipped() {
    let chain = MockChain::with_head(10_000);
    let (listener, recorder) = listener(&chain, fast_config().build_config().unwrap());
    let listener = listener.with_range_source(Arc::new(StaticRangeSource(Some(
        DisconnectedRange::from_block(0),
    ))));

    listener.init().await.unwrap();
    listener.subscribe().await.unwrap();

    assert_eq!(chain.polls(), vec![(9_501, 9_750), (9_751, 10_000)]);
    let blocks = recorder.blocks();
    assert_eq!(blocks.len(), 500);
    assert_eq!(blocks.first(), Some(&9_501));
    assert!(blocks.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(listener.watermark(), Some(10_000));
    assert_eq!(listener.state(), ListenerState::Subscribed);
}

#[tokio::test]
async fn backfill_without_start_is_skipped() {
    let chain = MockChain::with_head(10_000);
    let (listener, recorder) = listener(&chain, fast_config().build_config().unwrap());
    let listener = listener.with_range_source(reconnect_range_fn(|_chain| async { Ok(None) }));

    listener.init().await.unwrap();
    listener.subscribe().await.unwrap();

    assert!(chain.polls().is_empty());
    assert!(recorder.blocks().is_empty());
    assert_eq!(listener.watermark(), None);
}

#[tokio::test]
async fn chunk_error_stops_backfill_but_subscribes() {
    let chain = MockChain::with_head(1_000);
    *chain.fail_poll_from.lock().unwrap() = Some(800);
    let (listener, recorder) = listener(&chain, fast_config().build_config().unwrap());
    let listener = listener.with_range_source(Arc::new(StaticRangeSource(Some(
        DisconnectedRange::from_block(550),
    ))));

    listener.init().await.unwrap();
    listener.subscribe().await.unwrap();

    assert_eq!(chain.polls(), vec![(550, 799), (800, 1_000)]);
    assert_eq!(recorder.blocks().len(), 250);
    assert_eq!(listener.watermark(), Some(799));
    assert_eq!(listener.state(), ListenerState::Subscribed);
}

#[tokio::test]
async fn unsubscribe_cancels_backfill_between_chunks() {
    let chain = MockChain::with_head(1_000);
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    *chain.gate.lock().unwrap() = Some((entered.clone(), release.clone()));

    let (listener, recorder) = listener(&chain, fast_config().build_config().unwrap());
    let listener = Arc::new(listener.with_range_source(Arc::new(StaticRangeSource(Some(
        DisconnectedRange::from_block(600),
    )))));
    listener.init().await.unwrap();

    let subscribing = {
        let listener = listener.clone();
        tokio::spawn(async move { listener.subscribe().await })
    };
    entered.notified().await;
    listener.unsubscribe().await;
    release.notify_one();
    subscribing.await.unwrap().unwrap();

    assert_eq!(chain.polls().len(), 1);
    assert_eq!(recorder.blocks().len(), 250);
    assert_eq!(listener.state(), ListenerState::Unsubscribed);
    assert!(!chain.slot.is_active());
}

// ─── Live delivery ────────────────────────────────────────────────────────────

#[tokio::test]
async fn live_blocks_reach_handlers_and_watermark_is_monotone() {
    let chain = MockChain::with_head(10);
    let (listener, recorder) = listener(
        &chain,
        fast_config().skip_catchup(true).build_config().unwrap(),
    );
    listener.init().await.unwrap();
    listener.subscribe().await.unwrap();

    assert!(chain.push(11));
    assert!(chain.push(12));
    assert!(chain.push(5));
    eventually(|| recorder.blocks().len() == 3).await;

    assert_eq!(recorder.blocks(), vec![11, 12, 5]);
    assert_eq!(listener.watermark(), Some(12));
    assert_eq!(listener.last_processed_block(), Some(12));

    listener.unsubscribe().await;
    assert!(!chain.push(13));
}

#[tokio::test]
async fn ended_stream_leaves_listener_resubscribable() {
    let chain = MockChain::with_head(100);
    let (listener, recorder) = listener(
        &chain,
        fast_config().skip_catchup(true).build_config().unwrap(),
    );
    listener.init().await.unwrap();
    listener.subscribe().await.unwrap();

    assert!(chain.push(101));
    eventually(|| recorder.blocks() == vec![101]).await;

    chain.end_stream();
    eventually(|| listener.state() == ListenerState::Unsubscribed).await;
    assert!(!chain.slot.is_active());

    listener.subscribe().await.unwrap();
    assert_eq!(listener.state(), ListenerState::Subscribed);
    assert!(chain.push(102));
    eventually(|| recorder.blocks() == vec![101, 102]).await;
}

#[tokio::test]
async fn watermark_resumes_backfill_after_resubscribe() {
    let chain = MockChain::with_head(100);
    let (listener, recorder) = listener(&chain, fast_config().build_config().unwrap());
    let listener = listener.with_range_source(Arc::new(StaticRangeSource(Some(
        DisconnectedRange::from_block(90),
    ))));
    listener.init().await.unwrap();
    listener.subscribe().await.unwrap();
    assert_eq!(listener.watermark(), Some(100));
    listener.unsubscribe().await;

    chain.head.store(120, Ordering::SeqCst);
    listener.subscribe().await.unwrap();
    assert_eq!(chain.polls(), vec![(90, 100), (101, 120)]);
    assert_eq!(recorder.blocks().len(), 11 + 20);
}

#[tokio::test]
async fn reconfigure_resubscribes_when_subscribed() {
    let chain = MockChain::with_head(10);
    let (listener, _) = listener(
        &chain,
        fast_config().skip_catchup(true).build_config().unwrap(),
    );
    listener.init().await.unwrap();
    listener.subscribe().await.unwrap();

    listener
        .reconfigure(ReconfigureRequest {
            url: Some("ws://replica:9944".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(chain.connects.load(Ordering::SeqCst), 2);
    assert_eq!(listener.state(), ListenerState::Subscribed);
    assert_eq!(listener.config().url, "ws://replica:9944");
    assert!(chain.slot.is_active());
}

#[tokio::test]
async fn reconfigure_leaves_unsubscribed_listener_initialised() {
    let chain = MockChain::with_head(10);
    let (listener, _) = listener(&chain, fast_config().build_config().unwrap());
    listener.init().await.unwrap();

    listener
        .reconfigure(ReconfigureRequest {
            verbose: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listener.state(), ListenerState::Initialized);

    let err = listener
        .reconfigure(ReconfigureRequest {
            url: Some(String::new()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
