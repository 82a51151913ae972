//! Per-chain listener: lifecycle state machine, backfill on subscribe, and
//! the live consumer that feeds the handler chain.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use crate::backfill::{self, plan_window};
use crate::config::{ListenerConfig, ListenerState};
use crate::error::{Error, Result};
use crate::handler::HandlerChain;
use crate::retry::connect_with_retry;
use crate::strategy::{
    ChainStrategy, Connector, EventProcessor, RawItem, ReconnectRangeSource, StorageFetcher,
};
use crate::types::Network;
use crate::watermark::Watermark;

/// A runtime configuration change. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconfigureRequest {
    pub url: Option<String>,
    pub contract_addresses: Option<Vec<String>>,
    pub archival: Option<bool>,
    pub skip_catchup: Option<bool>,
    pub verbose: Option<bool>,
    pub poll_interval_ms: Option<u64>,
    pub balance_transfer_threshold_permill: Option<u64>,
}

impl ReconfigureRequest {
    fn apply(self, config: &mut ListenerConfig) {
        if let Some(url) = self.url {
            config.url = url;
        }
        if let Some(addresses) = self.contract_addresses {
            config.contract_addresses = addresses;
        }
        if let Some(archival) = self.archival {
            config.archival = archival;
        }
        if let Some(skip) = self.skip_catchup {
            config.skip_catchup = skip;
        }
        if let Some(verbose) = self.verbose {
            config.verbose = verbose;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = Some(ms);
        }
        if let Some(permill) = self.balance_transfer_threshold_permill {
            config.balance_transfer_threshold_permill = Some(permill);
        }
    }
}

/// Object-safe view of a listener, whatever chain it serves.
#[async_trait]
pub trait ChainListener: Send + Sync {
    /// Chain id (e.g. `"edgeware"`).
    fn chain(&self) -> &str;

    fn network(&self) -> Network;

    fn state(&self) -> ListenerState;

    /// Connect (with retry) and build the processing strategy.
    ///
    /// A running subscription is stopped first; on failure the listener is
    /// left `Uninitialized` with no strategy.
    async fn init(&self) -> Result<()>;

    /// Backfill missed blocks (unless `skip_catchup`), then start live delivery.
    async fn subscribe(&self) -> Result<()>;

    /// Stop backfill and live delivery. Safe to call in any state.
    async fn unsubscribe(&self);

    /// Apply a configuration change, re-initialise, and resubscribe if the
    /// listener was subscribed.
    async fn reconfigure(&self, request: ReconfigureRequest) -> Result<()>;

    /// Highest block whose events have all been dispatched.
    fn watermark(&self) -> Option<u64>;

    /// The strategy's storage fetcher, for explicit migrations.
    fn storage_fetcher(&self) -> Option<Arc<dyn StorageFetcher>>;
}

struct Runtime<R: RawItem> {
    state: ListenerState,
    strategy: Option<ChainStrategy<R>>,
    // present from the start of subscribe() until unsubscribe()
    session: Option<CancellationToken>,
}

struct Inner<C: Connector> {
    connector: C,
    chain: String,
    network: Network,
    config: Mutex<ListenerConfig>,
    handlers: Arc<HandlerChain>,
    range_source: Mutex<Option<Arc<dyn ReconnectRangeSource>>>,
    watermark: Watermark,
    runtime: Mutex<Runtime<C::Raw>>,
    span: Span,
}

/// Listener for one chain, driven by the strategy its [`Connector`] builds.
pub struct Listener<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Listener<C> {
    /// Create an uninitialised listener. The config is validated here.
    pub fn new(connector: C, mut config: ListenerConfig, handlers: Arc<HandlerChain>) -> Result<Self> {
        config.validate()?;
        let network = connector.network();
        let span = tracing::info_span!("listener", chain = %config.chain, network = %network);
        Ok(Self {
            inner: Arc::new(Inner {
                chain: config.chain.clone(),
                network,
                connector,
                config: Mutex::new(config),
                handlers,
                range_source: Mutex::new(None),
                watermark: Watermark::new(),
                runtime: Mutex::new(Runtime {
                    state: ListenerState::Uninitialized,
                    strategy: None,
                    session: None,
                }),
                span,
            }),
        })
    }

    /// Use `source` to discover missed ranges on subscribe.
    pub fn with_range_source(self, source: Arc<dyn ReconnectRangeSource>) -> Self {
        *lock(&self.inner.range_source) = Some(source);
        self
    }

    pub fn handlers(&self) -> Arc<HandlerChain> {
        self.inner.handlers.clone()
    }

    /// A copy of the current configuration.
    pub fn config(&self) -> ListenerConfig {
        lock(&self.inner.config).clone()
    }

    /// Shared handle to the watermark.
    pub fn watermark_handle(&self) -> Watermark {
        self.inner.watermark.clone()
    }

    /// Highest block the processor has seen, if initialised.
    pub fn last_processed_block(&self) -> Option<u64> {
        lock(&self.inner.runtime)
            .strategy
            .as_ref()
            .and_then(|s| s.processor.last_block())
    }
}

impl<C: Connector> Drop for Listener<C> {
    fn drop(&mut self) {
        if let Some(session) = lock(&self.inner.runtime).session.take() {
            session.cancel();
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<C: Connector> Inner<C> {
    fn config_snapshot(&self) -> ListenerConfig {
        lock(&self.config).clone()
    }

    /// End the current session, if any. Returns `true` if one was running.
    async fn stop_session(&self) -> bool {
        let stopped = {
            let mut rt = lock(&self.runtime);
            match rt.session.take() {
                Some(session) => {
                    session.cancel();
                    rt.state = ListenerState::Unsubscribed;
                    rt.strategy.clone()
                }
                None => None,
            }
        };
        match stopped {
            Some(strategy) => {
                strategy.subscriber.unsubscribe().await;
                true
            }
            None => false,
        }
    }

    async fn init(&self) -> Result<()> {
        if self.stop_session().await {
            tracing::info!("Stopped running subscription before re-initialising");
        }
        {
            let mut rt = lock(&self.runtime);
            rt.strategy = None;
            rt.state = ListenerState::Uninitialized;
        }

        let config = self.config_snapshot();
        let strategy = connect_with_retry(&config.url, &config.connect_retry(), || {
            self.connector.connect(&config)
        })
        .await?;

        let mut rt = lock(&self.runtime);
        rt.strategy = Some(strategy);
        rt.state = ListenerState::Initialized;
        tracing::info!(url = %config.url, "Listener initialised");
        Ok(())
    }

    async fn subscribe(self: &Arc<Self>) -> Result<()> {
        let (strategy, session) = {
            let mut rt = lock(&self.runtime);
            match rt.state {
                ListenerState::Subscribed => {
                    tracing::info!("Already subscribed");
                    return Ok(());
                }
                ListenerState::Uninitialized => {
                    return Err(Error::InvalidState {
                        expected: "initialized or unsubscribed".into(),
                        actual: rt.state.to_string(),
                    });
                }
                ListenerState::Initialized | ListenerState::Unsubscribed => {}
            }
            if rt.session.is_some() {
                tracing::info!("Subscription already starting");
                return Ok(());
            }
            let strategy = rt.strategy.clone().ok_or_else(|| Error::InvalidState {
                expected: "initialized".into(),
                actual: rt.state.to_string(),
            })?;
            let session = CancellationToken::new();
            rt.session = Some(session.clone());
            (strategy, session)
        };

        let config = self.config_snapshot();
        if config.skip_catchup {
            tracing::debug!("Skipping backfill");
        } else {
            self.catch_up(&strategy, &config, &session).await;
        }
        if session.is_cancelled() {
            tracing::info!("Unsubscribed during backfill");
            return Ok(());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if let Err(e) = strategy.subscriber.subscribe(tx).await {
            let mut rt = lock(&self.runtime);
            if !session.is_cancelled() {
                rt.session = None;
            }
            tracing::error!(error = %e, "Failed to start subscription");
            return Err(e);
        }

        let consumer = self.clone();
        let processor = strategy.processor.clone();
        tokio::spawn(
            consumer
                .consume(processor, rx, session.clone(), config.verbose)
                .instrument(self.span.clone()),
        );

        let raced = {
            let mut rt = lock(&self.runtime);
            if session.is_cancelled() {
                true
            } else {
                rt.state = ListenerState::Subscribed;
                false
            }
        };
        if raced {
            strategy.subscriber.unsubscribe().await;
            return Ok(());
        }
        tracing::info!("Subscribed");
        Ok(())
    }

    async fn unsubscribe(&self) {
        if self.stop_session().await {
            tracing::info!("Unsubscribed");
        } else {
            let state = lock(&self.runtime).state;
            tracing::warn!(%state, "Not subscribed; nothing to unsubscribe");
        }
    }

    async fn catch_up(
        &self,
        strategy: &ChainStrategy<C::Raw>,
        config: &ListenerConfig,
        session: &CancellationToken,
    ) {
        let source = lock(&self.range_source).clone();
        let discovered = match source {
            Some(source) => match source.discover(&self.chain).await {
                Ok(range) => range,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to discover reconnect range");
                    None
                }
            },
            None => None,
        };

        let head = match discovered.as_ref().and_then(|r| r.end_block) {
            Some(end) => end,
            None => match strategy.poller.head().await {
                Ok(head) => head,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read chain head, skipping backfill");
                    return;
                }
            },
        };

        let Some(window) = plan_window(
            discovered.as_ref(),
            self.watermark.get(),
            head,
            config.max_backfill_window,
        ) else {
            tracing::info!("No usable start block, skipping backfill");
            return;
        };

        tracing::info!(start = window.start, end = window.end, "Starting backfill");
        if let Err(e) = backfill::run(
            strategy,
            window,
            config.backfill_chunk_size,
            session,
            &self.handlers,
            &self.watermark,
            config.verbose,
        )
        .await
        {
            tracing::warn!(error = %e, "Backfill stopped");
        }
    }

    async fn consume(
        self: Arc<Self>,
        processor: Arc<dyn EventProcessor<C::Raw>>,
        mut rx: mpsc::UnboundedReceiver<C::Raw>,
        session: CancellationToken,
        verbose: bool,
    ) {
        loop {
            let raw = tokio::select! {
                biased;
                _ = session.cancelled() => break,
                raw = rx.recv() => match raw {
                    Some(raw) => raw,
                    None => {
                        tracing::warn!("Subscription stream ended");
                        self.end_session(&session).await;
                        break;
                    }
                },
            };
            let events = processor.process(&raw).await;
            self.handlers.dispatch_all(&events, verbose).await;
            self.watermark.advance(raw.block_number());
        }
        tracing::debug!("Live consumer stopped");
    }

    /// The live stream of `session` ended on its own: release the subscriber
    /// and leave the listener `Unsubscribed` so `subscribe()` can restart it.
    async fn end_session(&self, session: &CancellationToken) {
        session.cancel();
        let strategy = {
            let mut rt = lock(&self.runtime);
            // Only a session this consumer just cancelled is still stored
            // cancelled; stop_session() takes the token before cancelling.
            if !rt.session.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return;
            }
            rt.session = None;
            rt.state = ListenerState::Unsubscribed;
            rt.strategy.clone()
        };
        if let Some(strategy) = strategy {
            strategy.subscriber.unsubscribe().await;
        }
        tracing::info!("Live delivery stopped, listener unsubscribed");
    }
}

#[async_trait]
impl<C: Connector> ChainListener for Listener<C> {
    fn chain(&self) -> &str {
        &self.inner.chain
    }

    fn network(&self) -> Network {
        self.inner.network
    }

    fn state(&self) -> ListenerState {
        lock(&self.inner.runtime).state
    }

    async fn init(&self) -> Result<()> {
        self.inner.init().instrument(self.inner.span.clone()).await
    }

    async fn subscribe(&self) -> Result<()> {
        self.inner
            .subscribe()
            .instrument(self.inner.span.clone())
            .await
    }

    async fn unsubscribe(&self) {
        self.inner
            .unsubscribe()
            .instrument(self.inner.span.clone())
            .await
    }

    async fn reconfigure(&self, request: ReconfigureRequest) -> Result<()> {
        let was_subscribed = self.state() == ListenerState::Subscribed;
        {
            let mut config = lock(&self.inner.config);
            let mut next = config.clone();
            request.apply(&mut next);
            next.validate()?;
            *config = next;
        }
        tracing::info!(parent: &self.inner.span, was_subscribed, "Reconfiguring listener");
        self.init().await?;
        if was_subscribed {
            self.subscribe().await?;
        }
        Ok(())
    }

    fn watermark(&self) -> Option<u64> {
        self.inner.watermark.get()
    }

    fn storage_fetcher(&self) -> Option<Arc<dyn StorageFetcher>> {
        lock(&self.inner.runtime)
            .strategy
            .as_ref()
            .and_then(|s| s.storage.clone())
    }
}
