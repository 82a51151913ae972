//! Event handler trait and the ordered handler chain.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::event::CanonicalEvent;

/// Trait for externally supplied event handlers (persistence, notification, …).
///
/// Handlers run strictly in registration order for each event; each receives
/// the previous handler's result so results can accumulate along the chain.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event. `previous` is `None` for the first handler.
    async fn handle(&self, event: &CanonicalEvent, previous: Option<Value>) -> Result<Option<Value>>;

    /// Name used in logs and in [`Error::Handler`].
    fn name(&self) -> &str;
}

struct Registration {
    handler: Arc<dyn EventHandler>,
    excluded_kinds: HashSet<String>,
}

impl Registration {
    fn accepts(&self, event: &CanonicalEvent) -> bool {
        !self.excluded_kinds.contains(event.kind())
    }
}

/// Ordered chain of event handlers.
pub struct HandlerChain {
    handlers: RwLock<Vec<Arc<Registration>>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Append a handler that sees every event.
    pub fn register(&self, handler: Arc<dyn EventHandler>) {
        self.register_excluding(handler, Vec::<String>::new());
    }

    /// Append a handler that skips the given event kinds (e.g. `"reward"`).
    pub fn register_excluding<I, S>(&self, handler: Arc<dyn EventHandler>, kinds: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registration = Registration {
            handler,
            excluded_kinds: kinds.into_iter().map(Into::into).collect(),
        };
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(registration));
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<Registration>> {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Run every accepting handler for `event`, in order, threading results.
    ///
    /// The first failure stops the chain for this event only and is returned
    /// as [`Error::Handler`].
    pub async fn dispatch(&self, event: &CanonicalEvent) -> Result<Option<Value>> {
        let mut previous = None;
        for registration in self.snapshot() {
            if !registration.accepts(event) {
                continue;
            }
            let handler = &registration.handler;
            previous = handler
                .handle(event, previous)
                .await
                .map_err(|e| Error::Handler {
                    handler: handler.name().to_string(),
                    reason: e.to_string(),
                })?;
        }
        Ok(previous)
    }

    /// Dispatch `events` in order, logging failures. Returns the number of
    /// events whose chain failed.
    pub async fn dispatch_all(&self, events: &[CanonicalEvent], verbose: bool) -> usize {
        let mut failed = 0;
        for event in events {
            if verbose {
                tracing::info!(block = event.block_number, kind = event.kind(), "Dispatching event");
            } else {
                tracing::debug!(block = event.block_number, kind = event.kind(), "Dispatching event");
            }
            if let Err(e) = self.dispatch(event).await {
                failed += 1;
                tracing::warn!(
                    block = event.block_number,
                    kind = event.kind(),
                    error = %e,
                    "Event handler failed"
                );
            }
        }
        failed
    }
}

impl Default for HandlerChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler that logs every event it sees and passes the previous result on.
pub struct LoggingHandler {
    verbose: bool,
}

impl LoggingHandler {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &CanonicalEvent, previous: Option<Value>) -> Result<Option<Value>> {
        if self.verbose {
            tracing::info!(
                chain = %event.chain,
                block = event.block_number,
                kind = event.kind(),
                data = ?event.data,
                "Received event"
            );
        } else {
            tracing::info!(
                chain = %event.chain,
                block = event.block_number,
                kind = event.kind(),
                "Received event"
            );
        }
        Ok(previous)
    }

    fn name(&self) -> &str {
        "logging"
    }
}
