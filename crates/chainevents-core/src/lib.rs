//! chainevents-core: canonical event model and per-chain listener orchestration.
//!
//! # Architecture
//!
//! ```text
//! Listener<C: Connector>
//!     ├── Connector::connect   (retried; builds the ChainStrategy)
//!     ├── ChainStrategy
//!     │     ├── EventSubscriber  (push or adaptive poll → mpsc channel)
//!     │     ├── EventPoller      (chunked historical fetch)
//!     │     ├── EventProcessor   (classify + enrich → CanonicalEvent)
//!     │     └── StorageFetcher   (governance history from storage; optional)
//!     ├── backfill            (window planning, chunked replay)
//!     ├── Watermark           (highest fully dispatched block)
//!     └── HandlerChain        (ordered external handlers, result threading)
//! ```

pub mod backfill;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod handler;
pub mod listener;
pub mod payload;
pub mod range;
pub mod retry;
pub mod stages;
pub mod strategy;
pub mod types;
pub mod watermark;

pub use backfill::{plan_window, BackfillReport, BackfillWindow};
pub use config::{ListenerBuilder, ListenerConfig, ListenerState};
pub use entity::{is_entity_completed, EntityEventKind, EntityKind, EntityRef};
pub use error::{Error, Result};
pub use event::{sort_by_block, CanonicalEvent};
pub use handler::{EventHandler, HandlerChain, LoggingHandler};
pub use listener::{ChainListener, Listener, ReconfigureRequest};
pub use payload::EventPayload;
pub use range::{clip_window, BlockChunks};
pub use retry::{connect_with_retry, RetryConfig, RetryPolicy};
pub use stages::{FetchPlan, StageInputs};
pub use strategy::{
    reconnect_range_fn, BackfillSource, ChainStrategy, Connector, EventPoller, EventProcessor,
    EventSubscriber, RawItem, ReconnectRangeSource, StaticRangeSource, StorageFetcher,
    SubscriptionSlot, SubscriptionToken,
};
pub use types::{BlockSummary, DisconnectedRange, Network};
pub use watermark::Watermark;
