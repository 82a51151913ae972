//! chainevents-substrate: runtime-events chain support for chainevents.
//!
//! Every component works against the [`SubstrateApi`] client trait:
//!
//! - [`SubstrateProcessor`] classifies block events and successful extrinsics
//!   and enriches them into canonical events
//! - [`SubstrateSubscriber`] follows new heads and pushes full blocks
//! - [`SubstratePoller`] fetches historical blocks in chunks, failing on
//!   pruned history
//! - [`SubstrateStorageFetcher`] recovers open governance entities from storage
//! - [`SubstrateConnector`] wires them into a listener strategy

pub mod api;
pub mod args;
pub mod classifier;
pub mod enricher;
pub mod poller;
pub mod processor;
pub mod storage;
pub mod strategy;
pub mod subscriber;
pub mod types;

pub use api::{api_factory_fn, SubstrateApi, SubstrateApiFactory};
pub use classifier::{classify_event, classify_extrinsic};
pub use enricher::{Enricher, EnricherConfig, RawRecord};
pub use poller::SubstratePoller;
pub use processor::SubstrateProcessor;
pub use storage::SubstrateStorageFetcher;
pub use strategy::SubstrateConnector;
pub use subscriber::SubstrateSubscriber;
pub use types::{
    Block, DispatchEntry, Header, OpenTip, Preimage, PublicProposal, RawEvent, RawExtrinsic,
    ReferendumStatus, Registration, RuntimeVersion, TreasuryProposalInfo,
};
