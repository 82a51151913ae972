//! chainevents-evm: contract-chain support for chainevents.
//!
//! Logs are read over JSON-RPC through the [`EvmRpcClient`] trait
//! ([`HttpRpcClient`] is the reqwest implementation) and routed by an
//! [`EventSourceMap`] of tracked contracts and event topics:
//!
//! - [`LogPoller`] fetches historical logs in chunks, grouped per block
//! - [`PollingSubscriber`] polls the head at an interval derived from recent
//!   block times
//! - [`EvmProcessor`] hands each log to a [`ContractProtocol`] for
//!   classification and enrichment
//! - the `*StorageFetcher`s rebuild governance history from contract storage
//! - [`EvmConnector`] wires them into a listener strategy
//!
//! Supported contract families: Compound-style governors, Aave governance
//! v2 with its token, Moloch v1, plain ERC-20 tokens and ERC-721 collections.

pub mod abi;
pub mod client;
pub mod dater;
pub mod error;
pub mod http;
pub mod poller;
pub mod processor;
pub mod protocol;
pub mod protocols;
pub mod rpc;
pub mod source_map;
pub mod strategy;
pub mod subscriber;

pub use client::{client_factory_fn, EvmClientFactory, EvmRpcClient, LogFilter, RawLog};
pub use dater::BlockDater;
pub use error::TransportError;
pub use http::{HttpClientConfig, HttpClientFactory, HttpRpcClient};
pub use poller::{LogBatch, LogPoller};
pub use processor::EvmProcessor;
pub use protocol::ContractProtocol;
pub use protocols::{
    AaveProtocol, AaveStorageFetcher, CompoundProtocol, CompoundStorageFetcher, Erc20Protocol, Erc721Protocol,
    MolochProtocol, MolochStorageFetcher,
};
pub use source_map::EventSourceMap;
pub use strategy::EvmConnector;
pub use subscriber::{compute_poll_interval, LogFollower, PollConfig, PollingSubscriber};
