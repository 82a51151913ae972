//! Listener configuration, its fluent builder, and the lifecycle state.
//!
//! # Example
//!
//! ```rust
//! use chainevents_core::ListenerBuilder;
//!
//! let config = ListenerBuilder::new()
//!     .chain("compound")
//!     .url("https://eth.example.org")
//!     .contract_address("0xc0Da02939E1441F497fd74F78cE7Decb17B66529")
//!     .skip_catchup(true)
//!     .build_config()
//!     .unwrap();
//! assert_eq!(config.contract_addresses[0], "0xc0da02939e1441f497fd74f78ce7decb17b66529");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryConfig;

/// Configuration for one chain listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Chain id (e.g. `"edgeware"`, `"compound"`).
    pub chain: String,
    /// Node endpoint.
    pub url: String,
    /// Contract addresses for contract-based networks.
    pub contract_addresses: Vec<String>,
    /// Skip the backfill step on subscribe.
    pub skip_catchup: bool,
    /// Log every event at `info` instead of `debug`.
    pub verbose: bool,
    /// The node keeps full history.
    pub archival: bool,
    /// Fixed poll interval; `None` = adaptive.
    pub poll_interval_ms: Option<u64>,
    /// Number of recent blocks sampled for the adaptive poll interval.
    pub adaptive_sample_size: u64,
    /// Poll interval used when the sampled interval is zero.
    pub default_poll_interval_ms: u64,
    /// Maximum number of blocks a reconnect backfill may cover.
    pub max_backfill_window: u64,
    /// Blocks per backfill chunk.
    pub backfill_chunk_size: u64,
    /// Blocks per poller request.
    pub poll_chunk_size: u64,
    /// Connection attempts made by `init()`.
    pub connect_attempts: u32,
    /// Fixed delay between connection attempts (milliseconds).
    pub connect_retry_delay_ms: u64,
    /// Minimum transfer size, in millionths of total issuance, for
    /// balance transfers to be emitted. `None` = emit every transfer.
    pub balance_transfer_threshold_permill: Option<u64>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            chain: "edgeware".into(),
            url: "ws://localhost:9944".into(),
            contract_addresses: Vec::new(),
            skip_catchup: false,
            verbose: false,
            archival: false,
            poll_interval_ms: None,
            adaptive_sample_size: 10,
            default_poll_interval_ms: 12_000,
            max_backfill_window: 500,
            backfill_chunk_size: 250,
            poll_chunk_size: 1_000,
            connect_attempts: 3,
            connect_retry_delay_ms: 10_000,
            balance_transfer_threshold_permill: None,
        }
    }
}

impl ListenerConfig {
    /// Check internal consistency and normalise contract addresses.
    pub fn validate(&mut self) -> Result<()> {
        if self.chain.trim().is_empty() {
            return Err(Error::Config("chain must not be empty".into()));
        }
        if self.url.trim().is_empty() {
            return Err(Error::Config("url must not be empty".into()));
        }
        for (name, value) in [
            ("backfill_chunk_size", self.backfill_chunk_size),
            ("poll_chunk_size", self.poll_chunk_size),
            ("adaptive_sample_size", self.adaptive_sample_size),
            ("default_poll_interval_ms", self.default_poll_interval_ms),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }
        if self.connect_attempts == 0 {
            return Err(Error::Config("connect_attempts must be at least 1".into()));
        }
        if self.balance_transfer_threshold_permill == Some(0) {
            return Err(Error::Config(
                "balance_transfer_threshold_permill must be greater than zero".into(),
            ));
        }
        for addr in &mut self.contract_addresses {
            let valid = addr.len() == 42
                && addr.starts_with("0x")
                && addr[2..].chars().all(|c| c.is_ascii_hexdigit());
            if !valid {
                return Err(Error::Config(format!("invalid contract address '{addr}'")));
            }
            *addr = addr.to_lowercase();
        }
        Ok(())
    }

    /// Retry policy settings for connecting to the node.
    pub fn connect_retry(&self) -> RetryConfig {
        RetryConfig::fixed(
            self.connect_attempts.saturating_sub(1),
            Duration::from_millis(self.connect_retry_delay_ms),
        )
    }
}

/// Fluent builder for [`ListenerConfig`].
#[derive(Default)]
pub struct ListenerBuilder {
    config: ListenerConfig,
}

impl ListenerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chain id.
    pub fn chain(mut self, chain: impl Into<String>) -> Self {
        self.config.chain = chain.into();
        self
    }

    /// Set the node endpoint.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Add one contract address.
    pub fn contract_address(mut self, address: impl Into<String>) -> Self {
        self.config.contract_addresses.push(address.into());
        self
    }

    /// Replace the contract address list.
    pub fn contract_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.contract_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    pub fn skip_catchup(mut self, skip: bool) -> Self {
        self.config.skip_catchup = skip;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn archival(mut self, archival: bool) -> Self {
        self.config.archival = archival;
        self
    }

    /// Use a fixed poll interval instead of the adaptive one.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = Some(ms);
        self
    }

    pub fn max_backfill_window(mut self, blocks: u64) -> Self {
        self.config.max_backfill_window = blocks;
        self
    }

    pub fn backfill_chunk_size(mut self, blocks: u64) -> Self {
        self.config.backfill_chunk_size = blocks;
        self
    }

    pub fn poll_chunk_size(mut self, blocks: u64) -> Self {
        self.config.poll_chunk_size = blocks;
        self
    }

    /// Set connection attempts and the fixed delay between them.
    pub fn connect_retry(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.config.connect_attempts = attempts;
        self.config.connect_retry_delay_ms = delay_ms;
        self
    }

    pub fn balance_transfer_threshold_permill(mut self, permill: u64) -> Self {
        self.config.balance_transfer_threshold_permill = Some(permill);
        self
    }

    /// Validate and return the config.
    pub fn build_config(self) -> Result<ListenerConfig> {
        let mut config = self.config;
        config.validate()?;
        Ok(config)
    }
}

/// Lifecycle state of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListenerState {
    /// Constructed, not yet connected.
    Uninitialized,
    /// Connected, strategy built, not subscribed.
    Initialized,
    /// Receiving live events.
    Subscribed,
    /// Was subscribed, now stopped.
    Unsubscribed,
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized"),
            Self::Subscribed => write!(f, "subscribed"),
            Self::Unsubscribed => write!(f, "unsubscribed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ListenerConfig::default();
        assert_eq!(cfg.chain, "edgeware");
        assert_eq!(cfg.url, "ws://localhost:9944");
        assert_eq!(cfg.max_backfill_window, 500);
        assert_eq!(cfg.backfill_chunk_size, 250);
        assert_eq!(cfg.default_poll_interval_ms, 12_000);
        assert_eq!(cfg.connect_attempts, 3);
        assert!(cfg.poll_interval_ms.is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ListenerConfig =
            serde_json::from_str(r#"{"chain": "aave", "skip_catchup": true}"#).unwrap();
        assert_eq!(cfg.chain, "aave");
        assert!(cfg.skip_catchup);
        assert_eq!(cfg.poll_chunk_size, 1_000);
    }

    #[test]
    fn builder_custom() {
        let cfg = ListenerBuilder::new()
            .chain("moloch")
            .url("http://localhost:8545")
            .contract_addresses(["0x1fd169A4f5c59ACf79d0Fd5d91D1201EF1Bce9f1"])
            .poll_interval_ms(3_000)
            .connect_retry(5, 100)
            .build_config()
            .unwrap();
        assert_eq!(cfg.chain, "moloch");
        assert_eq!(
            cfg.contract_addresses,
            vec!["0x1fd169a4f5c59acf79d0fd5d91d1201ef1bce9f1".to_string()]
        );
        assert_eq!(cfg.poll_interval_ms, Some(3_000));
        assert_eq!(cfg.connect_retry().max_retries, 4);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(ListenerBuilder::new().chain("").build_config().is_err());
        assert!(ListenerBuilder::new()
            .backfill_chunk_size(0)
            .build_config()
            .is_err());
        assert!(ListenerBuilder::new()
            .contract_address("0x1234")
            .build_config()
            .is_err());
        assert!(ListenerBuilder::new()
            .connect_retry(0, 10)
            .build_config()
            .is_err());
    }

    #[test]
    fn state_display() {
        assert_eq!(ListenerState::Subscribed.to_string(), "subscribed");
        assert_eq!(ListenerState::Uninitialized.to_string(), "uninitialized");
    }
}
