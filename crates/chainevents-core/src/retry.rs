//! Backoff retry policy and the connection retry loop built on it.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the first try).
    pub max_retries: u32,
    /// Initial backoff delay.
    pub initial_backoff: Duration,
    /// Maximum backoff delay (caps exponential growth).
    pub max_backoff: Duration,
    /// Multiplier applied to backoff on each retry.
    pub multiplier: f64,
    /// Add `jitter_fraction * backoff / 2` on top of each delay (0.0 = none).
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }
}

impl RetryConfig {
    /// `max_retries` retries, each after the same `delay`.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff: delay,
            max_backoff: delay,
            multiplier: 1.0,
            jitter_fraction: 0.0,
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Total attempts including the first one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Stateless retry policy: computes the next delay given the attempt number.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the delay before the `attempt`-th retry (1-based).
    /// Returns `None` if `attempt` exceeds `max_retries`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.config.max_retries {
            return None;
        }
        let base_ms = self.config.initial_backoff.as_millis() as f64
            * self.config.multiplier.powi((attempt - 1) as i32);
        let cap_ms = self.config.max_backoff.as_millis() as f64;
        let capped = base_ms.min(cap_ms);
        let jitter_ms = capped * self.config.jitter_fraction * 0.5;
        Some(Duration::from_millis((capped + jitter_ms) as u64))
    }

    /// Returns `true` if any retries remain after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.config.max_retries
    }
}

/// Run `connect` until it succeeds or the retry budget is spent.
///
/// Exhaustion yields [`Error::Connection`] carrying the last failure.
pub async fn connect_with_retry<T, F, Fut>(url: &str, config: &RetryConfig, mut connect: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let policy = RetryPolicy::new(config.clone());
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match connect().await {
            Ok(client) => {
                if attempt > 1 {
                    tracing::info!(url, attempt, "Connected after retry");
                }
                return Ok(client);
            }
            Err(e) => match policy.next_delay(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(url, attempts = attempt, error = %e, "Connection failed");
                    return Err(Error::Connection {
                        url: url.to_string(),
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn exponential_delays() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_fraction: 0.0,
        });
        assert_eq!(policy.next_delay(1).unwrap().as_millis(), 100);
        assert_eq!(policy.next_delay(2).unwrap().as_millis(), 200);
        assert_eq!(policy.next_delay(3).unwrap().as_millis(), 400);
        assert!(policy.next_delay(4).is_none());
    }

    #[test]
    fn fixed_policy_is_flat() {
        let cfg = RetryConfig::fixed(2, Duration::from_secs(10));
        let policy = RetryPolicy::new(cfg.clone());
        assert_eq!(cfg.attempts(), 3);
        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(10)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_secs(10)));
        assert!(policy.next_delay(3).is_none());
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn none_is_a_single_attempt() {
        let cfg = RetryConfig::none();
        assert_eq!(cfg.attempts(), 1);
        assert!(RetryPolicy::new(cfg).next_delay(1).is_none());
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<()> = connect_with_retry(
            "ws://nowhere",
            &RetryConfig::fixed(2, Duration::from_millis(1)),
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Rpc("refused".into()))
                }
            },
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(Error::Connection { attempts, reason, .. }) => {
                assert_eq!(attempts, 3);
                assert!(reason.contains("refused"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn succeeds_on_later_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let value = connect_with_retry(
            "ws://flaky",
            &RetryConfig::fixed(2, Duration::from_millis(1)),
            move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(Error::Rpc("reset".into()))
                    } else {
                        Ok(42u32)
                    }
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
