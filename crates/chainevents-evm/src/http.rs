//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Requests are sent once by default: the listener's connect loop and the
//! subscriber's tick backoff already retry, so a failing node surfaces on
//! the next tick instead of stalling this one. A non-empty
//! [`HttpClientConfig::retry`] retries transient failures in place (see
//! [`TransportError::is_retryable`]).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Bytes;
use async_trait::async_trait;
use chainevents_core::{BlockSummary, Error, Result, RetryConfig, RetryPolicy};
use serde_json::{json, Value};

use crate::client::{block_from_json, parse_hex_u64, EvmClientFactory, EvmRpcClient, LogFilter, RawLog};
use crate::error::TransportError;
use crate::rpc::{JsonRpcRequest, JsonRpcResponse};

/// Configuration for [`HttpRpcClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// In-request retries; none by default.
    pub retry: RetryConfig,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::none(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP JSON-RPC client.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    /// Create a client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(config.retry),
            request_timeout: config.request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> std::result::Result<JsonRpcResponse, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        ms: self.request_timeout.as_millis() as u64,
                    }
                } else {
                    TransportError::Http(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(TransportError::RateLimited {
                provider: self.url.clone(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {}: {body}", status.as_u16())));
        }

        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))
    }

    /// Send one request, retrying transient failures.
    pub async fn request(&self, method: &str, params: Vec<Value>) -> std::result::Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = match self.send_once(&req).await {
                Ok(resp) => resp.into_result().map_err(TransportError::from),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            method,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            url = %self.url,
                            "Retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(method, attempt, error = %e, url = %self.url, "Max retries exceeded");
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_str(&self, method: &str, params: Vec<Value>) -> Result<String> {
        match self.request(method, params).await? {
            Value::String(s) => Ok(s),
            other => Err(Error::Decode(format!("{method}: expected a hex string, got {other}"))),
        }
    }
}

#[async_trait]
impl EvmRpcClient for HttpRpcClient {
    async fn block_number(&self) -> Result<u64> {
        parse_hex_u64(&self.request_str("eth_blockNumber", vec![]).await?)
    }

    async fn block(&self, number: u64) -> Result<Option<BlockSummary>> {
        let value = self
            .request("eth_getBlockByNumber", vec![json!(format!("0x{number:x}")), json!(false)])
            .await?;
        block_from_json(&value)
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>> {
        let value = self.request("eth_getLogs", vec![filter.to_json()]).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn call(&self, to: &str, data: Bytes) -> Result<Bytes> {
        let tx = json!({ "to": to, "data": format!("0x{}", hex::encode(&data)) });
        let out = self.request_str("eth_call", vec![tx, json!("latest")]).await?;
        hex::decode(out.trim_start_matches("0x"))
            .map(Bytes::from)
            .map_err(|e| Error::Decode(format!("eth_call result: {e}")))
    }
}

/// Opens an [`HttpRpcClient`] per connection.
#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory {
    pub config: HttpClientConfig,
}

#[async_trait]
impl EvmClientFactory for HttpClientFactory {
    async fn connect(&self, url: &str) -> Result<Arc<dyn EvmRpcClient>> {
        Ok(Arc::new(HttpRpcClient::new(url, self.config.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Local endpoint answering every request with `502`; returns its URL
    /// and the number of connections it accepted.
    async fn bad_gateway() -> (String, Arc<AtomicU32>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket
                        .write_all(b"HTTP/1.1 502 Bad Gateway\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                        .await;
                });
            }
        });
        (url, hits)
    }

    #[test]
    fn builds_with_defaults() {
        let client = HttpRpcClient::new("http://localhost:8545", HttpClientConfig::default()).unwrap();
        assert_eq!(client.url(), "http://localhost:8545");
        assert_eq!(client.retry.config.max_retries, 0);
    }

    #[tokio::test]
    async fn default_client_fails_fast() {
        let (url, hits) = bad_gateway().await;
        let client = HttpRpcClient::new(url, HttpClientConfig::default()).unwrap();
        let err = client.block_number().await.unwrap_err();
        assert!(matches!(err, Error::Rpc(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn configured_retries_repeat_transient_failures() {
        let (url, hits) = bad_gateway().await;
        let config = HttpClientConfig {
            retry: RetryConfig::fixed(2, Duration::from_millis(1)),
            ..HttpClientConfig::default()
        };
        let client = HttpRpcClient::new(url, config).unwrap();
        assert!(client.block_number().await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unreachable_endpoint_gives_up_after_retries() {
        let config = HttpClientConfig {
            retry: RetryConfig::fixed(1, Duration::from_millis(1)),
            request_timeout: Duration::from_millis(200),
        };
        // Port 9 (discard) is closed on test hosts; the connection is refused.
        let client = HttpRpcClient::new("http://127.0.0.1:9", config).unwrap();
        let err = client.block_number().await.unwrap_err();
        assert!(matches!(err, Error::Rpc(_)));
    }
}
