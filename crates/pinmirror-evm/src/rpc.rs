//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Transport failures (connection errors, non-2xx responses) are retried with
//! exponential backoff. Node-side errors are returned as-is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use pinmirror_core::error::SourceError;

use crate::fetcher::{EvmRpcClient, LogFilter, RawLog};
use crate::retry::{RetryConfig, RetryPolicy};

// ─── Wire types ───────────────────────────────────────────────────────────────

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Vec<Value>,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// The result value, `Value::Null` if absent, or the node's error.
    pub fn into_result(self) -> Result<Value, SourceError> {
        match self.error {
            Some(err) => Err(SourceError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// Configuration for [`HttpRpcClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub retry: RetryConfig,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// JSON-RPC client for a single HTTP endpoint.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SourceError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(config.retry),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call `method` and return its result, retrying transport failures.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, SourceError> {
        let req = JsonRpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(&req).await {
                Ok(resp) => return resp.into_result(),
                Err(e) if e.is_retryable() => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            method,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(attempt, error = %e, method, "max retries exceeded");
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, SourceError> {
        tracing::debug!(method = %req.method, id = req.id, "rpc request");
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Transport(format!("HTTP {status}: {body}")));
        }

        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl EvmRpcClient for HttpRpcClient {
    async fn get_block_number(&self) -> Result<u64, SourceError> {
        let v = self.call("eth_blockNumber", vec![]).await?;
        let hex = v
            .as_str()
            .ok_or_else(|| SourceError::InvalidResponse(format!("block number is not a string: {v}")))?;
        crate::fetcher::parse_hex_u64(hex)
    }

    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        filter: &LogFilter,
    ) -> Result<Vec<RawLog>, SourceError> {
        let v = self.call("eth_getLogs", vec![filter.to_params(from, to)]).await?;
        serde_json::from_value(v).map_err(|e| SourceError::InvalidResponse(format!("logs: {e}")))
    }

    async fn get_transaction_input(&self, hash: &str) -> Result<Option<String>, SourceError> {
        let v = self
            .call("eth_getTransactionByHash", vec![json!(hash)])
            .await?;
        if v.is_null() {
            return Ok(None);
        }
        // Some nodes still return `data` instead of `input`.
        let input = v["input"].as_str().or_else(|| v["data"].as_str());
        match input {
            Some(s) => Ok(Some(s.to_string())),
            None => Err(SourceError::InvalidResponse(format!(
                "transaction {hash} has no input"
            ))),
        }
    }
}
