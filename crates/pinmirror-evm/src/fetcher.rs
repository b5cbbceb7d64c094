//! EVM log fetcher.
//!
//! Wraps an [`EvmRpcClient`] and splits `eth_getLogs` calls into ranges of at
//! most `max_range` blocks, since public nodes reject wide queries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use pinmirror_core::error::SourceError;

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    #[serde(default)]
    pub removed: Option<bool>,
}

impl RawLog {
    pub fn block_number_u64(&self) -> Result<u64, SourceError> {
        parse_hex_u64(&self.block_number)
    }

    pub fn log_index_u32(&self) -> Result<u32, SourceError> {
        let idx = parse_hex_u64(&self.log_index)?;
        u32::try_from(idx)
            .map_err(|_| SourceError::InvalidResponse(format!("log index {idx} out of range")))
    }

    /// Returns `true` if this log was removed by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }
}

/// Contract address plus event topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: String,
    /// `0x`-prefixed event selector (`topics[0]`).
    pub topic0: String,
}

impl LogFilter {
    /// `eth_getLogs` filter object for `[from, to]`.
    pub fn to_params(&self, from: u64, to: u64) -> Value {
        json!({
            "fromBlock": format!("0x{from:x}"),
            "toBlock": format!("0x{to:x}"),
            "address": self.address,
            "topics": [self.topic0],
        })
    }
}

/// The JSON-RPC calls the event source needs.
#[async_trait]
pub trait EvmRpcClient: Send + Sync {
    async fn get_block_number(&self) -> Result<u64, SourceError>;
    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        filter: &LogFilter,
    ) -> Result<Vec<RawLog>, SourceError>;
    /// Hex `input` of a transaction, `None` if the node does not know it.
    async fn get_transaction_input(&self, hash: &str) -> Result<Option<String>, SourceError>;
}

/// Adds range batching on top of an [`EvmRpcClient`].
pub struct EvmFetcher<C> {
    client: C,
}

impl<C: EvmRpcClient> EvmFetcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn head_block_number(&self) -> Result<u64, SourceError> {
        self.client.get_block_number().await
    }

    /// All logs in `[from, to]` matching `filter`, requested in chunks of at
    /// most `max_range` blocks.
    pub async fn logs(
        &self,
        from: u64,
        to: u64,
        filter: &LogFilter,
        max_range: u64,
    ) -> Result<Vec<RawLog>, SourceError> {
        if to < from {
            return Ok(vec![]);
        }
        let max_range = max_range.max(1);
        let mut all_logs = Vec::new();
        let mut start = from;
        loop {
            let end = start.saturating_add(max_range - 1).min(to);
            let chunk = self.client.get_logs(start, end, filter).await?;
            tracing::debug!(from = start, to = end, logs = chunk.len(), "fetched log range");
            all_logs.extend(chunk);
            if end == to {
                break;
            }
            start = end + 1;
        }
        Ok(all_logs)
    }

    pub async fn transaction_input(&self, hash: &str) -> Result<Option<String>, SourceError> {
        self.client.get_transaction_input(hash).await
    }
}

/// Parse a hex-encoded quantity (with or without `0x`).
pub fn parse_hex_u64(s: &str) -> Result<u64, SourceError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| SourceError::InvalidResponse(format!("bad hex quantity '{s}': {e}")))
}

/// Decode `0x`-prefixed hex bytes.
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, SourceError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| SourceError::InvalidResponse(format!("bad hex data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RangeRecorder {
        ranges: Mutex<Vec<(u64, u64)>>,
    }

    #[async_trait]
    impl EvmRpcClient for RangeRecorder {
        async fn get_block_number(&self) -> Result<u64, SourceError> {
            Ok(0)
        }

        async fn get_logs(
            &self,
            from: u64,
            to: u64,
            _filter: &LogFilter,
        ) -> Result<Vec<RawLog>, SourceError> {
            self.ranges.lock().unwrap().push((from, to));
            Ok(vec![])
        }

        async fn get_transaction_input(&self, _hash: &str) -> Result<Option<String>, SourceError> {
            Ok(None)
        }
    }

    fn filter() -> LogFilter {
        LogFilter {
            address: "0xabc".into(),
            topic0: "0xdef".into(),
        }
    }

    #[test]
    fn parse_hex_u64_basic() {
        assert_eq!(parse_hex_u64("0x1").unwrap(), 1);
        assert_eq!(parse_hex_u64("0xff").unwrap(), 255);
        assert_eq!(parse_hex_u64("1234").unwrap(), 0x1234);
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn raw_log_fields() {
        let log = RawLog {
            address: "0x0".into(),
            topics: vec![],
            data: "0x".into(),
            block_number: "0x12a05f200".into(), // 5_000_000_000
            tx_hash: "0x0".into(),
            log_index: "0x5".into(),
            removed: None,
        };
        assert_eq!(log.block_number_u64().unwrap(), 5_000_000_000);
        assert_eq!(log.log_index_u32().unwrap(), 5);
        assert!(!log.is_removed());
    }

    #[test]
    fn filter_params_are_hex() {
        let params = filter().to_params(16, 255);
        assert_eq!(params["fromBlock"], "0x10");
        assert_eq!(params["toBlock"], "0xff");
        assert_eq!(params["topics"][0], "0xdef");
    }

    #[tokio::test]
    async fn logs_are_chunked_by_range() {
        let fetcher = EvmFetcher::new(RangeRecorder::default());
        fetcher.logs(100, 125, &filter(), 10).await.unwrap();
        assert_eq!(
            *fetcher.client().ranges.lock().unwrap(),
            vec![(100, 109), (110, 119), (120, 125)]
        );
    }

    #[tokio::test]
    async fn single_block_and_empty_ranges() {
        let fetcher = EvmFetcher::new(RangeRecorder::default());
        fetcher.logs(7, 7, &filter(), 10).await.unwrap();
        fetcher.logs(9, 8, &filter(), 10).await.unwrap();
        assert_eq!(*fetcher.client().ranges.lock().unwrap(), vec![(7, 7)]);
    }
}
