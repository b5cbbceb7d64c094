//! [`EventSource`] over an EVM JSON-RPC endpoint.

use async_trait::async_trait;
use tracing::debug;

use pinmirror_core::error::SourceError;
use pinmirror_core::source::EventSource;
use pinmirror_core::types::{ChangeEvent, TxRef};

use crate::abi::{topic_hex, ContractAbi};
use crate::fetcher::{parse_hex_bytes, EvmFetcher, EvmRpcClient, LogFilter, RawLog};

/// Which logs to follow.
#[derive(Debug, Clone)]
pub struct EventSourceConfig {
    pub contract_address: String,
    pub event_name: String,
    /// Max blocks per `eth_getLogs` request.
    pub log_range: u64,
}

/// Reads change events and transaction calldata from an EVM chain.
pub struct EvmEventSource<C> {
    fetcher: EvmFetcher<C>,
    filter: LogFilter,
    event_name: String,
    log_range: u64,
}

impl<C: EvmRpcClient> EvmEventSource<C> {
    /// Fails if the event is missing from the ABI.
    pub fn new(client: C, abi: &ContractAbi, config: EventSourceConfig) -> Result<Self, SourceError> {
        let topic = abi.event_topic(&config.event_name)?;
        Ok(Self {
            fetcher: EvmFetcher::new(client),
            filter: LogFilter {
                address: config.contract_address,
                topic0: topic_hex(&topic),
            },
            event_name: config.event_name,
            log_range: config.log_range,
        })
    }

    pub fn filter(&self) -> &LogFilter {
        &self.filter
    }

    fn to_event(&self, log: RawLog) -> Result<ChangeEvent, SourceError> {
        Ok(ChangeEvent {
            name: self.event_name.clone(),
            raw_payload: parse_hex_bytes(&log.data)?,
            block_number: log.block_number_u64()?,
            log_index: log.log_index_u32()?,
            tx_ref: TxRef::new(log.tx_hash),
        })
    }
}

#[async_trait]
impl<C: EvmRpcClient> EventSource for EvmEventSource<C> {
    async fn current_height(&self) -> Result<u64, SourceError> {
        self.fetcher.head_block_number().await
    }

    async fn query_events(&self, from: u64, to: u64) -> Result<Vec<ChangeEvent>, SourceError> {
        let logs = self
            .fetcher
            .logs(from, to, &self.filter, self.log_range)
            .await?;
        let mut events = logs
            .into_iter()
            .filter(|log| !log.is_removed())
            .map(|log| self.to_event(log))
            .collect::<Result<Vec<_>, _>>()?;
        events.sort_by_key(|e| (e.block_number, e.log_index));
        debug!(from, to, events = events.len(), event = %self.event_name, "queried events");
        Ok(events)
    }

    async fn transaction_payload(&self, tx: &TxRef) -> Result<Vec<u8>, SourceError> {
        let input = self
            .fetcher
            .transaction_input(tx.as_str())
            .await?
            .ok_or_else(|| SourceError::NotFound {
                what: format!("transaction {tx}"),
            })?;
        parse_hex_bytes(&input)
    }
}
