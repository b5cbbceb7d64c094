//! Event source and payload decoder seams.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{DecodeError, SourceError};
use crate::types::{ChangeEvent, DecodedUpdate, TxRef};

/// Fetches ordered change events and their transaction payloads.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Current chain height.
    async fn current_height(&self) -> Result<u64, SourceError>;

    /// All change events in `[from, to]` (inclusive), ordered by block number.
    async fn query_events(&self, from: u64, to: u64) -> Result<Vec<ChangeEvent>, SourceError>;

    /// Raw payload (calldata) of the transaction that emitted an event.
    async fn transaction_payload(&self, tx: &TxRef) -> Result<Vec<u8>, SourceError>;
}

/// Decodes a transaction payload into `(name, fields)`.
pub trait UpdateDecoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Result<DecodedUpdate, DecodeError>;
}

// ─── In-memory source (for testing) ───────────────────────────────────────────

/// A fixed, in-memory event source.
#[derive(Default)]
pub struct StaticEventSource {
    height: u64,
    events: Vec<ChangeEvent>,
    payloads: HashMap<TxRef, Vec<u8>>,
    queried: Mutex<Vec<(u64, u64)>>,
}

impl StaticEventSource {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            ..Default::default()
        }
    }

    /// Add an event with the payload its transaction carries.
    pub fn with_event(mut self, event: ChangeEvent, payload: impl Into<Vec<u8>>) -> Self {
        self.payloads.insert(event.tx_ref.clone(), payload.into());
        self.events.push(event);
        self
    }

    /// Add an event whose transaction cannot be fetched.
    pub fn with_orphan_event(mut self, event: ChangeEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Ranges passed to `query_events`, in call order.
    pub fn queried_ranges(&self) -> Vec<(u64, u64)> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSource for StaticEventSource {
    async fn current_height(&self) -> Result<u64, SourceError> {
        Ok(self.height)
    }

    async fn query_events(&self, from: u64, to: u64) -> Result<Vec<ChangeEvent>, SourceError> {
        self.queried.lock().unwrap().push((from, to));
        let mut events: Vec<ChangeEvent> = self
            .events
            .iter()
            .filter(|e| e.block_number >= from && e.block_number <= to)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    async fn transaction_payload(&self, tx: &TxRef) -> Result<Vec<u8>, SourceError> {
        self.payloads
            .get(tx)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                what: format!("transaction {tx}"),
            })
    }
}
