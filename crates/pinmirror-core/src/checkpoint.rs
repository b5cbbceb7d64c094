//! Checkpoint manager: persists the last block a run fully processed.
//!
//! The checkpoint is read once when a run starts and written once after the
//! whole batch is mirrored. It is never advanced mid-batch, so a crash
//! during mirroring causes the whole range to be reprocessed next time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;

/// A persisted checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Last block height covered by a completed run.
    pub last_queried_block: u64,
    /// Unix timestamp of when this checkpoint was saved.
    pub updated_at: i64,
}

impl Checkpoint {
    pub fn at(block: u64) -> Self {
        Self {
            last_queried_block: block,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Trait for storing and loading the checkpoint.
///
/// Implementations include [`MemoryCheckpointStore`] here and the file and
/// SQLite stores in `pinmirror-storage`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the saved checkpoint, `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Save (overwrite) the checkpoint.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError>;
}

/// Reads and writes block heights through a [`CheckpointStore`].
pub struct CheckpointManager {
    store: Box<dyn CheckpointStore>,
}

impl CheckpointManager {
    pub fn new(store: Box<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    /// Load the saved checkpoint (returns `None` if none exists).
    pub async fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        self.store.load().await
    }

    /// The block the next run starts from; `0` if nothing was saved.
    pub async fn load_block(&self) -> Result<u64, CheckpointError> {
        Ok(self
            .store
            .load()
            .await?
            .map(|cp| cp.last_queried_block)
            .unwrap_or(0))
    }

    /// Persist `block` as the last fully processed height.
    pub async fn save_block(&self, block: u64) -> Result<(), CheckpointError> {
        self.store.save(Checkpoint::at(block)).await
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

use std::sync::Mutex;

/// In-memory checkpoint store for tests and dry runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<Option<Checkpoint>>,
    fail_saves: bool,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a checkpoint already saved at `block`.
    pub fn starting_at(block: u64) -> Self {
        Self {
            data: Mutex::new(Some(Checkpoint::at(block))),
            fail_saves: false,
        }
    }

    /// A store whose `save` always fails.
    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.data.lock().unwrap().clone())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        if self.fail_saves {
            return Err(CheckpointError::Storage("store is read-only".into()));
        }
        *self.data.lock().unwrap() = Some(checkpoint);
        Ok(())
    }
}

#[async_trait]
impl<T: CheckpointStore + ?Sized> CheckpointStore for std::sync::Arc<T> {
    async fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        (**self).load().await
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        (**self).save(checkpoint).await
    }
}
