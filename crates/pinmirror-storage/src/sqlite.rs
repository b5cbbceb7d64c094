//! SQLite checkpoint store.
//!
//! One row per mirror in a `checkpoints` table, so several mirrors (e.g.
//! different contracts or base directories) can share a database file.
//!
//! # Usage
//! ```rust,no_run
//! use pinmirror_storage::sqlite::SqliteCheckpointStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteCheckpointStore::open("./pinmirror.db", "pool").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use pinmirror_core::checkpoint::{Checkpoint, CheckpointStore};
use pinmirror_core::error::CheckpointError;

fn storage_err(e: sqlx::Error) -> CheckpointError {
    CheckpointError::Storage(e.to_string())
}

/// SQLite-backed [`CheckpointStore`] for one mirror id.
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
    mirror_id: String,
}

impl SqliteCheckpointStore {
    /// Open (or create) the database at `path`. Accepts a plain file path or
    /// a full `sqlite:` URL.
    pub async fn open(path: &str, mirror_id: impl Into<String>) -> Result<Self, CheckpointError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        Self::with_pool(pool, mirror_id).await
    }

    /// In-memory database; all data is lost when the pool is dropped.
    pub async fn in_memory(mirror_id: impl Into<String>) -> Result<Self, CheckpointError> {
        // Every connection to `:memory:` is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;
        Self::with_pool(pool, mirror_id).await
    }

    async fn with_pool(pool: SqlitePool, mirror_id: impl Into<String>) -> Result<Self, CheckpointError> {
        let store = Self {
            pool,
            mirror_id: mirror_id.into(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), CheckpointError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                mirror_id    TEXT    NOT NULL PRIMARY KEY,
                block_number INTEGER NOT NULL,
                updated_at   INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let row = sqlx::query(
            "SELECT block_number, updated_at FROM checkpoints WHERE mirror_id = ?",
        )
        .bind(&self.mirror_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(|r| {
            let block: i64 = r.get("block_number");
            let last_queried_block = u64::try_from(block).map_err(|_| CheckpointError::Corrupt {
                reason: format!("negative block number {block}"),
            })?;
            Ok(Checkpoint {
                last_queried_block,
                updated_at: r.get("updated_at"),
            })
        })
        .transpose()
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        let block = i64::try_from(checkpoint.last_queried_block).map_err(|_| {
            CheckpointError::Storage(format!(
                "block {} does not fit in SQLite INTEGER",
                checkpoint.last_queried_block
            ))
        })?;
        sqlx::query(
            "INSERT OR REPLACE INTO checkpoints (mirror_id, block_number, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(&self.mirror_id)
        .bind(block)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(
            mirror_id = %self.mirror_id,
            block = checkpoint.last_queried_block,
            "checkpoint saved"
        );
        Ok(())
    }
}
