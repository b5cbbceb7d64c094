//! pinmirror-storage: checkpoint stores for pinmirror.
//!
//! Backends:
//! - [`json_file`]: a key in a JSON object file (the legacy `config.json`)
//! - [`sqlite`]: SQLite via `sqlx`, one row per mirror (feature `sqlite`)
//!
//! The in-memory store lives in `pinmirror-core`.

pub mod json_file;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use json_file::JsonFileCheckpointStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointStore;
