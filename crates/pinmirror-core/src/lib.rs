//! pinmirror-core: mirrors on-chain name → content updates into IPFS.
//!
//! # Architecture
//!
//! ```text
//! RunCoordinator
//!     ├── CheckpointManager (last fully processed block)
//!     ├── EventSource       (chain head, change events, tx payloads)
//!     ├── Reconciler        (decode + latest update per name)
//!     └── MirrorEngine      (converge <base>/<name> through a ContentStore)
//! ```
//!
//! Adapters live in sibling crates: `pinmirror-evm` (event source and ABI
//! decoder), `pinmirror-ipfs` (Kubo content store) and `pinmirror-storage`
//! (file and SQLite checkpoint stores).

pub mod checkpoint;
pub mod config;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod mirror;
pub mod reconcile;
pub mod report;
pub mod source;
pub mod types;

#[cfg(test)]
mod testing;

pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointStore, MemoryCheckpointStore};
pub use config::MirrorConfig;
pub use content::{ContentRef, ContentStore, DirEntry, MirrorChild, PinRecord, StatInfo};
pub use coordinator::{RunCoordinator, RunPhase};
pub use error::{CheckpointError, ConfigError, DecodeError, RunError, SourceError, StoreError};
pub use memory::MemoryContentStore;
pub use mirror::{MirrorAction, MirrorEngine, MirrorOutcome, MirrorResult, MirrorSettings};
pub use reconcile::{Reconciler, Reconciliation};
pub use report::RunReport;
pub use source::{EventSource, StaticEventSource, UpdateDecoder};
pub use types::{ChangeEvent, DecodedUpdate, FetchedEvent, ParsedUpdate, TxRef, UpdateFields};
