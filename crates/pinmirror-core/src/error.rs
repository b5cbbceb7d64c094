//! Error types for the mirroring pipeline.
//!
//! Per-item errors (`DecodeError`, `StoreError`) are recovered by the
//! reconciler and the mirror engine and end up as counted outcomes. Only
//! [`RunError`] escapes a run.

use thiserror::Error;

/// A transaction payload that does not match the expected update shape.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload too short: {len} bytes (need at least 4 for selector)")]
    PayloadTooShort { len: usize },

    #[error("no function found for selector 0x{selector}")]
    UnknownSelector { selector: String },

    #[error("ABI decode failed: {reason}")]
    AbiDecodeFailed { reason: String },

    #[error("unexpected call arguments: {reason}")]
    UnexpectedArguments { reason: String },

    #[error("fields are not valid JSON: {0}")]
    InvalidFields(#[from] serde_json::Error),

    #[error("fields must be a JSON object, got {kind}")]
    FieldsNotObject { kind: &'static str },
}

/// Errors returned by a content store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The reference was not pinned. Recoverable during cleanup.
    #[error("not pinned: {reference}")]
    NotPinned { reference: String },

    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    #[error("not found: {path}")]
    NotFound { path: String },

    /// The store answered with an error we do not classify further.
    #[error("store API error: {0}")]
    Api(String),

    /// The store could not be reached or answered garbage.
    #[error("store transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Returns `true` if unpinning failed only because nothing was pinned.
    pub fn is_not_pinned(&self) -> bool {
        matches!(self, Self::NotPinned { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Errors returned by an event source adapter.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid source configuration: {0}")]
    Config(String),
}

impl SourceError {
    /// Returns `true` if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Errors from a checkpoint store.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("corrupt checkpoint: {reason}")]
    Corrupt { reason: String },
}

/// Errors while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to load checkpoint: {0}")]
    CheckpointLoad(#[source] CheckpointError),

    #[error("failed to save checkpoint at block {block}: {source}")]
    CheckpointSave {
        block: u64,
        #[source]
        source: CheckpointError,
    },

    #[error("event source error: {0}")]
    Source(#[from] SourceError),

    #[error("failed to prepare mirror root {path}: {source}")]
    MirrorRoot {
        path: String,
        #[source]
        source: StoreError,
    },
}

impl RunError {
    /// Returns `true` if the run got as far as mirroring but could not
    /// commit its checkpoint. The next run reprocesses the same range.
    pub fn is_uncommitted(&self) -> bool {
        matches!(self, Self::CheckpointSave { .. })
    }
}
