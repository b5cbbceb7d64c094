//! Content store seam, content references, and mirror-child naming.
//!
//! The store exposes a mutable directory namespace (`mkdir`/`list`/`copy`/
//! `remove`) layered over immutable, content-addressed data, plus a pin set.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;

/// Suffix marking a mirror child whose CID is pinned on behalf of something
/// else. Cleanup never unpins such a child.
pub const SHARED_SUFFIX: &str = "-nopin";

/// Result of `stat` on a path or `/ipfs/<cid>` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatInfo {
    pub cid: String,
    /// Total size of the DAG rooted at `cid`, in bytes.
    pub cumulative_size: u64,
}

/// One child of a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub cid: String,
}

/// One entry of the store's pin set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinRecord {
    pub cid: String,
    /// Store-specific pin type (`recursive`, `direct`, `indirect`, …).
    pub pin_type: String,
}

/// A content-addressed store with a mutable directory namespace and pins.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Create a directory (and parents). An existing directory is not an error.
    async fn mkdir(&self, path: &str) -> Result<(), StoreError>;

    /// Stat a namespace path or an `/ipfs/<cid>` reference.
    async fn stat(&self, path: &str) -> Result<StatInfo, StoreError>;

    /// Direct children of a directory.
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, StoreError>;

    /// Copy `src` (usually `/ipfs/<cid>`) to `dst` in the namespace.
    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError>;

    /// Remove `path` recursively.
    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    async fn pin_add(&self, reference: &str) -> Result<(), StoreError>;

    /// Unpin `reference`. Returns [`StoreError::NotPinned`] if it was not pinned.
    async fn pin_remove(&self, reference: &str) -> Result<(), StoreError>;

    /// Pins covering `cid`; empty if it is not pinned.
    async fn pin_list(&self, cid: &str) -> Result<Vec<PinRecord>, StoreError>;
}

// ─── ContentRef ───────────────────────────────────────────────────────────────

/// A recognised content reference: `ipfs://<CID>` or `/ipfs/<CID>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    cid: String,
}

impl ContentRef {
    /// Parse a content value. Returns `None` for any other scheme.
    ///
    /// The CID is the leading run of ASCII alphanumerics after the prefix;
    /// anything after it (a sub-path, a query) is ignored.
    pub fn parse(content: &str) -> Option<Self> {
        let rest = content
            .strip_prefix("ipfs://")
            .or_else(|| content.strip_prefix("/ipfs/"))?;
        let end = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        Some(Self {
            cid: rest[..end].to_string(),
        })
    }

    pub fn cid(&self) -> &str {
        &self.cid
    }

    /// The `/ipfs/<cid>` path form used for stat, copy and pin calls.
    pub fn ipfs_path(&self) -> String {
        ipfs_path(&self.cid)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/ipfs/{}", self.cid)
    }
}

pub fn ipfs_path(cid: &str) -> String {
    format!("/ipfs/{cid}")
}

// ─── MirrorChild ──────────────────────────────────────────────────────────────

/// The name of the single child inside a mirror directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorChild {
    pub block_number: u64,
    /// `true` if the CID was already pinned when mirrored.
    pub shared: bool,
}

impl MirrorChild {
    pub fn new(block_number: u64, shared: bool) -> Self {
        Self {
            block_number,
            shared,
        }
    }

    /// Parse a child name; `None` if it was not written by the mirror engine.
    pub fn parse(name: &str) -> Option<Self> {
        let (digits, shared) = match name.strip_suffix(SHARED_SUFFIX) {
            Some(d) => (d, true),
            None => (name, false),
        };
        digits.parse().ok().map(|block_number| Self {
            block_number,
            shared,
        })
    }

    /// Returns `true` if cleanup must leave the pin alone. Unknown child
    /// names are treated as owned, like any child without the suffix.
    pub fn is_shared_name(name: &str) -> bool {
        name.ends_with(SHARED_SUFFIX)
    }
}

impl fmt::Display for MirrorChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.shared {
            write!(f, "{}{SHARED_SUFFIX}", self.block_number)
        } else {
            write!(f, "{}", self.block_number)
        }
    }
}
