//! Mirror engine: converges one name's mirror directory to its latest
//! content reference.
//!
//! # Per-name algorithm
//! 1. No `content` field, or a falsy one (`null`, `false`, `0`, `""`) → `NoContent`.
//! 2. `content` is not `ipfs://<cid>` or `/ipfs/<cid>` → `AltContent` (no store calls).
//! 3. Stat the CID; larger than the limit → `TooLarge` (no mutation).
//! 4. Ensure `<base>/<name>` exists and list it. A single child already
//!    reflecting this block and CID → `Mirrored(Unchanged)`; an owned one
//!    whose pin is missing is pinned again.
//! 5. CID pinned by something other than this name's own children → copy as
//!    `<block>-nopin`, no pin. Otherwise copy as `<block>` and pin; a failed
//!    pin is a warning, not a failure.
//! 6. Only after the copy, unpin every other owned child (not `-nopin`,
//!    not holding the new CID) and remove it.
//!
//! Any store error in steps 3–6 yields `Failed`. A failed stat, list or
//! copy leaves the previous mirror and its pin in place.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::content::{ContentRef, ContentStore, DirEntry, MirrorChild, StatInfo};
use crate::error::StoreError;
use crate::types::ParsedUpdate;

/// Engine parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSettings {
    /// Namespace directory holding one sub-directory per name.
    pub base_dir: String,
    /// Largest cumulative size (bytes) that will be mirrored.
    pub max_content_size: u64,
}

/// How a successful mirror was achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorAction {
    /// Copied and pinned.
    Pinned,
    /// Copied; the CID was already pinned so the child is marked shared.
    Shared,
    /// Copied, but pinning failed.
    PinFailed,
    /// The mirror already reflected this block and CID.
    Unchanged,
}

/// Result of mirroring one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MirrorOutcome {
    Mirrored { action: MirrorAction, cid: String },
    TooLarge { size: u64, limit: u64 },
    AltContent,
    NoContent,
    Failed { reason: String },
}

/// Per-name entry of the batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorResult {
    pub name: String,
    pub block_number: u64,
    #[serde(flatten)]
    pub outcome: MirrorOutcome,
}

/// Drives a [`ContentStore`] to mirror name updates.
pub struct MirrorEngine {
    store: Arc<dyn ContentStore>,
    settings: MirrorSettings,
}

impl MirrorEngine {
    pub fn new(store: Arc<dyn ContentStore>, settings: MirrorSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &MirrorSettings {
        &self.settings
    }

    /// Create the base directory. Safe to call on every run.
    pub async fn prepare(&self) -> Result<(), StoreError> {
        match self.store.mkdir(&self.settings.base_dir).await {
            Err(e) if e.is_already_exists() => Ok(()),
            other => other,
        }
    }

    /// The mirror directory for `name`.
    pub fn mirror_dir(&self, name: &str) -> String {
        format!("{}/{name}", self.settings.base_dir.trim_end_matches('/'))
    }

    /// Mirror one update and report the outcome. Never returns an error:
    /// store failures are reported as [`MirrorOutcome::Failed`].
    pub async fn mirror(&self, update: &ParsedUpdate) -> MirrorResult {
        let outcome = self.mirror_outcome(update).await;
        MirrorResult {
            name: update.name.clone(),
            block_number: update.block_number,
            outcome,
        }
    }

    async fn mirror_outcome(&self, update: &ParsedUpdate) -> MirrorOutcome {
        let Some(content) = update.content() else {
            return MirrorOutcome::NoContent;
        };
        let Some(content_ref) = content.as_str().and_then(ContentRef::parse) else {
            debug!(site = %update.name, %content, "unsupported content reference");
            return MirrorOutcome::AltContent;
        };
        if let Err(reason) = check_name(&update.name) {
            error!(site = %update.name, %reason, "refusing to mirror");
            return MirrorOutcome::Failed { reason };
        }

        match self
            .converge(&update.name, update.block_number, &content_ref)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(site = %update.name, src = %content_ref, error = %e, "mirror failed");
                MirrorOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn converge(
        &self,
        name: &str,
        block: u64,
        content_ref: &ContentRef,
    ) -> Result<MirrorOutcome, StoreError> {
        let src = content_ref.ipfs_path();
        let StatInfo {
            cid,
            cumulative_size,
        } = self.store.stat(&src).await?;

        if cumulative_size > self.settings.max_content_size {
            info!(
                site = name,
                %src,
                size = cumulative_size,
                limit = self.settings.max_content_size,
                "content too large"
            );
            return Ok(MirrorOutcome::TooLarge {
                size: cumulative_size,
                limit: self.settings.max_content_size,
            });
        }

        let dir = self.mirror_dir(name);
        match self.store.mkdir(&dir).await {
            Err(e) if !e.is_already_exists() => return Err(e),
            _ => {}
        }
        let children = self.store.list(&dir).await?;

        if let [only] = children.as_slice() {
            if is_current(only, block, &cid) {
                return self.confirm_current(name, only, &src, cid).await;
            }
        }

        // A pin held by one of this name's own children stays owned.
        let owned = children
            .iter()
            .any(|c| c.cid == cid && !MirrorChild::is_shared_name(&c.name));
        let shared = !owned && !self.store.pin_list(content_ref.cid()).await?.is_empty();
        let child_name = MirrorChild::new(block, shared).to_string();
        let dst = format!("{dir}/{child_name}");

        match children.iter().find(|c| c.name == child_name) {
            Some(existing) if existing.cid == cid => {
                debug!(site = name, %dst, "reusing existing child");
            }
            Some(existing) => {
                // Same path, different content: it has to go before the copy.
                self.retire(&dir, existing, &cid).await?;
                self.store.copy(&src, &dst).await?;
            }
            None => self.store.copy(&src, &dst).await?,
        }

        let action = if shared {
            MirrorAction::Shared
        } else {
            self.pin(name, &src).await
        };

        for child in children.iter().filter(|c| c.name != child_name) {
            self.retire(&dir, child, &cid).await?;
        }

        info!(site = name, %src, dst = %dst, ?action, "mirrored");
        Ok(MirrorOutcome::Mirrored { action, cid })
    }

    /// The single existing child already mirrors this update. An owned child
    /// whose pin went missing (e.g. an earlier soft-failed pin) is re-pinned.
    async fn confirm_current(
        &self,
        name: &str,
        child: &DirEntry,
        src: &str,
        cid: String,
    ) -> Result<MirrorOutcome, StoreError> {
        if !MirrorChild::is_shared_name(&child.name) && self.store.pin_list(&cid).await?.is_empty() {
            warn!(site = name, %cid, "current mirror is not pinned, pinning again");
            let action = self.pin(name, src).await;
            return Ok(MirrorOutcome::Mirrored { action, cid });
        }
        debug!(site = name, child = %child.name, %cid, "mirror already current");
        Ok(MirrorOutcome::Mirrored {
            action: MirrorAction::Unchanged,
            cid,
        })
    }

    /// Pin `src`; a failure is logged and reported, never propagated.
    async fn pin(&self, name: &str, src: &str) -> MirrorAction {
        match self.store.pin_add(src).await {
            Ok(()) => MirrorAction::Pinned,
            Err(e) => {
                warn!(site = name, %src, error = %e, "failed to pin");
                MirrorAction::PinFailed
            }
        }
    }

    /// Remove an old mirror child, unpinning it first if it owns its pin and
    /// does not hold `keep_cid`.
    async fn retire(&self, dir: &str, child: &DirEntry, keep_cid: &str) -> Result<(), StoreError> {
        let path = format!("{dir}/{}", child.name);
        if !MirrorChild::is_shared_name(&child.name) && child.cid != keep_cid {
            let reference = crate::content::ipfs_path(&child.cid);
            match self.store.pin_remove(&reference).await {
                Ok(()) => debug!(%path, cid = %child.cid, "unpinned previous mirror"),
                Err(e) if e.is_not_pinned() => {
                    warn!(%path, cid = %child.cid, "tried to unpin unpinned content")
                }
                Err(e) => return Err(e),
            }
        }
        self.store.remove(&path).await
    }
}

/// Returns `true` if `child` is the mirror of `block` holding `cid`.
fn is_current(child: &DirEntry, block: u64, cid: &str) -> bool {
    child.cid == cid && MirrorChild::parse(&child.name).is_some_and(|c| c.block_number == block)
}

/// Names become a single path segment under the base directory.
fn check_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(format!("name {name:?} is not a valid directory name"));
    }
    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
