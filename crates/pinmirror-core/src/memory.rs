//! In-memory content store.
//!
//! Models the directory namespace and pin set closely enough to exercise
//! the mirror engine: directories must exist before children are copied
//! into them, copies onto an existing path fail, and unpinning something
//! that is not pinned reports [`StoreError::NotPinned`]. Every call is
//! recorded so tests can assert which mutations happened.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use crate::content::{ContentStore, DirEntry, PinRecord, StatInfo};
use crate::error::StoreError;

/// Store operation kinds, used for call logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Mkdir,
    Stat,
    List,
    Copy,
    Remove,
    PinAdd,
    PinRemove,
    PinList,
}

impl StoreOp {
    /// Returns `true` for operations that change the namespace or pin set.
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::Copy | Self::Remove | Self::PinAdd | Self::PinRemove
        )
    }
}

/// One recorded call: operation plus its first argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub arg: String,
}

#[derive(Default)]
struct Inner {
    /// Known content: cid → cumulative size.
    blobs: HashMap<String, u64>,
    dirs: BTreeSet<String>,
    /// Namespace files: path → cid.
    files: BTreeMap<String, String>,
    pins: BTreeSet<String>,
    calls: Vec<StoreCall>,
    failing: HashSet<StoreOp>,
}

/// In-memory [`ContentStore`] for tests.
#[derive(Default)]
pub struct MemoryContentStore {
    inner: Mutex<Inner>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.inner.lock().unwrap().dirs.insert("/".to_string());
        store
    }

    /// Make `cid` resolvable with the given cumulative size.
    pub fn add_content(&self, cid: &str, cumulative_size: u64) {
        self.inner
            .lock()
            .unwrap()
            .blobs
            .insert(cid.to_string(), cumulative_size);
    }

    /// Pin `cid` directly, outside of any mirror.
    pub fn pin_directly(&self, cid: &str) {
        self.inner.lock().unwrap().pins.insert(cid.to_string());
    }

    /// Make every call of `op` fail with a [`StoreError::Api`] error.
    pub fn fail(&self, op: StoreOp) {
        self.inner.lock().unwrap().failing.insert(op);
    }

    /// Stop failing `op`.
    pub fn heal(&self, op: StoreOp) {
        self.inner.lock().unwrap().failing.remove(&op);
    }

    pub fn is_pinned(&self, cid: &str) -> bool {
        self.inner.lock().unwrap().pins.contains(cid)
    }

    pub fn dir_exists(&self, path: &str) -> bool {
        self.inner.lock().unwrap().dirs.contains(path)
    }

    /// `(name, cid)` of every direct child of `dir`, sorted by name.
    pub fn children(&self, dir: &str) -> Vec<(String, String)> {
        let inner = self.inner.lock().unwrap();
        direct_children(&inner, dir)
            .into_iter()
            .map(|e| (e.name, e.cid))
            .collect()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Calls that changed the namespace or pin set.
    pub fn mutations(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.op.is_mutation())
            .collect()
    }

    pub fn count(&self, op: StoreOp) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    fn begin(&self, op: StoreOp, arg: &str) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StoreCall {
            op,
            arg: arg.to_string(),
        });
        if inner.failing.contains(&op) {
            return Err(StoreError::Api(format!("injected {op:?} failure for {arg}")));
        }
        Ok(inner)
    }
}

fn cid_of_reference(reference: &str) -> &str {
    reference.strip_prefix("/ipfs/").unwrap_or(reference)
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "/",
    }
}

fn direct_children(inner: &Inner, dir: &str) -> Vec<DirEntry> {
    let mut entries: Vec<DirEntry> = inner
        .files
        .iter()
        .filter(|(path, _)| parent_of(path) == dir)
        .map(|(path, cid)| DirEntry {
            name: path.rsplit('/').next().unwrap_or_default().to_string(),
            cid: cid.clone(),
        })
        .collect();
    for sub in inner.dirs.iter().filter(|d| d.as_str() != "/" && parent_of(d) == dir) {
        entries.push(DirEntry {
            name: sub.rsplit('/').next().unwrap_or_default().to_string(),
            cid: format!("dir:{sub}"),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn mkdir(&self, path: &str) -> Result<(), StoreError> {
        let mut inner = self.begin(StoreOp::Mkdir, path)?;
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            inner.dirs.insert(current.clone());
        }
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<StatInfo, StoreError> {
        let inner = self.begin(StoreOp::Stat, path)?;
        let cid = if path.starts_with("/ipfs/") {
            cid_of_reference(path).to_string()
        } else {
            inner
                .files
                .get(path)
                .cloned()
                .ok_or_else(|| StoreError::NotFound { path: path.into() })?
        };
        let size = inner
            .blobs
            .get(&cid)
            .copied()
            .ok_or_else(|| StoreError::NotFound { path: path.into() })?;
        Ok(StatInfo {
            cid,
            cumulative_size: size,
        })
    }

    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, StoreError> {
        let inner = self.begin(StoreOp::List, path)?;
        if !inner.dirs.contains(path) {
            return Err(StoreError::NotFound { path: path.into() });
        }
        Ok(direct_children(&inner, path))
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        let mut inner = self.begin(StoreOp::Copy, dst)?;
        let cid = cid_of_reference(src).to_string();
        if !inner.blobs.contains_key(&cid) {
            return Err(StoreError::NotFound { path: src.into() });
        }
        if !inner.dirs.contains(parent_of(dst)) {
            return Err(StoreError::NotFound {
                path: parent_of(dst).into(),
            });
        }
        if inner.files.contains_key(dst) || inner.dirs.contains(dst) {
            return Err(StoreError::AlreadyExists { path: dst.into() });
        }
        inner.files.insert(dst.to_string(), cid);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let mut inner = self.begin(StoreOp::Remove, path)?;
        let prefix = format!("{path}/");
        let existed = inner.files.remove(path).is_some() | inner.dirs.remove(path);
        inner.files.retain(|p, _| !p.starts_with(&prefix));
        inner.dirs.retain(|d| !d.starts_with(&prefix));
        if existed {
            Ok(())
        } else {
            Err(StoreError::NotFound { path: path.into() })
        }
    }

    async fn pin_add(&self, reference: &str) -> Result<(), StoreError> {
        let mut inner = self.begin(StoreOp::PinAdd, reference)?;
        let cid = cid_of_reference(reference).to_string();
        if !inner.blobs.contains_key(&cid) {
            return Err(StoreError::NotFound {
                path: reference.into(),
            });
        }
        inner.pins.insert(cid);
        Ok(())
    }

    async fn pin_remove(&self, reference: &str) -> Result<(), StoreError> {
        let mut inner = self.begin(StoreOp::PinRemove, reference)?;
        if inner.pins.remove(cid_of_reference(reference)) {
            Ok(())
        } else {
            Err(StoreError::NotPinned {
                reference: reference.into(),
            })
        }
    }

    async fn pin_list(&self, cid: &str) -> Result<Vec<PinRecord>, StoreError> {
        let inner = self.begin(StoreOp::PinList, cid)?;
        Ok(inner
            .pins
            .iter()
            .filter(|p| p.as_str() == cid)
            .map(|p| PinRecord {
                cid: p.clone(),
                pin_type: "recursive".into(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copy_requires_parent_and_free_destination() {
        let store = MemoryContentStore::new();
        store.add_content("QmA", 10);

        let err = store.copy("/ipfs/QmA", "/pool/alice/1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        store.mkdir("/pool/alice").await.unwrap();
        store.copy("/ipfs/QmA", "/pool/alice/1").await.unwrap();
        let err = store.copy("/ipfs/QmA", "/pool/alice/1").await.unwrap_err();
        assert!(err.is_already_exists());

        assert_eq!(store.children("/pool/alice"), vec![("1".into(), "QmA".into())]);
        assert_eq!(store.children("/pool"), vec![("alice".into(), "dir:/pool/alice".into())]);
    }

    #[tokio::test]
    async fn unpinning_unpinned_content_is_reported() {
        let store = MemoryContentStore::new();
        store.add_content("QmA", 10);
        store.pin_add("/ipfs/QmA").await.unwrap();
        store.pin_remove("/ipfs/QmA").await.unwrap();
        assert!(store.pin_remove("/ipfs/QmA").await.unwrap_err().is_not_pinned());
    }

    #[tokio::test]
    async fn injected_failures_are_recorded() {
        let store = MemoryContentStore::new();
        store.fail(StoreOp::Stat);
        assert!(matches!(store.stat("/ipfs/QmA").await, Err(StoreError::Api(_))));
        assert_eq!(store.count(StoreOp::Stat), 1);
        store.heal(StoreOp::Stat);
        assert!(matches!(store.stat("/ipfs/QmA").await, Err(StoreError::NotFound { .. })));
    }
}
