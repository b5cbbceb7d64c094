//! Checkpoint kept as a key of a JSON object file.
//!
//! By default the file is the mirror's own `config.json`: the checkpoint is
//! `LAST_QUERIED_BLOCK` and every other key is preserved on save. Writes go
//! to a sibling temp file that is renamed over the original, so a crash
//! never leaves a half-written config behind.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use pinmirror_core::checkpoint::{Checkpoint, CheckpointStore};
use pinmirror_core::error::CheckpointError;

pub const BLOCK_KEY: &str = "LAST_QUERIED_BLOCK";
pub const UPDATED_AT_KEY: &str = "LAST_QUERIED_AT";

/// [`CheckpointStore`] backed by a JSON object file.
#[derive(Debug, Clone)]
pub struct JsonFileCheckpointStore {
    path: PathBuf,
}

impl JsonFileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file's top-level object, empty if the file does not exist.
    async fn read_object(&self) -> Result<Map<String, Value>, CheckpointError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(CheckpointError::Corrupt {
                reason: format!("{} is not a JSON object", self.path.display()),
            }),
        }
    }

    async fn write_object(&self, object: &Map<String, Value>) -> Result<(), CheckpointError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        object.serialize(&mut ser)?;

        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, &buf).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "checkpoint".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl CheckpointStore for JsonFileCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let object = self.read_object().await?;
        let block = match object.get(BLOCK_KEY) {
            None | Some(Value::Null) => return Ok(None),
            Some(v) => v.as_u64().ok_or_else(|| CheckpointError::Corrupt {
                reason: format!("{BLOCK_KEY} is not a block number: {v}"),
            })?,
        };
        let updated_at = object
            .get(UPDATED_AT_KEY)
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(Some(Checkpoint {
            last_queried_block: block,
            updated_at,
        }))
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        let mut object = self.read_object().await?;
        object.insert(BLOCK_KEY.into(), checkpoint.last_queried_block.into());
        object.insert(UPDATED_AT_KEY.into(), checkpoint.updated_at.into());
        self.write_object(&object).await?;
        debug!(
            path = %self.path.display(),
            block = checkpoint.last_queried_block,
            "checkpoint saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "pinmirror-json-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[tokio::test]
    async fn missing_file_has_no_checkpoint() {
        let store = JsonFileCheckpointStore::new(scratch("config.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_preserves_other_keys() {
        let path = scratch("config.json");
        std::fs::write(
            &path,
            r#"{"RPC_URL":"https://rpc.example","MAX_CONTENT_SIZE":1000}"#,
        )
        .unwrap();
        let store = JsonFileCheckpointStore::new(&path);
        assert!(store.load().await.unwrap().is_none());

        store.save(Checkpoint::at(4242)).await.unwrap();

        let cp = store.load().await.unwrap().unwrap();
        assert_eq!(cp.last_queried_block, 4242);
        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["RPC_URL"], "https://rpc.example");
        assert_eq!(written["MAX_CONTENT_SIZE"], 1000);
        assert_eq!(written[BLOCK_KEY], 4242);
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn legacy_checkpoint_is_read() {
        let path = scratch("config.json");
        std::fs::write(&path, r#"{"LAST_QUERIED_BLOCK": 17000000}"#).unwrap();
        let cp = JsonFileCheckpointStore::new(&path).load().await.unwrap().unwrap();
        assert_eq!(cp.last_queried_block, 17_000_000);
        assert_eq!(cp.updated_at, 0);
    }

    #[tokio::test]
    async fn non_numeric_checkpoint_is_corrupt() {
        let path = scratch("config.json");
        std::fs::write(&path, r#"{"LAST_QUERIED_BLOCK": "soon"}"#).unwrap();
        let err = JsonFileCheckpointStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, CheckpointError::Corrupt { .. }));

        std::fs::write(&path, "[1, 2]").unwrap();
        let err = JsonFileCheckpointStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, CheckpointError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn save_into_missing_directory_fails() {
        let path = scratch("config.json").with_file_name("nope").join("config.json");
        let err = JsonFileCheckpointStore::new(path)
            .save(Checkpoint::at(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::Io(_)));
    }
}
