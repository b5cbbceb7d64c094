//! Kubo RPC response bodies.

use serde::Deserialize;
use std::collections::BTreeMap;

use pinmirror_core::content::{DirEntry, PinRecord, StatInfo};
use pinmirror_core::error::StoreError;

/// Error body Kubo returns with a non-2xx status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KuboError {
    pub message: String,
    #[serde(default)]
    pub code: i64,
}

impl KuboError {
    /// Map Kubo's message onto a [`StoreError`] kind. `subject` is the path
    /// or reference the request was about.
    pub fn classify(self, subject: &str) -> StoreError {
        let msg = self.message.to_ascii_lowercase();
        if msg.contains("not pinned") {
            StoreError::NotPinned {
                reference: subject.into(),
            }
        } else if msg.contains("already exists") || msg.contains("already has entry") {
            StoreError::AlreadyExists {
                path: subject.into(),
            }
        } else if msg.contains("does not exist") || msg.contains("no link named") {
            StoreError::NotFound {
                path: subject.into(),
            }
        } else {
            StoreError::Api(self.message)
        }
    }
}

/// `files/stat`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FilesStat {
    pub hash: String,
    pub cumulative_size: u64,
    #[serde(rename = "Type", default)]
    pub kind: String,
}

impl From<FilesStat> for StatInfo {
    fn from(s: FilesStat) -> Self {
        StatInfo {
            cid: s.hash,
            cumulative_size: s.cumulative_size,
        }
    }
}

/// `files/ls?long=true`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FilesLs {
    /// `null` for an empty directory.
    #[serde(default)]
    pub entries: Option<Vec<FilesLsEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FilesLsEntry {
    pub name: String,
    #[serde(default)]
    pub hash: String,
}

impl FilesLs {
    pub fn into_entries(self) -> Vec<DirEntry> {
        self.entries
            .unwrap_or_default()
            .into_iter()
            .map(|e| DirEntry {
                name: e.name,
                cid: e.hash,
            })
            .collect()
    }
}

/// `pin/ls`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PinLs {
    #[serde(default)]
    pub keys: BTreeMap<String, PinLsKey>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PinLsKey {
    #[serde(rename = "Type")]
    pub kind: String,
}

impl PinLs {
    pub fn into_records(self) -> Vec<PinRecord> {
        self.keys
            .into_iter()
            .map(|(cid, key)| PinRecord {
                cid,
                pin_type: key.kind,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kubo_error(message: &str) -> KuboError {
        serde_json::from_value(serde_json::json!({
            "Message": message,
            "Code": 0,
            "Type": "error"
        }))
        .unwrap()
    }

    #[test]
    fn error_messages_are_classified() {
        assert!(kubo_error("not pinned or pinned indirectly")
            .classify("/ipfs/Qm1")
            .is_not_pinned());
        assert!(kubo_error("cp: cannot put node in path /pool/a/1: directory already has entry by that name")
            .classify("/pool/a/1")
            .is_already_exists());
        assert!(kubo_error("file already exists")
            .classify("/pool")
            .is_already_exists());
        assert!(matches!(
            kubo_error("file does not exist").classify("/pool/x"),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn stat_body() {
        let stat: FilesStat = serde_json::from_str(
            r#"{"Hash":"QmA","Size":0,"CumulativeSize":1234,"Blocks":3,"Type":"directory"}"#,
        )
        .unwrap();
        let info = StatInfo::from(stat);
        assert_eq!(info.cid, "QmA");
        assert_eq!(info.cumulative_size, 1234);
    }

    #[test]
    fn ls_body_with_null_entries() {
        let ls: FilesLs = serde_json::from_str(r#"{"Entries":null}"#).unwrap();
        assert!(ls.into_entries().is_empty());

        let ls: FilesLs = serde_json::from_str(
            r#"{"Entries":[{"Name":"100","Type":1,"Size":0,"Hash":"QmA"}]}"#,
        )
        .unwrap();
        let entries = ls.into_entries();
        assert_eq!(entries[0].name, "100");
        assert_eq!(entries[0].cid, "QmA");
    }

    #[test]
    fn pin_ls_body() {
        let pins: PinLs =
            serde_json::from_str(r#"{"Keys":{"QmA":{"Type":"recursive"}}}"#).unwrap();
        let records = pins.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cid, "QmA");
        assert_eq!(records[0].pin_type, "recursive");
    }
}
