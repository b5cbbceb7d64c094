//! Kubo RPC client.
//!
//! Every Kubo RPC call is a POST to `/api/v0/<command>` with its arguments in
//! the query string. Failures come back as a non-2xx status with a JSON
//! [`KuboError`] body.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use pinmirror_core::content::{ContentStore, DirEntry, PinRecord, StatInfo};
use pinmirror_core::error::StoreError;

use crate::types::{FilesLs, FilesStat, KuboError, PinLs};

/// [`ContentStore`] backed by a Kubo node's RPC API.
pub struct KuboClient {
    base: String,
    http: reqwest::Client,
}

impl KuboClient {
    /// `api_url` is the RPC address, e.g. `http://127.0.0.1:5001`.
    pub fn new(api_url: &str, request_timeout: Duration) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base: api_base(api_url),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// POST `command` with `args` and return the raw body. `subject` names the
    /// path or reference used when classifying an error.
    async fn post(
        &self,
        command: &str,
        args: &[(&str, &str)],
        subject: &str,
    ) -> Result<String, StoreError> {
        debug!(command, subject, "kubo request");
        let resp = self
            .http
            .post(format!("{}/{command}", self.base))
            .query(args)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if status.is_success() {
            return Ok(body);
        }
        match serde_json::from_str::<KuboError>(&body) {
            Ok(err) => Err(err.classify(subject)),
            Err(_) => Err(StoreError::Api(format!("HTTP {}: {body}", status.as_u16()))),
        }
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        command: &str,
        args: &[(&str, &str)],
        subject: &str,
    ) -> Result<T, StoreError> {
        let body = self.post(command, args, subject).await?;
        serde_json::from_str(&body)
            .map_err(|e| StoreError::Transport(format!("{command}: unexpected response: {e}")))
    }
}

/// Normalize an RPC address to its `/api/v0` base.
pub fn api_base(api_url: &str) -> String {
    let trimmed = api_url.trim_end_matches('/');
    if trimmed.ends_with("/api/v0") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/api/v0")
    }
}

#[async_trait]
impl ContentStore for KuboClient {
    async fn mkdir(&self, path: &str) -> Result<(), StoreError> {
        self.post("files/mkdir", &[("arg", path), ("parents", "true")], path)
            .await
            .map(drop)
    }

    async fn stat(&self, path: &str) -> Result<StatInfo, StoreError> {
        self.post_json::<FilesStat>("files/stat", &[("arg", path)], path)
            .await
            .map(StatInfo::from)
    }

    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, StoreError> {
        self.post_json::<FilesLs>("files/ls", &[("arg", path), ("long", "true")], path)
            .await
            .map(FilesLs::into_entries)
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        self.post("files/cp", &[("arg", src), ("arg", dst)], dst)
            .await
            .map(drop)
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.post("files/rm", &[("arg", path), ("recursive", "true")], path)
            .await
            .map(drop)
    }

    async fn pin_add(&self, reference: &str) -> Result<(), StoreError> {
        self.post("pin/add", &[("arg", reference)], reference)
            .await
            .map(drop)
    }

    async fn pin_remove(&self, reference: &str) -> Result<(), StoreError> {
        self.post("pin/rm", &[("arg", reference)], reference)
            .await
            .map(drop)
    }

    async fn pin_list(&self, cid: &str) -> Result<Vec<PinRecord>, StoreError> {
        match self
            .post_json::<PinLs>("pin/ls", &[("arg", cid), ("type", "all")], cid)
            .await
        {
            Ok(pins) => Ok(pins.into_records()),
            Err(e) if e.is_not_pinned() => Ok(vec![]),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_is_normalized() {
        assert_eq!(api_base("http://127.0.0.1:5001"), "http://127.0.0.1:5001/api/v0");
        assert_eq!(api_base("http://127.0.0.1:5001/"), "http://127.0.0.1:5001/api/v0");
        assert_eq!(api_base("http://ipfs:5001/api/v0/"), "http://ipfs:5001/api/v0");
    }

    #[tokio::test]
    async fn unreachable_node_is_transport_error() {
        let client = KuboClient::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let err = client.stat("/ipfs/QmA").await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)), "got {err:?}");
    }
}
