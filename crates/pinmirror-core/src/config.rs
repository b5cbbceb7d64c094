//! Mirror configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::mirror::MirrorSettings;

/// Contract emitting the `DataChanged` events on the production network.
pub const DEFAULT_CONTRACT: &str = "0xf2C9E463592BD440f0D422E944E5F95c79404586";

/// Configuration for one mirror instance.
///
/// Accepts the legacy uppercase keys (`RPC_URL`, `IPFS_API_URL`,
/// `MAX_CONTENT_SIZE`) so an existing `config.json` loads unchanged. Unknown
/// keys such as `LAST_QUERIED_BLOCK` are ignored here; the checkpoint store
/// owns that one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// JSON-RPC endpoint of the chain node.
    #[serde(alias = "RPC_URL")]
    pub rpc_url: String,
    /// Base URL of the Kubo RPC API (e.g. `http://127.0.0.1:5001`).
    #[serde(alias = "IPFS_API_URL")]
    pub ipfs_api_url: String,
    pub contract_address: String,
    /// Path of the contract's JSON ABI.
    pub abi_path: String,
    /// Event signalling a data update.
    pub event_name: String,
    /// Namespace directory in the IPFS mutable filesystem.
    pub base_dir: String,
    /// Largest cumulative size (bytes) that will be mirrored.
    #[serde(alias = "MAX_CONTENT_SIZE")]
    pub max_content_size: u64,
    /// Max blocks per `eth_getLogs` request.
    pub log_range: u64,
    pub request_timeout_secs: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            ipfs_api_url: "http://127.0.0.1:5001".into(),
            contract_address: DEFAULT_CONTRACT.into(),
            abi_path: "contractABI.json".into(),
            event_name: "DataChanged".into(),
            base_dir: "/pool".into(),
            max_content_size: 10 * 1024 * 1024,
            log_range: 10_000,
            request_timeout_secs: 30,
        }
    }
}

impl MirrorConfig {
    /// Load a config from a JSON file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_string(),
            })
        };
        if self.rpc_url.trim().is_empty() {
            return invalid("rpc_url is empty");
        }
        if self.ipfs_api_url.trim().is_empty() {
            return invalid("ipfs_api_url is empty");
        }
        if self.max_content_size == 0 {
            return invalid("max_content_size must be greater than zero");
        }
        if self.log_range == 0 {
            return invalid("log_range must be greater than zero");
        }
        if !self.base_dir.starts_with('/') {
            return invalid("base_dir must be an absolute path");
        }
        Ok(())
    }

    pub fn settings(&self) -> MirrorSettings {
        MirrorSettings {
            base_dir: self.base_dir.clone(),
            max_content_size: self.max_content_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_keys_are_accepted() {
        let cfg: MirrorConfig = serde_json::from_str(
            r#"{
                "RPC_URL": "https://rpc.example",
                "IPFS_API_URL": "http://ipfs:5001",
                "MAX_CONTENT_SIZE": 5000,
                "LAST_QUERIED_BLOCK": 1234
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.rpc_url, "https://rpc.example");
        assert_eq!(cfg.ipfs_api_url, "http://ipfs:5001");
        assert_eq!(cfg.max_content_size, 5000);
        assert_eq!(cfg.base_dir, "/pool");
        assert_eq!(cfg.contract_address, DEFAULT_CONTRACT);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let cfg = MirrorConfig {
            max_content_size: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })));

        let cfg = MirrorConfig {
            rpc_url: " ".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = MirrorConfig {
            log_range: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = MirrorConfig::from_file("/nonexistent/pinmirror.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn settings_follow_config() {
        let cfg = MirrorConfig {
            base_dir: "/mirror".into(),
            max_content_size: 77,
            ..Default::default()
        };
        assert_eq!(
            cfg.settings(),
            MirrorSettings {
                base_dir: "/mirror".into(),
                max_content_size: 77
            }
        );
    }
}
