//! Contract ABI loading and selector lookup.

use alloy_json_abi::{Function, JsonAbi};
use alloy_primitives::B256;
use std::path::Path;
use thiserror::Error;

use pinmirror_core::error::SourceError;

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("failed to read ABI {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ABI JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event '{name}' not found in ABI")]
    EventNotFound { name: String },

    #[error("event '{name}' is anonymous and has no topic")]
    AnonymousEvent { name: String },
}

impl From<AbiError> for SourceError {
    fn from(e: AbiError) -> Self {
        SourceError::Config(e.to_string())
    }
}

/// A parsed contract ABI.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    abi: JsonAbi,
}

impl ContractAbi {
    /// Parse a standard Ethereum ABI JSON array.
    pub fn from_json(json: &str) -> Result<Self, AbiError> {
        Ok(Self {
            abi: serde_json::from_str(json)?,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AbiError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| AbiError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// `topics[0]` of the named event.
    pub fn event_topic(&self, name: &str) -> Result<B256, AbiError> {
        let event = self
            .abi
            .events()
            .find(|e| e.name == name)
            .ok_or_else(|| AbiError::EventNotFound { name: name.into() })?;
        if event.anonymous {
            return Err(AbiError::AnonymousEvent { name: name.into() });
        }
        Ok(event.selector())
    }

    /// Function whose 4-byte selector is `selector`.
    pub fn function_by_selector(&self, selector: &[u8]) -> Option<&Function> {
        self.abi
            .functions()
            .find(|f| f.selector().as_slice() == selector)
    }
}

/// `0x`-prefixed lowercase hex of a topic.
pub fn topic_hex(topic: &B256) -> String {
    format!("0x{}", hex::encode(topic))
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// The subset of the name registry ABI the mirror uses.
    pub const REGISTRY_ABI: &str = r#"[
        {
            "type": "function",
            "name": "setData",
            "inputs": [
                {"name": "name", "type": "string"},
                {"name": "data", "type": "string"}
            ],
            "outputs": [],
            "stateMutability": "nonpayable"
        },
        {
            "type": "function",
            "name": "transfer",
            "inputs": [
                {"name": "to", "type": "address"},
                {"name": "amount", "type": "uint256"}
            ],
            "outputs": [{"name": "", "type": "bool"}],
            "stateMutability": "nonpayable"
        },
        {
            "type": "event",
            "name": "DataChanged",
            "inputs": [
                {"name": "name", "type": "string", "indexed": false}
            ],
            "anonymous": false
        }
    ]"#;
}
