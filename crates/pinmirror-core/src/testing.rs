//! Fixtures shared by the unit tests in this crate.

use crate::error::DecodeError;
use crate::source::UpdateDecoder;
use crate::types::{parse_fields, ChangeEvent, DecodedUpdate};

/// Decodes `name|fields-json` payloads.
pub(crate) struct LineDecoder;

impl UpdateDecoder for LineDecoder {
    fn decode(&self, payload: &[u8]) -> Result<DecodedUpdate, DecodeError> {
        let text = std::str::from_utf8(payload).map_err(|e| DecodeError::AbiDecodeFailed {
            reason: e.to_string(),
        })?;
        let (name, fields) = text
            .split_once('|')
            .ok_or_else(|| DecodeError::UnexpectedArguments {
                reason: "missing separator".into(),
            })?;
        Ok(DecodedUpdate {
            name: name.to_string(),
            fields: parse_fields(fields)?,
        })
    }
}

pub(crate) fn payload(body: &str) -> Vec<u8> {
    body.as_bytes().to_vec()
}

pub(crate) fn change_event(block: u64, tx: &str) -> ChangeEvent {
    ChangeEvent {
        name: String::new(),
        raw_payload: vec![],
        block_number: block,
        log_index: 0,
        tx_ref: tx.into(),
    }
}
