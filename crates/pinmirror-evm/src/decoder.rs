//! Decodes `(name, data)` update calls from transaction calldata.
//!
//! - First 4 bytes select the function from the ABI.
//! - The remaining bytes are the ABI-encoded inputs; the first two must be
//!   strings: the name and a JSON object of fields.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_dyn_abi::Specifier;

use pinmirror_core::error::DecodeError;
use pinmirror_core::source::UpdateDecoder;
use pinmirror_core::types::{parse_fields, DecodedUpdate};

use crate::abi::ContractAbi;

/// [`UpdateDecoder`] driven by a contract ABI.
pub struct AbiUpdateDecoder {
    abi: ContractAbi,
}

impl AbiUpdateDecoder {
    pub fn new(abi: ContractAbi) -> Self {
        Self { abi }
    }
}

impl UpdateDecoder for AbiUpdateDecoder {
    fn decode(&self, calldata: &[u8]) -> Result<DecodedUpdate, DecodeError> {
        if calldata.len() < 4 {
            return Err(DecodeError::PayloadTooShort {
                len: calldata.len(),
            });
        }
        let (selector, input) = calldata.split_at(4);

        let func = self
            .abi
            .function_by_selector(selector)
            .ok_or_else(|| DecodeError::UnknownSelector {
                selector: hex::encode(selector),
            })?;

        let types = func
            .inputs
            .iter()
            .map(|p| p.resolve())
            .collect::<Result<Vec<DynSolType>, _>>()
            .map_err(|e| DecodeError::AbiDecodeFailed {
                reason: e.to_string(),
            })?;
        if types.len() < 2 || types[0] != DynSolType::String || types[1] != DynSolType::String {
            return Err(DecodeError::UnexpectedArguments {
                reason: format!("{} does not take (string, string, ...)", func.signature()),
            });
        }

        let values = match DynSolType::Tuple(types).abi_decode_params(input) {
            Ok(DynSolValue::Tuple(values)) => values,
            Ok(other) => vec![other],
            Err(e) => {
                return Err(DecodeError::AbiDecodeFailed {
                    reason: format!("{}: {e}", func.name),
                })
            }
        };

        let mut args = values.iter().map(DynSolValue::as_str);
        match (args.next().flatten(), args.next().flatten()) {
            (Some(name), Some(data)) => Ok(DecodedUpdate {
                name: name.to_string(),
                fields: parse_fields(data)?,
            }),
            _ => Err(DecodeError::UnexpectedArguments {
                reason: "decoded arguments are not strings".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::fixtures::REGISTRY_ABI;
    use alloy_primitives::keccak256;

    fn decoder() -> AbiUpdateDecoder {
        AbiUpdateDecoder::new(ContractAbi::from_json(REGISTRY_ABI).unwrap())
    }

    fn set_data(name: &str, data: &str) -> Vec<u8> {
        let mut calldata = keccak256("setData(string,string)")[..4].to_vec();
        let args = DynSolValue::Tuple(vec![
            DynSolValue::String(name.into()),
            DynSolValue::String(data.into()),
        ]);
        calldata.extend(args.abi_encode_params());
        calldata
    }

    #[test]
    fn decodes_name_and_fields() {
        let update = decoder()
            .decode(&set_data("alice", r#"{"content":"ipfs://QmA","title":"x"}"#))
            .unwrap();
        assert_eq!(update.name, "alice");
        let fields = update.fields.unwrap();
        assert_eq!(fields["content"], "ipfs://QmA");
        assert_eq!(fields["title"], "x");
    }

    #[test]
    fn empty_data_has_no_fields() {
        let update = decoder().decode(&set_data("bob", "")).unwrap();
        assert_eq!(update.name, "bob");
        assert!(update.fields.is_none());
    }

    #[test]
    fn malformed_json_is_decode_error() {
        let err = decoder().decode(&set_data("carol", "{not json")).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidFields(_)));
    }

    #[test]
    fn short_and_unknown_payloads() {
        assert!(matches!(
            decoder().decode(&[0x12, 0x34]),
            Err(DecodeError::PayloadTooShort { len: 2 })
        ));
        assert!(matches!(
            decoder().decode(&[0xde, 0xad, 0xbe, 0xef]),
            Err(DecodeError::UnknownSelector { .. })
        ));
    }

    #[test]
    fn non_string_function_is_rejected() {
        let calldata = keccak256("transfer(address,uint256)")[..4].to_vec();
        assert!(matches!(
            decoder().decode(&calldata),
            Err(DecodeError::UnexpectedArguments { .. })
        ));
    }

    #[test]
    fn truncated_arguments_fail() {
        let mut calldata = set_data("dave", r#"{"content":"ipfs://QmD"}"#);
        calldata.truncate(40);
        assert!(matches!(
            decoder().decode(&calldata),
            Err(DecodeError::AbiDecodeFailed { .. })
        ));
    }
}
