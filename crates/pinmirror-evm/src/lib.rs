//! pinmirror-evm: EVM adapters for pinmirror.
//!
//! - [`HttpRpcClient`]: JSON-RPC over HTTP with retry.
//! - [`EvmEventSource`]: change events via `eth_getLogs`, calldata via
//!   `eth_getTransactionByHash`.
//! - [`AbiUpdateDecoder`]: `(name, data)` calls decoded against the contract ABI.

pub mod abi;
pub mod decoder;
pub mod fetcher;
pub mod retry;
pub mod rpc;
pub mod source;

pub use abi::{AbiError, ContractAbi};
pub use decoder::AbiUpdateDecoder;
pub use fetcher::{EvmFetcher, EvmRpcClient, LogFilter, RawLog};
pub use retry::{RetryConfig, RetryPolicy};
pub use rpc::{HttpClientConfig, HttpRpcClient};
pub use source::{EventSourceConfig, EvmEventSource};
