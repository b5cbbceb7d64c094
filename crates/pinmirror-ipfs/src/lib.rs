//! pinmirror-ipfs: [`ContentStore`](pinmirror_core::ContentStore) over the
//! Kubo RPC API (mutable filesystem plus pins).

pub mod client;
pub mod types;

pub use client::KuboClient;
