//! EVM adapters wired into a full run against a canned node.
//!
//! Logs and calldata are built the way a node would return them; the run
//! uses the in-memory content and checkpoint stores from pinmirror-core.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_core::dyn_abi::DynSolValue;
use alloy_primitives::keccak256;
use async_trait::async_trait;

use pinmirror_core::{
    CheckpointManager, CheckpointStore, MemoryCheckpointStore, MemoryContentStore, MirrorEngine,
    MirrorSettings, RunCoordinator, SourceError,
};
use pinmirror_evm::{
    AbiUpdateDecoder, ContractAbi, EventSourceConfig, EvmEventSource, EvmRpcClient, LogFilter,
    RawLog,
};

const ABI: &str = r#"[
    {"type":"function","name":"setData","stateMutability":"nonpayable","outputs":[],
     "inputs":[{"name":"name","type":"string"},{"name":"data","type":"string"}]},
    {"type":"event","name":"DataChanged","anonymous":false,
     "inputs":[{"name":"name","type":"string","indexed":false}]}
]"#;

// ─── Helpers ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CannedNode {
    head: u64,
    logs: Vec<RawLog>,
    inputs: HashMap<String, String>,
}

impl CannedNode {
    fn with_update(mut self, block: u64, tx: &str, name: &str, data: &str) -> Self {
        let mut calldata = keccak256("setData(string,string)")[..4].to_vec();
        calldata.extend(
            DynSolValue::Tuple(vec![
                DynSolValue::String(name.into()),
                DynSolValue::String(data.into()),
            ])
            .abi_encode_params(),
        );
        self.inputs
            .insert(tx.into(), format!("0x{}", hex::encode(calldata)));
        self.with_log(block, tx)
    }

    fn with_log(mut self, block: u64, tx: &str) -> Self {
        self.logs.push(RawLog {
            address: "0xf2c9e463592bd440f0d422e944e5f95c79404586".into(),
            topics: vec![format!("0x{}", hex::encode(keccak256("DataChanged(string)")))],
            data: "0x".into(),
            block_number: format!("0x{block:x}"),
            tx_hash: tx.into(),
            log_index: "0x0".into(),
            removed: None,
        });
        self
    }
}

#[async_trait]
impl EvmRpcClient for CannedNode {
    async fn get_block_number(&self) -> Result<u64, SourceError> {
        Ok(self.head)
    }

    async fn get_logs(&self, from: u64, to: u64, _filter: &LogFilter) -> Result<Vec<RawLog>, SourceError> {
        Ok(self
            .logs
            .iter()
            .filter(|l| {
                let b = l.block_number_u64().unwrap();
                b >= from && b <= to
            })
            .cloned()
            .collect())
    }

    async fn get_transaction_input(&self, hash: &str) -> Result<Option<String>, SourceError> {
        Ok(self.inputs.get(hash).cloned())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chain_updates_end_up_mirrored() {
    let abi = ContractAbi::from_json(ABI).unwrap();
    let node = CannedNode {
        head: 1_000,
        ..Default::default()
    }
    .with_update(900, "0x01", "alice", r#"{"content":"ipfs://QmAlice"}"#)
    .with_update(950, "0x02", "alice", r#"{"content":"/ipfs/QmAlice2"}"#)
    .with_update(960, "0x03", "bob", "")
    .with_log(970, "0x04");

    let source = EvmEventSource::new(
        node,
        &abi,
        EventSourceConfig {
            contract_address: "0xf2C9E463592BD440f0D422E944E5F95c79404586".into(),
            event_name: "DataChanged".into(),
            log_range: 100,
        },
    )
    .unwrap();

    let store = Arc::new(MemoryContentStore::new());
    store.add_content("QmAlice", 10);
    store.add_content("QmAlice2", 10);
    let checkpoint = Arc::new(MemoryCheckpointStore::starting_at(800));

    let mut coordinator = RunCoordinator::new(
        Arc::new(source),
        Arc::new(AbiUpdateDecoder::new(abi)),
        MirrorEngine::new(
            store.clone(),
            MirrorSettings {
                base_dir: "/pool".into(),
                max_content_size: 1_000,
            },
        ),
        CheckpointManager::new(Box::new(checkpoint.clone())),
    );
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.total_events, 4);
    assert_eq!(report.mirrored, 1);
    assert_eq!(report.overridden, 1);
    assert_eq!(report.no_content, 1);
    // The log without a known transaction.
    assert_eq!(report.decode_failed, 1);

    assert_eq!(
        store.children("/pool/alice"),
        vec![("950".to_string(), "QmAlice2".to_string())]
    );
    assert!(store.is_pinned("QmAlice2"));
    assert_eq!(
        checkpoint.load().await.unwrap().unwrap().last_queried_block,
        1_000
    );
}
