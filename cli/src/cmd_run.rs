//! `pinmirror run`: wire the adapters together and run one pass.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use pinmirror_core::{CheckpointManager, CheckpointStore, MirrorConfig, MirrorEngine, RunCoordinator};
use pinmirror_evm::{
    AbiUpdateDecoder, ContractAbi, EventSourceConfig, EvmEventSource, HttpClientConfig,
    HttpRpcClient, RetryConfig,
};
use pinmirror_ipfs::KuboClient;

pub async fn run(config: &MirrorConfig, store: Box<dyn CheckpointStore>, json: bool) -> Result<()> {
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let abi = ContractAbi::from_file(&config.abi_path)
        .with_context(|| format!("loading contract ABI from {}", config.abi_path))?;

    let rpc = HttpRpcClient::new(
        config.rpc_url.clone(),
        HttpClientConfig {
            retry: RetryConfig::default(),
            request_timeout: timeout,
        },
    )?;
    let ipfs = KuboClient::new(&config.ipfs_api_url, timeout)?;

    tracing::info!(
        rpc = %rpc.url(),
        ipfs = %ipfs.base_url(),
        contract = %config.contract_address,
        base_dir = %config.base_dir,
        "starting mirror"
    );

    let source = EvmEventSource::new(
        rpc,
        &abi,
        EventSourceConfig {
            contract_address: config.contract_address.clone(),
            event_name: config.event_name.clone(),
            log_range: config.log_range,
        },
    )?;

    let mut coordinator = RunCoordinator::new(
        Arc::new(source),
        Arc::new(AbiUpdateDecoder::new(abi)),
        MirrorEngine::new(Arc::new(ipfs), config.settings()),
        CheckpointManager::new(store),
    );
    let report = coordinator.run().await.context("mirror run failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Mirror Complete!");
        println!("{report}");
        for (name, reason) in report.failed_items() {
            println!("  failed: {name}: {reason}");
        }
    }
    Ok(())
}
