//! pinmirror CLI: mirror on-chain `DataChanged` updates into an IPFS node.
//!
//! # Commands
//! ```text
//! pinmirror run    [--config config.json] [--checkpoint <path>] [--json]
//! pinmirror status [--config config.json] [--checkpoint <path>]
//! pinmirror reset  [--config config.json] [--checkpoint <path>] [--to <block>]
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use pinmirror_core::{Checkpoint, CheckpointManager, CheckpointStore, MirrorConfig};
use pinmirror_storage::JsonFileCheckpointStore;

mod cmd_run;
mod logging;

const DEFAULT_CONFIG: &str = "config.json";

#[derive(Parser)]
#[command(
    name = "pinmirror",
    about = "Mirror on-chain name → content updates into IPFS",
    long_about = "
pinmirror reads DataChanged events from a name registry contract, keeps the
latest update per name and copies its IPFS content to /pool/<name>/<block>
on a Kubo node, pinning it. The last processed block is stored as
LAST_QUERIED_BLOCK in the config file unless --checkpoint says otherwise.

ENVIRONMENT VARIABLES:
  PINMIRROR_RPC_URL           Chain JSON-RPC endpoint
  PINMIRROR_IPFS_API_URL      Kubo RPC address
  PINMIRROR_MAX_CONTENT_SIZE  Largest mirrored site, in bytes
  RUST_LOG                    Log filter (overrides -v)
",
    version
)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (JSON). Defaults to ./config.json if present.
    #[arg(short, long, global = true, env = "PINMIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// Checkpoint file. Defaults to the config file.
    #[arg(long, global = true, env = "PINMIRROR_CHECKPOINT")]
    checkpoint: Option<PathBuf>,

    /// Keep the checkpoint in this SQLite database instead of a JSON file
    #[cfg(feature = "sqlite")]
    #[arg(long, global = true, env = "PINMIRROR_SQLITE")]
    sqlite: Option<String>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Config values that flags and environment variables can override.
#[derive(Args, Default)]
struct Overrides {
    #[arg(long, global = true, env = "PINMIRROR_RPC_URL")]
    rpc_url: Option<String>,

    #[arg(long, global = true, env = "PINMIRROR_IPFS_API_URL")]
    ipfs_api_url: Option<String>,

    #[arg(long, global = true, env = "PINMIRROR_MAX_CONTENT_SIZE")]
    max_content_size: Option<u64>,

    #[arg(long, global = true, env = "PINMIRROR_CONTRACT")]
    contract: Option<String>,

    #[arg(long, global = true, env = "PINMIRROR_ABI_PATH")]
    abi: Option<String>,

    #[arg(long, global = true, env = "PINMIRROR_BASE_DIR")]
    base_dir: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut MirrorConfig) {
        if let Some(v) = self.rpc_url {
            config.rpc_url = v;
        }
        if let Some(v) = self.ipfs_api_url {
            config.ipfs_api_url = v;
        }
        if let Some(v) = self.max_content_size {
            config.max_content_size = v;
        }
        if let Some(v) = self.contract {
            config.contract_address = v;
        }
        if let Some(v) = self.abi {
            config.abi_path = v;
        }
        if let Some(v) = self.base_dir {
            config.base_dir = v;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one full mirroring pass
    Run {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the stored checkpoint
    Status,

    /// Overwrite the stored checkpoint
    Reset {
        /// Block to restart from
        #[arg(long, default_value_t = 0)]
        to: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_tracing(&logging::LogConfig {
        level: if cli.verbose { "debug" } else { "info" }.into(),
        json: cli.log_json,
        ..Default::default()
    });

    let config_path = cli.config.clone();
    let mut config = load_config(config_path.as_ref())?;
    cli.overrides.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let checkpoint_path = cli
        .checkpoint
        .or(config_path)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    #[cfg(feature = "sqlite")]
    let store: Box<dyn CheckpointStore> = match &cli.sqlite {
        Some(db) => Box::new(
            pinmirror_storage::SqliteCheckpointStore::open(db, config.base_dir.clone())
                .await
                .with_context(|| format!("opening checkpoint database {db}"))?,
        ),
        None => Box::new(JsonFileCheckpointStore::new(&checkpoint_path)),
    };
    #[cfg(not(feature = "sqlite"))]
    let store: Box<dyn CheckpointStore> = Box::new(JsonFileCheckpointStore::new(&checkpoint_path));

    match cli.command {
        Commands::Run { json } => cmd_run::run(&config, store, json).await,
        Commands::Status => cmd_status(store).await,
        Commands::Reset { to } => cmd_reset(store, to).await,
    }
}

/// An explicit config path must exist; the default one may be absent.
fn load_config(path: Option<&PathBuf>) -> Result<MirrorConfig> {
    match path {
        Some(p) => MirrorConfig::from_file(p).context("loading config"),
        None if std::path::Path::new(DEFAULT_CONFIG).exists() => {
            MirrorConfig::from_file(DEFAULT_CONFIG).context("loading config")
        }
        None => {
            tracing::warn!("no {DEFAULT_CONFIG} found, using defaults and environment");
            Ok(MirrorConfig::default())
        }
    }
}

async fn cmd_status(store: Box<dyn CheckpointStore>) -> Result<()> {
    match store.load().await.context("loading checkpoint")? {
        Some(Checkpoint {
            last_queried_block,
            updated_at,
        }) => {
            println!("Last queried block: #{last_queried_block}");
            if let Some(at) = chrono::DateTime::from_timestamp(updated_at, 0).filter(|_| updated_at > 0) {
                println!("Updated at:         {}", at.to_rfc3339());
            }
        }
        None => println!("No checkpoint yet; the next run starts at block 0"),
    }
    Ok(())
}

async fn cmd_reset(store: Box<dyn CheckpointStore>, to: u64) -> Result<()> {
    CheckpointManager::new(store)
        .save_block(to)
        .await
        .context("saving checkpoint")?;
    println!("Checkpoint reset to block #{to}");
    Ok(())
}
