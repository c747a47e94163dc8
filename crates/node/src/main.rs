//! Rollup devnet node
//!
//! Runs the L1 rollup ledger and the L2 anchor side by side on a tick loop.
//! Anchor state is persisted to disk when a data directory is given.

use anyhow::Result;
use clap::Parser;
use l1_rollup::RollupEvent;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod devnet;

use config::NodeConfig;
use devnet::Devnet;

/// Rollup devnet node
#[derive(Parser, Debug)]
#[command(name = "rollup-node")]
#[command(about = "Two-layer rollup devnet: anchor, propose, prove, verify", long_about = None)]
struct Args {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after N blocks (0 = run until ctrl-c)
    #[arg(long)]
    blocks: Option<u64>,

    /// Block time in milliseconds
    #[arg(long)]
    block_time_ms: Option<u64>,

    /// Data directory for anchor state
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn node_config(&self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load(path)?,
            None => NodeConfig::default(),
        };
        if let Some(blocks) = self.blocks {
            config.blocks = blocks;
        }
        if let Some(block_time_ms) = self.block_time_ms {
            config.block_time_ms = block_time_ms;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args.node_config()?;

    tracing::info!("Starting rollup devnet");
    tracing::info!("  L2 chain id: {}", config.rollup.l2_chain_id);
    tracing::info!("  Block time: {}ms", config.block_time_ms);
    tracing::info!("  Ring buffer: {} slots", config.rollup.block_ring_buffer_size);
    tracing::info!("  Data directory: {:?}", config.data_dir);

    let mut devnet = Devnet::new(&config)?;

    // Log finalization progress
    let mut rollup_events = devnet.rollup().subscribe();
    let event_logger = tokio::spawn(async move {
        while let Ok(event) = rollup_events.recv().await {
            match event {
                RollupEvent::BlockVerified { block_id, block_hash, .. } => {
                    tracing::info!("Block {} verified ({})", block_id, block_hash);
                }
                RollupEvent::StateRootSynced { block_id, state_root } => {
                    tracing::info!("State root {} synced at block {}", state_root, block_id);
                }
                RollupEvent::TransitionContested { block_id, contester, .. } => {
                    tracing::warn!("Block {} contested by {}", block_id, contester);
                }
                _ => {}
            }
        }
    });

    let mut interval = tokio::time::interval(Duration::from_millis(config.block_time_ms));
    let mut produced = 0u64;

    tracing::info!("Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match devnet.tick() {
                    Ok(report) => {
                        produced += 1;
                        if produced % 10 == 0 {
                            tracing::info!(
                                "L2 block {}: rollup block {}, last verified {}",
                                report.l2_block,
                                report.rollup_block,
                                report.last_verified
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!("Tick failed: {}", e);
                        break;
                    }
                }
                if config.blocks > 0 && produced >= config.blocks {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down...");
                break;
            }
        }
    }

    event_logger.abort();

    println!("{}", serde_json::to_string_pretty(&devnet.summary())?);
    tracing::info!("Devnet stopped after {} blocks", produced);

    Ok(())
}
