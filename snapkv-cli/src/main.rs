use anyhow::{Context, Result};
use clap::Parser;
use snapkv_core::config::Config;
use snapkv_core::logging::{init_logging_with_config, LogLevel};
use snapkv_core::metrics;
use snapkv_core::node::{write_messages, NodeService};
use snapkv_core::shutdown::{install_signal_handlers, ShutdownCoordinator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "snapkv")]
#[command(author, version, about = "Replicated in-memory transactional key-value node", long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<LogLevel>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// TOML configuration file; SNAPKV_* environment variables are used otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Anti-entropy interval in milliseconds
    #[arg(long)]
    sync_interval_ms: Option<u64>,

    /// Run without pushing snapshots to peers
    #[arg(long)]
    no_replication: bool,

    /// Serve Prometheus metrics on the configured address
    #[arg(long)]
    metrics: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::from_env().context("loading config from environment")?,
    };

    if let Some(level) = args.log_level {
        config.logging.level = level.as_str().to_string();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    if let Some(ms) = args.sync_interval_ms {
        config.replication.sync_interval = Duration::from_millis(ms);
    }
    if args.no_replication {
        config.replication.enabled = false;
    }
    if args.metrics {
        config.metrics.enabled = true;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging_with_config(config.logging.log_config()?)?;

    metrics::init_metrics();
    if config.metrics.enabled {
        metrics::install_prometheus(config.metrics.bind_address)?;
        info!(address = %config.metrics.bind_address, "Metrics endpoint listening");
    }

    let coordinator = Arc::new(ShutdownCoordinator::new(config.node.shutdown_timeout));
    install_signal_handlers(coordinator.clone());

    let (service, outbox) = NodeService::new(&config, coordinator);
    let writer = tokio::spawn(write_messages(outbox, tokio::io::stdout()));

    info!(
        replication = config.replication.enabled,
        sync_interval = ?config.replication.sync_interval,
        "snapkv node started"
    );

    let served = service.run(BufReader::new(tokio::io::stdin())).await;

    // The service owned every sender, so the writer finishes once the outbox drains
    let written = writer.await.context("output writer panicked")?;

    if let Err(e) = &served {
        error!(error = %e, "Node halted");
    }
    served?;
    written?;

    info!("snapkv node finished");
    Ok(())
}
