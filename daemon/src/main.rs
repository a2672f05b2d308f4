//! Docket daemon — entry point for running an anchoring node.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use docket_ledger::HttpLedgerClient;
use docket_node::{init_logging, DocketNode, LogNotifier, NodeConfig};

#[derive(Parser)]
#[command(name = "docket-daemon", about = "Docket case-anchoring node daemon")]
struct Cli {
    /// Data directory for the local record mirror.
    #[arg(long, env = "DOCKET_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Base URL of the ledger gateway.
    #[arg(long, env = "DOCKET_LEDGER_URL")]
    ledger_url: Option<String>,

    /// Directory for the evidence content store.
    #[arg(long, env = "DOCKET_EVIDENCE_DIR")]
    evidence_dir: Option<PathBuf>,

    /// Maximum submission attempts per payload.
    #[arg(long, env = "DOCKET_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Default SLA window applied at assignment, in hours.
    #[arg(long, env = "DOCKET_SLA_HOURS")]
    sla_hours: Option<u64>,

    /// Enable Prometheus metrics.
    #[arg(long, env = "DOCKET_ENABLE_METRICS")]
    metrics: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "DOCKET_LOG_LEVEL")]
    log_level: String,

    /// Log format: "human" or "json".
    #[arg(long, default_value = "human", env = "DOCKET_LOG_FORMAT")]
    log_format: String,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Start the node.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Run the node.
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The config file is the base layer; CLI flags and env vars win.
    // Logging comes up only after the merge so the subscriber reflects
    // the merged level and format; a load failure is reported once the
    // subscriber exists.
    let mut load_error = None;
    let base = match cli.config {
        Some(ref config_path) => match NodeConfig::from_toml_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                load_error = Some(e);
                NodeConfig::default()
            }
        },
        None => NodeConfig::default(),
    };
    let config = NodeConfig {
        data_dir: cli.data_dir.unwrap_or(base.data_dir.clone()),
        ledger_url: cli.ledger_url.unwrap_or(base.ledger_url.clone()),
        evidence_dir: cli.evidence_dir.unwrap_or(base.evidence_dir.clone()),
        max_attempts: cli.max_attempts.unwrap_or(base.max_attempts),
        default_sla_hours: cli.sla_hours.unwrap_or(base.default_sla_hours),
        enable_metrics: cli.metrics || base.enable_metrics,
        log_level: cli.log_level,
        log_format: cli.log_format,
        ..base
    };

    init_logging(&config);
    match (&cli.config, load_error) {
        (Some(path), None) => tracing::info!("Loaded config from {}", path.display()),
        (Some(_), Some(e)) => {
            tracing::warn!("Failed to load config file: {e}, using CLI defaults")
        }
        _ => {}
    }

    match cli.command {
        Command::Node { action } => match action {
            NodeAction::Run => {
                tracing::info!(
                    "Starting docket node (data: {}, ledger: {})",
                    config.data_dir.display(),
                    config.ledger_url,
                );

                let ledger = Arc::new(HttpLedgerClient::new(
                    config.ledger_url.clone(),
                    config.submit_timeout(),
                ));
                let notifier = Arc::new(LogNotifier);
                let mut node = DocketNode::new(config, ledger, notifier)?;
                node.start();
                node.run_until_signal().await?;

                tracing::info!("Docket daemon exited cleanly");
            }
        },
    }

    Ok(())
}
