use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use port_sniffer::ports;
use port_sniffer::scanner::{self, ScanConfig, DEFAULT_CHANNEL_CAPACITY};
use port_sniffer::server::{self, AppState};
use port_sniffer::types::ScanResult;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// port-sniffer: full-range async TCP port scanner with a tiny embedded web UI.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "port-sniffer",
    version,
    about = "Full-range async TCP port scanner with a tiny embedded web UI.",
    long_about = None
)]
struct Cli {
    /// Address the HTTP UI listens on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Scan this host once, print the open ports and exit instead of serving the UI.
    #[arg(long)]
    target: Option<String>,

    /// Ports to probe: comma separated ports or inclusive ranges.
    #[arg(long, default_value = "1-65535")]
    ports: String,

    /// Socket connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 500)]
    timeout_ms: u64,

    /// Max concurrent TCP connect attempts. Unlimited when omitted.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Write one-shot results as pretty JSON to this path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Directory holding the static UI.
    #[arg(long = "ui-dir", default_value = "ui")]
    ui_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let config = ScanConfig {
        ports: ports::parse_port_spec(&cli.ports).context("invalid --ports")?,
        timeout: Duration::from_millis(cli.timeout_ms),
        concurrency: cli.concurrency,
        channel_capacity: DEFAULT_CHANNEL_CAPACITY,
    };
    info!(
        ports = config.ports.len(),
        timeout_ms = cli.timeout_ms,
        concurrency = ?config.concurrency,
        "configuration loaded"
    );
    raise_fd_limit();

    let prober = Arc::new(config.tcp_prober());

    if let Some(target) = cli.target.as_deref() {
        let cancel = CancellationToken::new();
        let cancel_ctrlc = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel_ctrlc.cancel();
            }
        });

        let results = scanner::scan_with(target, prober, &config, cancel).await;
        print_results_table(target, &results);
        if let Some(path) = cli.output.as_deref() {
            write_results_json(path, &results)?;
            info!(path = %path.display(), "wrote JSON results");
        }
        return Ok(());
    }

    let state = AppState {
        config: Arc::new(config),
        prober,
        ui_dir: cli.ui_dir,
    };
    tokio::select! {
        res = server::spawn_server(&cli.bind, state) => res?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}

/// Every in-flight probe holds a socket, so lift the soft descriptor limit as far as allowed.
#[cfg(unix)]
fn raise_fd_limit() {
    match rlimit::increase_nofile_limit(u64::MAX) {
        Ok(limit) => info!(limit, "file descriptor limit"),
        Err(e) => warn!(error = %e, "could not raise file descriptor limit"),
    }
}

#[cfg(not(unix))]
fn raise_fd_limit() {}

fn print_results_table(target: &str, results: &ScanResult) {
    println!("\nOpen ports on {}: {}", target, results.len());
    println!("{:>5}  {:<6}", "port", "status");
    println!("{:->5}  {:-<6}", "", "");
    for e in results {
        println!("{:>5}  {:<6}", e.port, format!("{:?}", e.status));
    }
}

fn write_results_json(path: &Path, results: &ScanResult) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}
