use crate::ports;
use crate::probe::{Prober, TcpProbe, DEFAULT_TIMEOUT};
use crate::types::{ProbeOutcome, ScanResult};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default buffer of the aggregation channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Knobs for one scan invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Candidate ports; each is probed once.
    pub ports: Vec<u16>,
    /// Per-probe connect timeout.
    pub timeout: Duration,
    /// `None` starts every probe at once. `Some(n)` keeps at most `n` probes in flight.
    pub concurrency: Option<usize>,
    pub channel_capacity: usize,
}

impl ScanConfig {
    /// TCP connect prober using this config's timeout.
    pub fn tcp_prober(&self) -> TcpProbe {
        TcpProbe::new(self.timeout)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ports: ports::all_ports(),
            timeout: DEFAULT_TIMEOUT,
            concurrency: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Scan every TCP port of `host` with a 500ms connect timeout and return the
/// open ones in ascending order.
///
/// All 65535 probes are started at once. Failures of any kind (refused,
/// timed out, unresolvable host) leave the port out of the result.
pub async fn scan(host: &str) -> ScanResult {
    let config = ScanConfig::default();
    let prober = Arc::new(config.tcp_prober());
    scan_with(host, prober, &config, CancellationToken::new()).await
}

/// Blocking wrapper around [`scan`] for callers without a tokio runtime.
///
/// Must not be called from inside a runtime. The only error is failing to
/// build the runtime itself.
pub fn scan_blocking(host: &str) -> Result<ScanResult> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    Ok(rt.block_on(scan(host)))
}

/// Probe `config.ports` on `host` concurrently and collect the open ones.
///
/// - One task per port, optionally gated by a `Semaphore` when `config.concurrency` is set.
/// - Open ports travel over a bounded mpsc channel to a single collector task
///   that owns the result vector, so no lock is involved.
/// - Returns only after every started probe has finished; the result is
///   sorted by port with duplicates removed.
/// - Cancelling `cancel` stops new probes from starting and makes in-flight
///   ones give up; whatever was already found is still returned.
pub async fn scan_with<P>(
    host: &str,
    prober: Arc<P>,
    config: &ScanConfig,
    cancel: CancellationToken,
) -> ScanResult
where
    P: Prober + ?Sized,
{
    let start = Instant::now();
    let host: Arc<str> = Arc::from(host);
    info!(
        host = %host,
        ports = config.ports.len(),
        concurrency = ?config.concurrency,
        "scan started"
    );

    let (tx, mut rx) = mpsc::channel::<ProbeOutcome>(config.channel_capacity.max(1));
    let collector = tokio::spawn(async move {
        let mut open = Vec::new();
        while let Some(outcome) = rx.recv().await {
            open.push(outcome);
        }
        open
    });

    let limiter = config
        .concurrency
        .map(|n| Arc::new(Semaphore::new(n.clamp(1, Semaphore::MAX_PERMITS))));
    let mut set = JoinSet::new();

    for &port in &config.ports {
        if cancel.is_cancelled() {
            break;
        }
        let permit = match &limiter {
            Some(sem) => {
                let acquired = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    p = sem.clone().acquire_owned() => p,
                };
                match acquired {
                    Ok(p) => Some(p),
                    // the semaphore is never closed
                    Err(_) => break,
                }
            }
            None => None,
        };

        let tx = tx.clone();
        let host = host.clone();
        let prober = prober.clone();
        let cancel = cancel.clone();

        set.spawn(async move {
            let _permit = permit;

            let open = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                open = prober.probe(&host, port) => open,
            };
            if open {
                // The collector outlives every sender.
                let _ = tx.send(ProbeOutcome::open(port)).await;
            }
        });
    }

    // The collector sees end-of-stream once every probe has dropped its sender.
    drop(tx);
    let started = set.len();
    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            warn!(error = %e, "probe task failed");
        }
    }

    let mut open = match collector.await {
        Ok(open) => open,
        Err(e) => {
            warn!(error = %e, "result collector failed");
            Vec::new()
        }
    };
    open.sort_unstable_by_key(|o| o.port);
    open.dedup_by_key(|o| o.port);

    if cancel.is_cancelled() {
        debug!(host = %host, "scan cancelled");
    }
    info!(
        host = %host,
        probed = started,
        open = open.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "scan finished"
    );
    open
}
