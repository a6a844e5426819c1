use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time;
use tracing::trace;

/// Connect timeout used when the caller does not supply one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// A single-port reachability check.
///
/// Implementations must always terminate and must never surface an error:
/// every failure is reported as `false`.
#[async_trait]
pub trait Prober: Send + Sync + 'static {
    async fn probe(&self, host: &str, port: u16) -> bool;
}

/// Plain TCP connect probe with a fixed timeout.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Prober for TcpProbe {
    async fn probe(&self, host: &str, port: u16) -> bool {
        is_port_open(host, port, self.timeout).await
    }
}

/// Attempt one TCP connection to `host:port`, bounded by `timeout`.
///
/// Name resolution happens inside the timeout. The stream is dropped right
/// away on success; nothing is sent or read.
pub async fn is_port_open(host: &str, port: u16, timeout: Duration) -> bool {
    match time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        Ok(Err(e)) => {
            trace!(host, port, error = %e, "connect failed");
            false
        }
        Err(_) => {
            trace!(host, port, "connect timed out");
            false
        }
    }
}
