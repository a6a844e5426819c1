use serde::{Deserialize, Serialize};

/// Status reported for a probed port. Only successful connects are ever
/// materialized, so there is a single variant.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortStatus {
    Open,
}

/// One discovered open port.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeOutcome {
    pub port: u16,
    pub status: PortStatus,
}

impl ProbeOutcome {
    pub fn open(port: u16) -> Self {
        Self {
            port,
            status: PortStatus::Open,
        }
    }
}

/// Open ports of one scan, strictly ascending by port.
pub type ScanResult = Vec<ProbeOutcome>;
