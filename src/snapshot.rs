use serde::{Deserialize, Serialize};

use crate::collectors::cpu::CpuMetrics;
use crate::collectors::disk::DiskMetrics;
use crate::collectors::logs::LogMetrics;
use crate::collectors::memory::MemoryMetrics;
use crate::collectors::network::NetworkMetrics;
use crate::collectors::system::SystemMetrics;
use crate::error::CollectError;

/// Hostname used when the system domain failed to collect.
pub const UNKNOWN_HOSTNAME: &str = "unknown";

/// Outcome of one domain's collection: the populated metrics, or an error
/// marker with a human-readable message.
///
/// Serialized untagged, so a successful domain appears in the artifact as
/// the plain payload object and a failed one as `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainResult<T> {
    Ok(T),
    Err { error: String },
}

impl<T> DomainResult<T> {
    pub fn from_collect(result: Result<T, CollectError>) -> Self {
        match result {
            Ok(metrics) => DomainResult::Ok(metrics),
            Err(e) => DomainResult::Err {
                error: e.to_string(),
            },
        }
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        DomainResult::Err {
            error: message.into(),
        }
    }

    pub fn as_ok(&self) -> Option<&T> {
        match self {
            DomainResult::Ok(metrics) => Some(metrics),
            DomainResult::Err { .. } => None,
        }
    }

    pub fn is_err(&self) -> bool {
        matches!(self, DomainResult::Err { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DomainResult::Ok(_) => None,
            DomainResult::Err { error } => Some(error),
        }
    }
}

/// One immutable capture of all domain metrics at a single instant.
///
/// Slots are keyed by domain name in the artifact; assembly order is fixed
/// regardless of which collector finished first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub disk: DomainResult<DiskMetrics>,
    pub memory: DomainResult<MemoryMetrics>,
    pub cpu: DomainResult<CpuMetrics>,
    pub system: DomainResult<SystemMetrics>,
    pub network: DomainResult<NetworkMetrics>,
    pub logs: DomainResult<LogMetrics>,
}

impl Snapshot {
    /// Hostname as reported by the system collector, falling back to the
    /// sentinel when that domain failed.
    pub fn hostname(&self) -> &str {
        self.system
            .as_ok()
            .map(|system| system.info.hostname.as_str())
            .unwrap_or(UNKNOWN_HOSTNAME)
    }
}
