//! Domain collectors.
//!
//! One module per domain, each exposing a unit struct implementing
//! [`Collector`]. Collectors are mutually independent: they read only
//! host-local state and never depend on another domain's output, which is
//! what lets the aggregator fan them out in parallel.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;
use crate::error::CollectResult;

pub mod cpu;
pub mod disk;
pub mod logs;
pub mod memory;
pub mod network;
pub mod system;

pub use cpu::CpuCollector;
pub use disk::DiskCollector;
pub use logs::LogCollector;
pub use memory::MemoryCollector;
pub use network::NetworkCollector;
pub use system::SystemCollector;

/// Uniform collection capability.
///
/// A collector must not let any internal fault escape as a panic; missing
/// binaries, timeouts, permission denials and parse failures all surface as
/// [`CollectError`](crate::error::CollectError). Sub-measurement failures
/// degrade the sub-measurement, not the whole domain, wherever partial data
/// is still obtainable.
#[async_trait]
pub trait Collector: Send + Sync + 'static {
    type Output: Serialize + Send + 'static;

    fn domain(&self) -> &'static str;

    async fn collect(&self, config: &Config) -> CollectResult<Self::Output>;
}
