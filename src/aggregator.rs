//! Snapshot aggregation.
//!
//! Fans the six collectors out as independent tasks and joins them into one
//! [`Snapshot`]. Collector failures and even collector panics end up as the
//! domain's error marker; the run always yields a complete snapshot.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collectors::{
    Collector, CpuCollector, DiskCollector, LogCollector, MemoryCollector, NetworkCollector,
    SystemCollector,
};
use crate::config::Config;
use crate::snapshot::{DomainResult, Snapshot};

/// Collects every domain and assembles the snapshot.
///
/// Collectors run in parallel purely as an optimization; the snapshot slots
/// are filled by fixed domain key, never by completion order.
pub async fn collect_all(config: &Arc<Config>) -> Snapshot {
    info!("collecting system metrics");

    let disk = spawn_collector(DiskCollector, config);
    let memory = spawn_collector(MemoryCollector, config);
    let cpu = spawn_collector(CpuCollector, config);
    let system = spawn_collector(SystemCollector, config);
    let network = spawn_collector(NetworkCollector, config);
    let logs = spawn_collector(LogCollector, config);

    Snapshot {
        disk: join_domain("disk", disk).await,
        memory: join_domain("memory", memory).await,
        cpu: join_domain("cpu", cpu).await,
        system: join_domain("system", system).await,
        network: join_domain("network", network).await,
        logs: join_domain("logs", logs).await,
    }
}

fn spawn_collector<C>(collector: C, config: &Arc<Config>) -> JoinHandle<DomainResult<C::Output>>
where
    C: Collector,
{
    let config = Arc::clone(config);

    tokio::spawn(async move {
        let domain = collector.domain();
        info!("collecting {domain} metrics");

        match collector.collect(&config).await {
            Ok(metrics) => {
                debug!("{domain} collection complete");
                DomainResult::Ok(metrics)
            }
            Err(e) => {
                warn!("{domain} collection failed: {e}");
                DomainResult::Err {
                    error: e.to_string(),
                }
            }
        }
    })
}

/// Join barrier for one domain task. A panicked task degrades to the error
/// marker like any other collection failure.
async fn join_domain<T>(domain: &str, handle: JoinHandle<DomainResult<T>>) -> DomainResult<T> {
    match handle.await {
        Ok(result) => result,
        Err(e) => {
            warn!("{domain} collector task failed: {e}");
            DomainResult::failed(format!("{domain} collector panicked: {e}"))
        }
    }
}
