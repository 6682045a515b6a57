pub mod aggregator;
pub mod alerts;
pub mod collectors;
pub mod config;
pub mod error;
pub mod report;
pub mod snapshot;
pub mod util;

pub use aggregator::collect_all;
pub use alerts::{Alert, AlertCategory, Severity, generate_alerts};
pub use config::Config;
pub use error::CollectError;
pub use report::{HealthStatus, Report, Summary, summarize};
pub use snapshot::{DomainResult, Snapshot};
