use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Top-level configuration document.
///
/// Every section is optional in the file; missing keys fall back to the
/// built-in defaults below. A missing file is not an error, a malformed
/// file is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory the JSON report is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub monitoring: Monitoring,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            thresholds: Thresholds::default(),
            monitoring: Monitoring::default(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./reports")
}

/// Numeric limits used by the alert rule engine.
///
/// No validation relates the warning and critical member of a pair;
/// an inverted pair is accepted as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_disk_usage_warning")]
    pub disk_usage_warning: f64,
    #[serde(default = "default_disk_usage_critical")]
    pub disk_usage_critical: f64,

    #[serde(default = "default_memory_usage_warning")]
    pub memory_usage_warning: f64,
    #[serde(default = "default_memory_usage_critical")]
    pub memory_usage_critical: f64,

    #[serde(default = "default_swap_usage_warning")]
    pub swap_usage_warning: f64,
    #[serde(default = "default_swap_usage_critical")]
    pub swap_usage_critical: f64,

    /// Limits for the 5-minute load average normalized by logical core count.
    #[serde(default = "default_cpu_load_warning")]
    pub cpu_load_warning: f64,
    #[serde(default = "default_cpu_load_critical")]
    pub cpu_load_critical: f64,

    /// Limits in °C, applied to every reported sensor independently.
    #[serde(default = "default_cpu_temp_warning")]
    pub cpu_temp_warning: f64,
    #[serde(default = "default_cpu_temp_critical")]
    pub cpu_temp_critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            disk_usage_warning: default_disk_usage_warning(),
            disk_usage_critical: default_disk_usage_critical(),
            memory_usage_warning: default_memory_usage_warning(),
            memory_usage_critical: default_memory_usage_critical(),
            swap_usage_warning: default_swap_usage_warning(),
            swap_usage_critical: default_swap_usage_critical(),
            cpu_load_warning: default_cpu_load_warning(),
            cpu_load_critical: default_cpu_load_critical(),
            cpu_temp_warning: default_cpu_temp_warning(),
            cpu_temp_critical: default_cpu_temp_critical(),
        }
    }
}

fn default_disk_usage_warning() -> f64 {
    80.0
}

fn default_disk_usage_critical() -> f64 {
    90.0
}

fn default_memory_usage_warning() -> f64 {
    80.0
}

fn default_memory_usage_critical() -> f64 {
    95.0
}

fn default_swap_usage_warning() -> f64 {
    50.0
}

fn default_swap_usage_critical() -> f64 {
    80.0
}

fn default_cpu_load_warning() -> f64 {
    2.0
}

fn default_cpu_load_critical() -> f64 {
    4.0
}

fn default_cpu_temp_warning() -> f64 {
    70.0
}

fn default_cpu_temp_critical() -> f64 {
    85.0
}

/// Flags controlling the optional, expensive checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitoring {
    /// Run smartctl against every block device.
    #[serde(default = "default_true")]
    pub check_smart: bool,

    /// Query systemd for the watched service list and failed units.
    #[serde(default = "default_true")]
    pub check_systemd_services: bool,

    /// Scan the journal for recent errors and warnings.
    #[serde(default = "default_true")]
    pub check_journal_errors: bool,

    /// Lookback window for the journal scan.
    #[serde(default = "default_journal_errors_hours")]
    pub journal_errors_hours: u64,

    /// Hosts to probe for reachability. Empty list disables the probe.
    #[serde(default)]
    pub network_check_hosts: Vec<String>,
}

impl Default for Monitoring {
    fn default() -> Self {
        Self {
            check_smart: true,
            check_systemd_services: true,
            check_journal_errors: true,
            journal_errors_hours: default_journal_errors_hours(),
            network_check_hosts: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_journal_errors_hours() -> u64 {
    24
}

/// Loads the configuration file.
///
/// A missing file falls back to [`Config::default`] with a warning; a file
/// that exists but does not parse is a fatal input error.
pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("config file {path} not found, using defaults");
            return Ok(Config::default());
        }
        Err(e) => return Err(anyhow::anyhow!("failed to read config file {path}: {e}")),
    };

    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("invalid configuration file {path}: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.thresholds.disk_usage_critical, 90.0);
        assert_eq!(config.monitoring.journal_errors_hours, 24);
        assert!(config.monitoring.check_smart);
        assert!(config.monitoring.network_check_hosts.is_empty());
    }

    #[test]
    fn partial_thresholds_keep_remaining_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"thresholds": {"disk_usage_critical": 95.5, "cpu_load_warning": 1.0}}"#,
        )
        .unwrap();
        assert_eq!(config.thresholds.disk_usage_critical, 95.5);
        assert_eq!(config.thresholds.cpu_load_warning, 1.0);
        assert_eq!(config.thresholds.disk_usage_warning, 80.0);
        assert_eq!(config.thresholds.memory_usage_critical, 95.0);
    }

    #[test]
    fn monitoring_section_is_parsed() {
        let config: Config = serde_json::from_str(
            r#"{
                "output_dir": "/tmp/health",
                "monitoring": {
                    "check_smart": false,
                    "journal_errors_hours": 6,
                    "network_check_hosts": ["1.1.1.1", "example.org"]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/health"));
        assert!(!config.monitoring.check_smart);
        assert!(config.monitoring.check_systemd_services);
        assert_eq!(config.monitoring.journal_errors_hours, 6);
        assert_eq!(config.monitoring.network_check_hosts.len(), 2);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = read_config_file("/definitely/not/there/config.json").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(read_config_file(path.to_str().unwrap()).is_err());
    }
}
