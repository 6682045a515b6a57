//! Summary classification, report assembly and persistence.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::alerts::{Alert, Severity};
use crate::snapshot::Snapshot;

/// The single derived verdict for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Process exit code for this verdict.
    pub fn exit_code(self) -> i32 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Warning => 1,
            HealthStatus::Critical => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_alerts: usize,
    pub critical_alerts: usize,
    pub warning_alerts: usize,
    pub health_status: HealthStatus,
}

/// Derives the summary from the alert list alone.
///
/// Precedence: critical if any critical alert exists, warning if the list is
/// non-empty, healthy otherwise.
pub fn summarize(alerts: &[Alert]) -> Summary {
    let critical_alerts = alerts
        .iter()
        .filter(|a| a.severity == Severity::Critical)
        .count();
    let warning_alerts = alerts
        .iter()
        .filter(|a| a.severity == Severity::Warning)
        .count();

    let health_status = if critical_alerts > 0 {
        HealthStatus::Critical
    } else if !alerts.is_empty() {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    };

    Summary {
        total_alerts: alerts.len(),
        critical_alerts,
        warning_alerts,
        health_status,
    }
}

/// The persisted artifact: one immutable value per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub timestamp: String,
    pub timestamp_unix: i64,
    pub hostname: String,
    pub metrics: Snapshot,
    pub alerts: Vec<Alert>,
    pub summary: Summary,
}

impl Report {
    /// Combines snapshot, alerts and capture time into the final report.
    /// Cannot fail once its inputs exist.
    pub fn assemble(
        snapshot: Snapshot,
        alerts: Vec<Alert>,
        captured_at: DateTime<Local>,
    ) -> Report {
        let summary = summarize(&alerts);

        Report {
            timestamp: captured_at.to_rfc3339(),
            timestamp_unix: captured_at.timestamp(),
            hostname: snapshot.hostname().to_string(),
            metrics: snapshot,
            alerts,
            summary,
        }
    }
}

/// Writes the report under `output_dir`, creating the directory if needed.
/// Returns the path of the written artifact.
pub fn save_report(report: &Report, output_dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filepath = output_dir.join(format!("health_{timestamp}.json"));

    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    std::fs::write(&filepath, json)
        .with_context(|| format!("failed to write report to {}", filepath.display()))?;

    Ok(filepath)
}

/// Prints the human-readable run summary to stdout.
pub fn print_summary(report: &Report) {
    let status_icon = match report.summary.health_status {
        HealthStatus::Healthy => "✅",
        HealthStatus::Warning => "⚠️",
        HealthStatus::Critical => "❌",
    };
    let status_text = match report.summary.health_status {
        HealthStatus::Healthy => "HEALTHY",
        HealthStatus::Warning => "WARNING",
        HealthStatus::Critical => "CRITICAL",
    };

    println!();
    println!("{}", "=".repeat(60));
    println!("📊 HEALTH CHECK SUMMARY");
    println!("{}", "=".repeat(60));
    println!();
    println!("{status_icon} Overall status: {status_text}");
    println!("🕐 Timestamp: {}", report.timestamp);
    println!("🖥️  Hostname: {}", report.hostname);
    println!();
    println!("🚨 Alerts:");
    println!("   total: {}", report.summary.total_alerts);
    println!("   critical: {}", report.summary.critical_alerts);
    println!("   warnings: {}", report.summary.warning_alerts);

    let critical: Vec<&Alert> = report
        .alerts
        .iter()
        .filter(|a| a.severity == Severity::Critical)
        .collect();
    if !critical.is_empty() {
        println!();
        println!("❌ Critical alerts:");
        for alert in critical.iter().take(5) {
            println!("   • {}", alert.message);
        }
    }

    if let Some(memory) = report.metrics.memory.as_ok() {
        println!();
        println!(
            "🧠 RAM: {:.1}% ({:.1}/{:.1} GB)",
            memory.ram.percent_used, memory.ram.used_gb, memory.ram.total_gb
        );
    }

    if let Some(cpu) = report.metrics.cpu.as_ok() {
        println!(
            "⚡ CPU: {:.1}% | load: {:.2}, {:.2}, {:.2}",
            cpu.usage.percent_total,
            cpu.load_average.one_min,
            cpu.load_average.five_min,
            cpu.load_average.fifteen_min
        );
    }

    if let Some(disk) = report.metrics.disk.as_ok() {
        let root = disk
            .partitions
            .iter()
            .find(|p| p.mountpoint == "/")
            .or_else(|| disk.partitions.first());
        if let Some(partition) = root {
            println!(
                "💾 Disk ({}): {:.1}% used ({:.1} GB free)",
                partition.mountpoint, partition.percent_used, partition.free_gb
            );
        }
    }

    println!();
    println!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::alerts::AlertCategory;
    use crate::snapshot::{DomainResult, UNKNOWN_HOSTNAME};

    fn alert(severity: Severity) -> Alert {
        Alert {
            severity,
            category: AlertCategory::Memory,
            message: String::from("test alert"),
            value: None,
            threshold: None,
            context: BTreeMap::new(),
        }
    }

    fn all_failed_snapshot() -> Snapshot {
        Snapshot {
            disk: DomainResult::failed("d"),
            memory: DomainResult::failed("m"),
            cpu: DomainResult::failed("c"),
            system: DomainResult::failed("s"),
            network: DomainResult::failed("n"),
            logs: DomainResult::failed("l"),
        }
    }

    #[test]
    fn empty_alert_list_is_healthy() {
        let summary = summarize(&[]);
        assert_eq!(summary.health_status, HealthStatus::Healthy);
        assert_eq!(summary.total_alerts, 0);
        assert_eq!(summary.critical_alerts, 0);
        assert_eq!(summary.warning_alerts, 0);
    }

    #[test]
    fn warnings_only_is_warning() {
        let alerts = vec![alert(Severity::Warning), alert(Severity::Warning)];
        let summary = summarize(&alerts);
        assert_eq!(summary.health_status, HealthStatus::Warning);
        assert_eq!(summary.total_alerts, 2);
        assert_eq!(summary.warning_alerts, 2);
        assert_eq!(summary.critical_alerts, 0);
    }

    #[test]
    fn any_critical_wins() {
        let alerts = vec![
            alert(Severity::Warning),
            alert(Severity::Critical),
            alert(Severity::Warning),
        ];
        let summary = summarize(&alerts);
        assert_eq!(summary.health_status, HealthStatus::Critical);
        assert_eq!(summary.critical_alerts, 1);
        assert_eq!(summary.warning_alerts, 2);
    }

    #[test]
    fn exit_codes_map_per_status() {
        assert_eq!(HealthStatus::Healthy.exit_code(), 0);
        assert_eq!(HealthStatus::Warning.exit_code(), 1);
        assert_eq!(HealthStatus::Critical.exit_code(), 2);
    }

    #[test]
    fn assemble_uses_hostname_sentinel_when_system_failed() {
        let report = Report::assemble(all_failed_snapshot(), Vec::new(), Local::now());
        assert_eq!(report.hostname, UNKNOWN_HOSTNAME);
        assert_eq!(report.summary.health_status, HealthStatus::Healthy);
        assert_eq!(report.summary.total_alerts, 0);
    }

    #[test]
    fn save_report_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("nested").join("reports");

        let report = Report::assemble(all_failed_snapshot(), Vec::new(), Local::now());
        let path = save_report(&report, &output_dir).unwrap();

        assert!(path.exists());
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("health_"));

        let content = std::fs::read_to_string(&path).unwrap();
        let back: Report = serde_json::from_str(&content).unwrap();
        assert_eq!(report, back);
    }

    #[test]
    fn save_report_fails_on_unwritable_directory() {
        let report = Report::assemble(all_failed_snapshot(), Vec::new(), Local::now());
        let result = save_report(&report, Path::new("/proc/healthmon-cannot-write-here"));
        assert!(result.is_err());
    }
}
