//! Log collector: journal errors/warnings, boot errors and the kernel ring
//! buffer.
//!
//! Everything here is gated by `monitoring.check_journal_errors`; with the
//! scan disabled the payload stays schema-stable but empty.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Collector;
use crate::config::Config;
use crate::error::CollectResult;
use crate::util::{run_checked, truncate_message};

const JOURNALCTL_TIMEOUT: Duration = Duration::from_secs(30);
const BOOT_LOG_TIMEOUT: Duration = Duration::from_secs(15);
const DMESG_TIMEOUT: Duration = Duration::from_secs(10);

/// Caps on the number of retained entries, most recent kept.
const MAX_ERROR_ENTRIES: usize = 50;
const MAX_WARNING_ENTRIES: usize = 30;
const MAX_MESSAGE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMetrics {
    pub errors: Vec<JournalEntry>,
    pub warnings: Vec<JournalEntry>,
    pub boot_errors: Vec<String>,
    pub kernel_messages: Vec<String>,
    pub collection_period_hours: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: String,
    pub priority: String,
    pub unit: String,
    pub message: String,
}

pub struct LogCollector;

#[async_trait]
impl Collector for LogCollector {
    type Output = LogMetrics;

    fn domain(&self) -> &'static str {
        "logs"
    }

    async fn collect(&self, config: &Config) -> CollectResult<LogMetrics> {
        if !config.monitoring.check_journal_errors {
            return Ok(LogMetrics {
                errors: Vec::new(),
                warnings: Vec::new(),
                boot_errors: Vec::new(),
                kernel_messages: Vec::new(),
                collection_period_hours: 0,
            });
        }

        let hours = config.monitoring.journal_errors_hours;

        let errors = match journal_entries("err", hours, MAX_ERROR_ENTRIES).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("journal error scan unavailable: {e}");
                Vec::new()
            }
        };

        let warnings = match journal_entries("warning", hours, MAX_WARNING_ENTRIES).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("journal warning scan unavailable: {e}");
                Vec::new()
            }
        };

        let boot_errors = match boot_errors().await {
            Ok(lines) => lines,
            Err(e) => {
                warn!("boot log unavailable: {e}");
                Vec::new()
            }
        };

        let kernel_messages = match kernel_messages().await {
            Ok(lines) => lines,
            Err(e) => {
                warn!("kernel ring buffer unavailable: {e}");
                Vec::new()
            }
        };

        Ok(LogMetrics {
            errors,
            warnings,
            boot_errors,
            kernel_messages,
            collection_period_hours: hours,
        })
    }
}

async fn journal_entries(
    priority: &str,
    hours: u64,
    cap: usize,
) -> CollectResult<Vec<JournalEntry>> {
    let since = Local::now() - chrono::Duration::hours(hours as i64);
    let since = since.format("%Y-%m-%d %H:%M:%S").to_string();

    let stdout = run_checked(
        "journalctl",
        &["-p", priority, "--since", &since, "--no-pager", "-o", "json"],
        JOURNALCTL_TIMEOUT,
    )
    .await?;

    Ok(parse_journal_lines(&stdout, cap))
}

/// Parses journalctl's JSON-lines output, keeping the `cap` most recent
/// entries. Unparseable lines are skipped.
fn parse_journal_lines(output: &str, cap: usize) -> Vec<JournalEntry> {
    let mut entries: Vec<JournalEntry> = output
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .map(|entry| JournalEntry {
            timestamp: string_field(&entry, "__REALTIME_TIMESTAMP"),
            priority: string_field(&entry, "PRIORITY"),
            unit: unit_name(&entry),
            message: truncate_message(&string_field(&entry, "MESSAGE"), MAX_MESSAGE_CHARS),
        })
        .collect();

    if entries.len() > cap {
        entries.drain(..entries.len() - cap);
    }
    entries
}

fn string_field(entry: &serde_json::Value, key: &str) -> String {
    entry
        .get(key)
        .and_then(|value| value.as_str())
        .unwrap_or_default()
        .to_string()
}

fn unit_name(entry: &serde_json::Value) -> String {
    for key in ["_SYSTEMD_UNIT", "SYSLOG_IDENTIFIER"] {
        if let Some(unit) = entry.get(key).and_then(|value| value.as_str()) {
            return unit.to_string();
        }
    }
    String::from("unknown")
}

/// Error lines of the current boot, most recent 20.
async fn boot_errors() -> CollectResult<Vec<String>> {
    let stdout = run_checked(
        "journalctl",
        &["-b", "-p", "err", "--no-pager", "--no-hostname", "-n", "20"],
        BOOT_LOG_TIMEOUT,
    )
    .await?;

    Ok(stdout.lines().map(str::to_string).collect())
}

/// Recent err/warn lines from the kernel ring buffer, last 20.
async fn kernel_messages() -> CollectResult<Vec<String>> {
    let stdout = run_checked(
        "dmesg",
        &["-T", "-l", "err,warn", "--color=never"],
        DMESG_TIMEOUT,
    )
    .await?;

    let lines: Vec<String> = stdout.lines().map(str::to_string).collect();

    let skip = lines.len().saturating_sub(20);
    Ok(lines.into_iter().skip(skip).collect())
}
