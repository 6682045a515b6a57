//! System collector: host identity, uptime, processes and systemd state.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sysinfo::{ProcessesToUpdate, System};
use tracing::warn;

use super::Collector;
use crate::config::Config;
use crate::error::CollectResult;
use crate::util::{round2, run_command};

const SYSTEMCTL_IS_ACTIVE_TIMEOUT: Duration = Duration::from_secs(5);
const SYSTEMCTL_FAILED_TIMEOUT: Duration = Duration::from_secs(10);

/// Services whose state is always checked when systemd checks are enabled.
const WATCHED_SERVICES: [&str; 7] = [
    "NetworkManager",
    "systemd-journald",
    "sshd",
    "firewalld",
    "chronyd",
    "dbus",
    "polkit",
];

const TOP_PROCESSES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub info: SystemInfo,
    pub processes: ProcessOverview,
    pub systemd_services: Vec<ServiceStatus>,
    pub failed_services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub os: String,
    pub os_version: String,
    pub distribution: String,
    pub kernel: String,
    pub architecture: String,
    pub boot_time: String,
    pub uptime_seconds: u64,
    pub uptime_human: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOverview {
    pub total_processes: usize,
    pub top_cpu_usage: Vec<ProcessSample>,
    pub top_memory_usage: Vec<ProcessSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    /// Raw `systemctl is-active` answer (active, inactive, failed, ...),
    /// or "error" when the query itself failed.
    pub status: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct SystemCollector;

#[async_trait]
impl Collector for SystemCollector {
    type Output = SystemMetrics;

    fn domain(&self) -> &'static str {
        "system"
    }

    async fn collect(&self, config: &Config) -> CollectResult<SystemMetrics> {
        let info = system_info();
        let processes = process_overview().await;

        let systemd_services = if config.monitoring.check_systemd_services {
            watched_service_status().await
        } else {
            Vec::new()
        };

        let failed_services = match failed_services().await {
            Ok(failed) => failed,
            Err(e) => {
                warn!("failed-unit listing unavailable: {e}");
                Vec::new()
            }
        };

        Ok(SystemMetrics {
            info,
            processes,
            systemd_services,
            failed_services,
        })
    }
}

fn system_info() -> SystemInfo {
    let boot_time = System::boot_time();
    let uptime = System::uptime();
    let boot = DateTime::from_timestamp(boot_time as i64, 0)
        .map(|t| t.with_timezone(&Local).to_rfc3339())
        .unwrap_or_default();

    SystemInfo {
        hostname: System::host_name().unwrap_or_else(|| String::from("unknown")),
        os: System::name().unwrap_or_default(),
        os_version: System::os_version().unwrap_or_default(),
        distribution: distribution_name(),
        kernel: System::kernel_version().unwrap_or_default(),
        architecture: System::cpu_arch(),
        boot_time: boot,
        uptime_seconds: uptime,
        uptime_human: format_uptime(uptime),
    }
}

/// PRETTY_NAME from /etc/os-release, falling back to sysinfo's long OS name.
fn distribution_name() -> String {
    if let Ok(content) = std::fs::read_to_string("/etc/os-release") {
        for line in content.lines() {
            if let Some(value) = line.strip_prefix("PRETTY_NAME=") {
                return value.trim().trim_matches('"').to_string();
            }
        }
    }

    System::long_os_version().unwrap_or_default()
}

fn format_uptime(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }

    if parts.is_empty() {
        String::from("< 1m")
    } else {
        parts.join(" ")
    }
}

async fn process_overview() -> ProcessOverview {
    let mut sys = System::new();
    sys.refresh_memory();

    // First refresh primes the per-process CPU counters; the delta after the
    // minimum interval is the actual usage.
    sys.refresh_processes(ProcessesToUpdate::All, true);
    tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let total_memory = sys.total_memory();
    let mut samples: Vec<ProcessSample> = sys
        .processes()
        .values()
        .map(|process| ProcessSample {
            pid: process.pid().as_u32(),
            name: process.name().to_string_lossy().into_owned(),
            cpu_percent: process.cpu_usage(),
            memory_percent: if total_memory == 0 {
                0.0
            } else {
                round2(process.memory() as f64 / total_memory as f64 * 100.0)
            },
        })
        .collect();

    let total_processes = samples.len();

    samples.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
    let top_cpu_usage = samples.iter().take(TOP_PROCESSES).cloned().collect();

    samples.sort_by(|a, b| b.memory_percent.total_cmp(&a.memory_percent));
    let top_memory_usage = samples.iter().take(TOP_PROCESSES).cloned().collect();

    ProcessOverview {
        total_processes,
        top_cpu_usage,
        top_memory_usage,
    }
}

async fn watched_service_status() -> Vec<ServiceStatus> {
    let mut services = Vec::with_capacity(WATCHED_SERVICES.len());

    for service in WATCHED_SERVICES {
        // `systemctl is-active` exits non-zero for anything but active, so
        // the exit status is not an error here; the stdout word is the state.
        match run_command("systemctl", &["is-active", service], SYSTEMCTL_IS_ACTIVE_TIMEOUT).await {
            Ok(output) => {
                let status = String::from_utf8_lossy(&output.stdout).trim().to_string();
                services.push(ServiceStatus {
                    name: service.to_string(),
                    active: status == "active",
                    status,
                    error: None,
                });
            }
            Err(e) => {
                warn!("status query for {service} failed: {e}");
                services.push(ServiceStatus {
                    name: service.to_string(),
                    status: String::from("error"),
                    active: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    services
}

async fn failed_services() -> CollectResult<Vec<String>> {
    let output = run_command(
        "systemctl",
        &["--failed", "--no-pager", "--no-legend"],
        SYSTEMCTL_FAILED_TIMEOUT,
    )
    .await?;

    if !output.status.success() {
        return Ok(Vec::new());
    }

    // Modern systemctl prefixes failed rows with a "●" marker token.
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.split_whitespace().find(|token| *token != "●"))
        .map(str::to_string)
        .collect())
}
