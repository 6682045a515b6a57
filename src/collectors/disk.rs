//! Disk and storage collector.
//!
//! Partition usage comes from sysinfo, inode usage from `df -i`, and the
//! optional per-device health scan from `lsblk` + `smartctl`. The usage
//! numbers are the primary measurement: a failing SMART scan or an
//! unavailable `df` degrades its own section only.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sysinfo::Disks;
use tracing::{debug, warn};

use super::Collector;
use crate::config::Config;
use crate::error::{CollectError, CollectResult};
use crate::util::{bytes_to_gb, round2, run_checked, run_command};

const DF_TIMEOUT: Duration = Duration::from_secs(10);
const LSBLK_TIMEOUT: Duration = Duration::from_secs(10);
const SMARTCTL_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub partitions: Vec<PartitionUsage>,
    pub inodes: Vec<InodeUsage>,
    /// Absent when the SMART scan is disabled or the device scan failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_status: Option<Vec<SmartStatus>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionUsage {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub percent_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InodeUsage {
    pub filesystem: String,
    pub inodes_total: u64,
    pub inodes_used: u64,
    pub inodes_free: u64,
    pub percent_used: f64,
    pub mountpoint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceHealth {
    Healthy,
    Degraded,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartStatus {
    pub device: String,
    pub available: bool,
    pub health_status: DeviceHealth,
    pub temperature: Option<i64>,
    pub power_on_hours: Option<i64>,
    pub reallocated_sectors: Option<i64>,
}

pub struct DiskCollector;

#[async_trait]
impl Collector for DiskCollector {
    type Output = DiskMetrics;

    fn domain(&self) -> &'static str {
        "disk"
    }

    async fn collect(&self, config: &Config) -> CollectResult<DiskMetrics> {
        let partitions = partition_usage();

        let inodes = match inode_usage().await {
            Ok(inodes) => inodes,
            Err(e) => {
                warn!("inode usage unavailable: {e}");
                Vec::new()
            }
        };

        let smart_status = if config.monitoring.check_smart {
            match smart_scan().await {
                Ok(devices) => Some(devices),
                Err(e) => {
                    warn!("smart scan unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        Ok(DiskMetrics {
            partitions,
            inodes,
            smart_status,
        })
    }
}

fn partition_usage() -> Vec<PartitionUsage> {
    let disks = Disks::new_with_refreshed_list();

    disks
        .list()
        .iter()
        .filter(|disk| disk.total_space() > 0)
        .map(|disk| {
            let total = disk.total_space();
            let available = disk.available_space();
            let used = total.saturating_sub(available);
            PartitionUsage {
                device: disk.name().to_string_lossy().into_owned(),
                mountpoint: disk.mount_point().to_string_lossy().into_owned(),
                fstype: disk.file_system().to_string_lossy().into_owned(),
                total_gb: bytes_to_gb(total),
                used_gb: bytes_to_gb(used),
                free_gb: bytes_to_gb(available),
                percent_used: round2(used as f64 / total as f64 * 100.0),
            }
        })
        .collect()
}

async fn inode_usage() -> CollectResult<Vec<InodeUsage>> {
    let stdout = run_checked("df", &["-i"], DF_TIMEOUT).await?;
    Ok(parse_df_inodes(&stdout))
}

/// Parses `df -i` output, keeping only real devices (`/dev/...`).
fn parse_df_inodes(output: &str) -> Vec<InodeUsage> {
    let mut inodes = Vec::new();

    for line in output.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 6 || !parts[0].starts_with('/') {
            continue;
        }

        let percent = parts[4].trim_end_matches('%');
        let (Ok(total), Ok(used), Ok(free)) = (
            parts[1].parse::<u64>(),
            parts[2].parse::<u64>(),
            parts[3].parse::<u64>(),
        ) else {
            continue;
        };

        inodes.push(InodeUsage {
            filesystem: parts[0].to_string(),
            inodes_total: total,
            inodes_used: used,
            inodes_free: free,
            percent_used: percent.parse().unwrap_or(0.0),
            mountpoint: parts[5].to_string(),
        });
    }

    inodes
}

async fn smart_scan() -> CollectResult<Vec<SmartStatus>> {
    let stdout = run_checked("lsblk", &["-d", "-n", "-o", "NAME,TYPE"], LSBLK_TIMEOUT).await?;
    let mut devices = Vec::new();

    for line in stdout.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 2 && parts[1] == "disk" {
            let device = format!("/dev/{}", parts[0]);
            match device_smart(&device).await {
                Ok(status) => devices.push(status),
                Err(e) => {
                    debug!("smart query for {device} failed: {e}");
                    devices.push(SmartStatus {
                        device,
                        available: false,
                        health_status: DeviceHealth::Unknown,
                        temperature: None,
                        power_on_hours: None,
                        reallocated_sectors: None,
                    });
                }
            }
        }
    }

    Ok(devices)
}

async fn device_smart(device: &str) -> CollectResult<SmartStatus> {
    let output = run_command("smartctl", &["-H", "-A", device], SMARTCTL_TIMEOUT).await?;

    // smartctl exit code 4 still carries a usable report ("some SMART
    // errors"); anything else non-zero means no data for this device.
    let code = output.status.code().unwrap_or(-1);
    if code != 0 && code != 4 {
        return Err(CollectError::UnexpectedExit {
            command: "smartctl".to_string(),
            code: output.status.code(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    Ok(parse_smartctl(device, &stdout, code))
}

fn parse_smartctl(device: &str, output: &str, exit_code: i32) -> SmartStatus {
    let mut status = SmartStatus {
        device: device.to_string(),
        available: output.contains("SMART support is: Available"),
        health_status: DeviceHealth::Unknown,
        temperature: None,
        power_on_hours: None,
        reallocated_sectors: None,
    };

    // Only the overall-health result line decides; the attribute table
    // carries a WHEN_FAILED column header that must not count as a failure.
    if let Some(result) = output.lines().find(|line| line.contains("test result:")) {
        if result.contains("FAILED") {
            status.health_status = DeviceHealth::Failed;
        } else if result.contains("PASSED") {
            status.health_status = if exit_code == 0 {
                DeviceHealth::Healthy
            } else {
                DeviceHealth::Degraded
            };
        }
    }

    for line in output.lines() {
        let attribute_value = || line.split_whitespace().nth(9).and_then(|v| v.parse().ok());

        if line.contains("Temperature_Celsius") || line.contains("Airflow_Temperature") {
            if status.temperature.is_none() {
                status.temperature = attribute_value();
            }
        } else if line.contains("Power_On_Hours") {
            status.power_on_hours = attribute_value();
        } else if line.contains("Reallocated_Sector") {
            status.reallocated_sectors = attribute_value();
        }
    }

    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn df_inode_output_is_parsed() {
        let output = "\
Filesystem       Inodes  IUsed    IFree IUse% Mounted on
devtmpfs        4094720    642  4094078    1% /dev
/dev/nvme0n1p3 15319552 911671 14407881    6% /
/dev/nvme0n1p1        0      0        0     - /boot/efi
tmpfs           4099558   1371  4098187    1% /tmp
";
        let inodes = parse_df_inodes(output);
        assert_eq!(inodes.len(), 2);
        assert_eq!(inodes[0].filesystem, "/dev/nvme0n1p3");
        assert_eq!(inodes[0].inodes_total, 15319552);
        assert_eq!(inodes[0].percent_used, 6.0);
        assert_eq!(inodes[0].mountpoint, "/");
        // the '-' percent column falls back to 0
        assert_eq!(inodes[1].percent_used, 0.0);
    }

    #[test]
    fn smartctl_passed_device_is_healthy() {
        let output = "\
SMART support is: Available - device has SMART capability.
SMART overall-health self-assessment test result: PASSED

ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE      UPDATED  WHEN_FAILED RAW_VALUE
  5 Reallocated_Sector_Ct   0x0033   100   100   010    Pre-fail  Always       -       0
  9 Power_On_Hours          0x0032   095   095   000    Old_age   Always       -       21377
194 Temperature_Celsius     0x0022   061   049   000    Old_age   Always       -       39
";
        let status = parse_smartctl("/dev/sda", output, 0);
        assert!(status.available);
        assert_eq!(status.health_status, DeviceHealth::Healthy);
        assert_eq!(status.temperature, Some(39));
        assert_eq!(status.power_on_hours, Some(21377));
        assert_eq!(status.reallocated_sectors, Some(0));
    }

    #[test]
    fn attribute_table_markers_do_not_override_the_result_line() {
        let output = "\
SMART support is: Available - device has SMART capability.
SMART overall-health self-assessment test result: PASSED

ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE      UPDATED  WHEN_FAILED RAW_VALUE
  5 Reallocated_Sector_Ct   0x0033   100   100   010    Pre-fail  Always   In_the_past 0
";
        let status = parse_smartctl("/dev/sda", output, 0);
        assert_eq!(status.health_status, DeviceHealth::Healthy);
    }

    #[test]
    fn smartctl_failed_device_is_failed() {
        let output = "SMART overall-health self-assessment test result: FAILED!";
        let status = parse_smartctl("/dev/sdb", output, 4);
        assert_eq!(status.health_status, DeviceHealth::Failed);
        assert!(!status.available);
    }

    #[test]
    fn smartctl_passed_with_errors_is_degraded() {
        let output = "\
SMART support is: Available - device has SMART capability.
SMART overall-health self-assessment test result: PASSED
";
        let status = parse_smartctl("/dev/sdc", output, 4);
        assert_eq!(status.health_status, DeviceHealth::Degraded);
    }

    #[test]
    fn device_health_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(DeviceHealth::Failed).unwrap(),
            serde_json::json!("failed")
        );
    }
}
