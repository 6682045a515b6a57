//! Alert rule engine.
//!
//! A pure mapping from a snapshot and threshold configuration to an ordered
//! alert list. Categories are evaluated in fixed order (disk, memory, cpu,
//! system, network); within a threshold pair the critical condition is
//! checked first, so a metric emits at most one alert and the more severe
//! one wins.
//!
//! Domains whose collection failed generate no alerts: absence of data is
//! not evidence of a degraded host.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collectors::cpu::CpuMetrics;
use crate::collectors::disk::{DeviceHealth, DiskMetrics};
use crate::collectors::memory::MemoryMetrics;
use crate::collectors::network::NetworkMetrics;
use crate::collectors::system::SystemMetrics;
use crate::config::Thresholds;
use crate::snapshot::Snapshot;

/// Cumulative in/out error count above which an interface is flagged.
const INTERFACE_ERROR_LIMIT: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Disk,
    Memory,
    Cpu,
    System,
    Network,
}

/// A structured finding. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub category: AlertCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Open key/value set (mountpoint, device, sensor, service, host,
    /// interface, ...), flattened into the alert object in the artifact.
    #[serde(flatten)]
    pub context: BTreeMap<String, Value>,
}

impl Alert {
    fn new(severity: Severity, category: AlertCategory, message: String) -> Self {
        Self {
            severity,
            category,
            message,
            value: None,
            threshold: None,
            context: BTreeMap::new(),
        }
    }

    fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    fn with_context<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// Compares a value against a warning/critical pair.
///
/// Critical is checked first; a pair is mutually exclusive by construction.
/// Nothing relates the two limits to each other, so an inverted pair
/// behaves exactly as configured.
pub fn evaluate(value: f64, warning: f64, critical: f64) -> Option<Severity> {
    if value >= critical {
        Some(Severity::Critical)
    } else if value >= warning {
        Some(Severity::Warning)
    } else {
        None
    }
}

/// Generates all alerts for a snapshot, in category order.
pub fn generate_alerts(snapshot: &Snapshot, thresholds: &Thresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(disk) = snapshot.disk.as_ok() {
        alerts.extend(check_disk_alerts(disk, thresholds));
    }
    if let Some(memory) = snapshot.memory.as_ok() {
        alerts.extend(check_memory_alerts(memory, thresholds));
    }
    if let Some(cpu) = snapshot.cpu.as_ok() {
        alerts.extend(check_cpu_alerts(cpu, thresholds));
    }
    if let Some(system) = snapshot.system.as_ok() {
        alerts.extend(check_system_alerts(system));
    }
    if let Some(network) = snapshot.network.as_ok() {
        alerts.extend(check_network_alerts(network));
    }

    alerts
}

fn check_disk_alerts(metrics: &DiskMetrics, thresholds: &Thresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for partition in &metrics.partitions {
        let usage = partition.percent_used;
        match evaluate(
            usage,
            thresholds.disk_usage_warning,
            thresholds.disk_usage_critical,
        ) {
            Some(Severity::Critical) => alerts.push(
                Alert::new(
                    Severity::Critical,
                    AlertCategory::Disk,
                    format!("critical disk usage on {}: {usage}%", partition.mountpoint),
                )
                .with_value(usage)
                .with_threshold(thresholds.disk_usage_critical)
                .with_context("mountpoint", partition.mountpoint.clone()),
            ),
            Some(Severity::Warning) => alerts.push(
                Alert::new(
                    Severity::Warning,
                    AlertCategory::Disk,
                    format!("high disk usage on {}: {usage}%", partition.mountpoint),
                )
                .with_value(usage)
                .with_threshold(thresholds.disk_usage_warning)
                .with_context("mountpoint", partition.mountpoint.clone()),
            ),
            None => {}
        }
    }

    // A device that reports failed health is critical regardless of any
    // configured threshold.
    if let Some(smart) = &metrics.smart_status {
        for device in smart {
            if device.health_status == DeviceHealth::Failed {
                alerts.push(
                    Alert::new(
                        Severity::Critical,
                        AlertCategory::Disk,
                        format!("SMART health check failed for {}", device.device),
                    )
                    .with_context("device", device.device.clone()),
                );
            }
        }
    }

    alerts
}

fn check_memory_alerts(metrics: &MemoryMetrics, thresholds: &Thresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    let ram = metrics.ram.percent_used;
    match evaluate(
        ram,
        thresholds.memory_usage_warning,
        thresholds.memory_usage_critical,
    ) {
        Some(Severity::Critical) => alerts.push(
            Alert::new(
                Severity::Critical,
                AlertCategory::Memory,
                format!("critical RAM usage: {ram}%"),
            )
            .with_value(ram)
            .with_threshold(thresholds.memory_usage_critical),
        ),
        Some(Severity::Warning) => alerts.push(
            Alert::new(
                Severity::Warning,
                AlertCategory::Memory,
                format!("high RAM usage: {ram}%"),
            )
            .with_value(ram)
            .with_threshold(thresholds.memory_usage_warning),
        ),
        None => {}
    }

    let swap = metrics.swap.percent_used;
    match evaluate(
        swap,
        thresholds.swap_usage_warning,
        thresholds.swap_usage_critical,
    ) {
        Some(Severity::Critical) => alerts.push(
            Alert::new(
                Severity::Critical,
                AlertCategory::Memory,
                format!("critical swap usage: {swap}%"),
            )
            .with_value(swap)
            .with_threshold(thresholds.swap_usage_critical),
        ),
        Some(Severity::Warning) => alerts.push(
            Alert::new(
                Severity::Warning,
                AlertCategory::Memory,
                format!("high swap usage: {swap}%"),
            )
            .with_value(swap)
            .with_threshold(thresholds.swap_usage_warning),
        ),
        None => {}
    }

    alerts
}

fn check_cpu_alerts(metrics: &CpuMetrics, thresholds: &Thresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    let load = metrics.load_average.normalized_five_min;
    match evaluate(load, thresholds.cpu_load_warning, thresholds.cpu_load_critical) {
        Some(Severity::Critical) => alerts.push(
            Alert::new(
                Severity::Critical,
                AlertCategory::Cpu,
                format!("critical CPU load (5 min, normalized): {load}"),
            )
            .with_value(load)
            .with_threshold(thresholds.cpu_load_critical),
        ),
        Some(Severity::Warning) => alerts.push(
            Alert::new(
                Severity::Warning,
                AlertCategory::Cpu,
                format!("high CPU load (5 min, normalized): {load}"),
            )
            .with_value(load)
            .with_threshold(thresholds.cpu_load_warning),
        ),
        None => {}
    }

    for reading in &metrics.temperature {
        let current = reading.current as f64;
        match evaluate(
            current,
            thresholds.cpu_temp_warning,
            thresholds.cpu_temp_critical,
        ) {
            Some(Severity::Critical) => alerts.push(
                Alert::new(
                    Severity::Critical,
                    AlertCategory::Cpu,
                    format!("critical CPU temperature: {current}°C"),
                )
                .with_value(current)
                .with_threshold(thresholds.cpu_temp_critical)
                .with_context("sensor", reading.label.clone()),
            ),
            Some(Severity::Warning) => alerts.push(
                Alert::new(
                    Severity::Warning,
                    AlertCategory::Cpu,
                    format!("high CPU temperature: {current}°C"),
                )
                .with_value(current)
                .with_threshold(thresholds.cpu_temp_warning)
                .with_context("sensor", reading.label.clone()),
            ),
            None => {}
        }
    }

    alerts
}

fn check_system_alerts(metrics: &SystemMetrics) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if !metrics.failed_services.is_empty() {
        alerts.push(
            Alert::new(
                Severity::Warning,
                AlertCategory::System,
                format!(
                    "{} systemd unit(s) in failed state",
                    metrics.failed_services.len()
                ),
            )
            .with_context("services", metrics.failed_services.clone()),
        );
    }

    for service in &metrics.systemd_services {
        // An explicitly inactive service is fine; anything else that is not
        // active (failed, activating, error, ...) is worth a warning.
        if !service.active && service.status != "inactive" {
            alerts.push(
                Alert::new(
                    Severity::Warning,
                    AlertCategory::System,
                    format!("service {} is not active", service.name),
                )
                .with_context("service", service.name.clone())
                .with_context("status", service.status.clone()),
            );
        }
    }

    alerts
}

fn check_network_alerts(metrics: &NetworkMetrics) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(connectivity) = &metrics.connectivity {
        for probe in connectivity {
            if !probe.reachable {
                alerts.push(
                    Alert::new(
                        Severity::Warning,
                        AlertCategory::Network,
                        format!("host {} is unreachable", probe.host),
                    )
                    .with_context("host", probe.host.clone()),
                );
            }
        }
    }

    if !metrics.dns.can_resolve {
        alerts.push(Alert::new(
            Severity::Critical,
            AlertCategory::Network,
            String::from("DNS resolution failure"),
        ));
    }

    for interface in &metrics.interfaces {
        let errors_in = interface.statistics.errors_in;
        let errors_out = interface.statistics.errors_out;
        if errors_in > INTERFACE_ERROR_LIMIT || errors_out > INTERFACE_ERROR_LIMIT {
            alerts.push(
                Alert::new(
                    Severity::Warning,
                    AlertCategory::Network,
                    format!("interface {} reports elevated error counters", interface.name),
                )
                .with_context("interface", interface.name.clone())
                .with_context("errors_in", errors_in)
                .with_context("errors_out", errors_out),
            );
        }
    }

    alerts
}
