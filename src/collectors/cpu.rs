//! CPU collector: utilization, load averages and sensor temperatures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sysinfo::{Components, System};
use tracing::debug;

use super::Collector;
use crate::config::Config;
use crate::error::CollectResult;
use crate::util::round2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub usage: CpuUsage,
    pub load_average: LoadAverage,
    /// One entry per sensor that actually reports a temperature; empty on
    /// hosts without exposed thermal sensors.
    pub temperature: Vec<SensorReading>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub percent_total: f32,
    pub percent_per_core: Vec<f32>,
    /// Physical cores; not determinable on every platform.
    pub core_count: Option<usize>,
    pub logical_count: usize,
    pub frequency_mhz: FrequencyMhz,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyMhz {
    pub current: Option<u64>,
    pub min: Option<u64>,
    pub max: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadAverage {
    pub one_min: f64,
    pub five_min: f64,
    pub fifteen_min: f64,
    pub cpu_count: usize,
    pub normalized_one_min: f64,
    pub normalized_five_min: f64,
    pub normalized_fifteen_min: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub label: String,
    pub current: f32,
    pub high: Option<f32>,
    pub critical: Option<f32>,
}

pub struct CpuCollector;

#[async_trait]
impl Collector for CpuCollector {
    type Output = CpuMetrics;

    fn domain(&self) -> &'static str {
        "cpu"
    }

    async fn collect(&self, _config: &Config) -> CollectResult<CpuMetrics> {
        let mut sys = System::new();

        // Two refreshes separated by the minimum update interval, otherwise
        // sysinfo has no delta to compute usage from.
        sys.refresh_cpu_usage();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu_usage();

        let cpus = sys.cpus();
        let logical_count = cpus.len();

        let usage = CpuUsage {
            percent_total: sys.global_cpu_usage(),
            percent_per_core: cpus.iter().map(|cpu| cpu.cpu_usage()).collect(),
            core_count: System::physical_core_count(),
            logical_count,
            frequency_mhz: FrequencyMhz {
                current: cpus.first().map(|cpu| cpu.frequency()),
                min: cpufreq_bound("cpuinfo_min_freq"),
                max: cpufreq_bound("cpuinfo_max_freq"),
            },
        };

        let load = System::load_average();

        Ok(CpuMetrics {
            usage,
            load_average: load_average(load.one, load.five, load.fifteen, logical_count),
            temperature: sensor_readings(),
        })
    }
}

fn load_average(one: f64, five: f64, fifteen: f64, logical_count: usize) -> LoadAverage {
    let cpu_count = logical_count.max(1);

    LoadAverage {
        one_min: round2(one),
        five_min: round2(five),
        fifteen_min: round2(fifteen),
        cpu_count,
        normalized_one_min: round2(one / cpu_count as f64),
        normalized_five_min: round2(five / cpu_count as f64),
        normalized_fifteen_min: round2(fifteen / cpu_count as f64),
    }
}

/// Reads a cpufreq bound for cpu0 in kHz and converts it to MHz.
fn cpufreq_bound(file: &str) -> Option<u64> {
    let path = format!("/sys/devices/system/cpu/cpu0/cpufreq/{file}");
    match std::fs::read_to_string(&path) {
        Ok(content) => content.trim().parse::<u64>().ok().map(|khz| khz / 1000),
        Err(e) => {
            debug!("no cpufreq bound at {path}: {e}");
            None
        }
    }
}

fn sensor_readings() -> Vec<SensorReading> {
    let components = Components::new_with_refreshed_list();

    components
        .iter()
        .filter_map(|component| {
            component.temperature().map(|current| SensorReading {
                label: component.label().to_string(),
                current,
                high: component.max(),
                critical: component.critical(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_divides_by_core_count() {
        let load = load_average(4.0, 8.0, 2.0, 4);
        assert_eq!(load.normalized_one_min, 1.0);
        assert_eq!(load.normalized_five_min, 2.0);
        assert_eq!(load.normalized_fifteen_min, 0.5);
        assert_eq!(load.cpu_count, 4);
    }

    #[test]
    fn zero_logical_count_does_not_divide_by_zero() {
        let load = load_average(1.0, 1.0, 1.0, 0);
        assert_eq!(load.cpu_count, 1);
        assert_eq!(load.normalized_five_min, 1.0);
    }

    #[tokio::test]
    async fn live_cpu_metrics_are_plausible() {
        let metrics = CpuCollector.collect(&Config::default()).await.unwrap();
        assert!(metrics.usage.logical_count > 0);
        assert_eq!(
            metrics.usage.percent_per_core.len(),
            metrics.usage.logical_count
        );
        assert_eq!(metrics.load_average.cpu_count, metrics.usage.logical_count);
        assert!(metrics.load_average.normalized_five_min >= 0.0);
    }
}
