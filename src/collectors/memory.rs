//! Memory collector: physical memory and swap, absolute and percent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sysinfo::System;

use super::Collector;
use crate::config::Config;
use crate::error::CollectResult;
use crate::util::{bytes_to_gb, round2};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub ram: RamUsage,
    pub swap: SwapUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RamUsage {
    pub total_gb: f64,
    pub available_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub percent_used: f64,
    /// Buffer/cache breakdown from /proc/meminfo; 0 where a field is not
    /// reported.
    pub buffers_gb: f64,
    pub cached_gb: f64,
    pub shared_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapUsage {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub percent_used: f64,
}

pub struct MemoryCollector;

#[async_trait]
impl Collector for MemoryCollector {
    type Output = MemoryMetrics;

    fn domain(&self) -> &'static str {
        "memory"
    }

    async fn collect(&self, _config: &Config) -> CollectResult<MemoryMetrics> {
        let mut sys = System::new();
        sys.refresh_memory();

        let meminfo = std::fs::read_to_string("/proc/meminfo").unwrap_or_default();

        Ok(MemoryMetrics {
            ram: RamUsage {
                total_gb: bytes_to_gb(sys.total_memory()),
                available_gb: bytes_to_gb(sys.available_memory()),
                used_gb: bytes_to_gb(sys.used_memory()),
                free_gb: bytes_to_gb(sys.free_memory()),
                percent_used: percent_of(sys.used_memory(), sys.total_memory()),
                buffers_gb: meminfo_gb(&meminfo, "Buffers:"),
                cached_gb: meminfo_gb(&meminfo, "Cached:"),
                shared_gb: meminfo_gb(&meminfo, "Shmem:"),
            },
            swap: SwapUsage {
                total_gb: bytes_to_gb(sys.total_swap()),
                used_gb: bytes_to_gb(sys.used_swap()),
                free_gb: bytes_to_gb(sys.free_swap()),
                percent_used: percent_of(sys.used_swap(), sys.total_swap()),
            },
        })
    }
}

/// One kB field of a /proc/meminfo document, converted to GB. The key must
/// match at the start of the line, so `Cached:` does not pick up
/// `SwapCached:`.
fn meminfo_gb(content: &str, key: &str) -> f64 {
    content
        .lines()
        .find_map(|line| {
            let rest = line.strip_prefix(key)?;
            let kb: u64 = rest.trim().strip_suffix("kB")?.trim().parse().ok()?;
            Some(bytes_to_gb(kb * 1024))
        })
        .unwrap_or(0.0)
}

/// Percentage of `used` in `total`; a zero-sized total (no swap) is 0%.
fn percent_of(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(used as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_total_reports_zero_percent() {
        assert_eq!(percent_of(0, 0), 0.0);
        assert_eq!(percent_of(123, 0), 0.0);
    }

    #[test]
    fn meminfo_fields_are_extracted_by_anchored_key() {
        let meminfo = "\
MemTotal:       32618492 kB
MemFree:         4295912 kB
Buffers:          524288 kB
Cached:          8388608 kB
SwapCached:        12345 kB
Shmem:           1048576 kB
";
        assert_eq!(meminfo_gb(meminfo, "Buffers:"), 0.5);
        assert_eq!(meminfo_gb(meminfo, "Cached:"), 8.0);
        assert_eq!(meminfo_gb(meminfo, "Shmem:"), 1.0);
        assert_eq!(meminfo_gb(meminfo, "HugePages_Total:"), 0.0);
        assert_eq!(meminfo_gb("", "Buffers:"), 0.0);
    }

    #[test]
    fn percent_is_rounded() {
        assert_eq!(percent_of(1, 3), 33.33);
        assert_eq!(percent_of(1, 2), 50.0);
        assert_eq!(percent_of(2, 2), 100.0);
    }

    #[tokio::test]
    async fn live_memory_is_consistent() {
        let metrics = MemoryCollector
            .collect(&Config::default())
            .await
            .unwrap();
        assert!(metrics.ram.total_gb > 0.0);
        assert!(metrics.ram.used_gb <= metrics.ram.total_gb);
        assert!(metrics.ram.percent_used >= 0.0 && metrics.ram.percent_used <= 100.0);
        assert!(metrics.swap.percent_used >= 0.0 && metrics.swap.percent_used <= 100.0);
    }
}
