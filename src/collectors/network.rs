//! Network collector: interfaces, connection states, DNS and reachability.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sysinfo::Networks;
use tokio::net::lookup_host;
use tracing::{debug, warn};

use super::Collector;
use crate::config::Config;
use crate::error::CollectResult;
use crate::util::{bytes_to_mb, round2, run_command};

const PING_TIMEOUT: Duration = Duration::from_secs(5);
const DNS_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Host used for the live resolution probe.
const DNS_PROBE_HOST: &str = "google.com:443";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub interfaces: Vec<InterfaceMetrics>,
    pub connections: ConnectionCounts,
    pub dns: DnsInfo,
    /// Absent when no probe hosts are configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectivity: Option<Vec<ConnectivityProbe>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceMetrics {
    pub name: String,
    pub is_up: bool,
    /// Link speed in Mbit/s; virtual and wireless interfaces don't report one.
    pub speed_mbps: Option<u64>,
    pub mtu: u64,
    pub addresses: Vec<String>,
    pub statistics: InterfaceCounters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub bytes_sent_mb: f64,
    pub bytes_recv_mb: f64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errors_in: u64,
    pub errors_out: u64,
    pub drops_in: u64,
    pub drops_out: u64,
}

/// TCP connection counts by state, over IPv4 and IPv6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionCounts {
    pub total: u64,
    pub established: u64,
    pub listen: u64,
    pub time_wait: u64,
    pub close_wait: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsInfo {
    pub nameservers: Vec<String>,
    pub can_resolve: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityProbe {
    pub host: String,
    pub reachable: bool,
    pub latency_ms: Option<f64>,
}

pub struct NetworkCollector;

#[async_trait]
impl Collector for NetworkCollector {
    type Output = NetworkMetrics;

    fn domain(&self) -> &'static str {
        "network"
    }

    async fn collect(&self, config: &Config) -> CollectResult<NetworkMetrics> {
        let interfaces = interface_metrics();
        let connections = connection_counts();
        let dns = dns_info().await;

        let hosts = &config.monitoring.network_check_hosts;
        let connectivity = if hosts.is_empty() {
            None
        } else {
            let mut probes = Vec::with_capacity(hosts.len());
            for host in hosts {
                probes.push(probe_host(host).await);
            }
            Some(probes)
        };

        Ok(NetworkMetrics {
            interfaces,
            connections,
            dns,
            connectivity,
        })
    }
}

fn interface_metrics() -> Vec<InterfaceMetrics> {
    let networks = Networks::new_with_refreshed_list();

    let mut interfaces: Vec<InterfaceMetrics> = networks
        .iter()
        .map(|(name, data)| InterfaceMetrics {
            name: name.clone(),
            is_up: interface_is_up(name),
            speed_mbps: interface_speed(name),
            mtu: data.mtu(),
            addresses: data
                .ip_networks()
                .iter()
                .map(|network| network.to_string())
                .collect(),
            statistics: InterfaceCounters {
                bytes_sent_mb: bytes_to_mb(data.total_transmitted()),
                bytes_recv_mb: bytes_to_mb(data.total_received()),
                packets_sent: data.total_packets_transmitted(),
                packets_recv: data.total_packets_received(),
                errors_in: data.total_errors_on_received(),
                errors_out: data.total_errors_on_transmitted(),
                drops_in: sysfs_counter(name, "statistics/rx_dropped"),
                drops_out: sysfs_counter(name, "statistics/tx_dropped"),
            },
        })
        .collect();

    // Networks iterates in hash order; keep the artifact deterministic.
    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    interfaces
}

/// IFF_UP from the interface flags, with operstate as fallback.
fn interface_is_up(name: &str) -> bool {
    if let Ok(flags) = std::fs::read_to_string(format!("/sys/class/net/{name}/flags")) {
        if let Ok(bits) = u64::from_str_radix(flags.trim().trim_start_matches("0x"), 16) {
            return bits & 0x1 != 0;
        }
    }

    std::fs::read_to_string(format!("/sys/class/net/{name}/operstate"))
        .map(|state| state.trim() == "up")
        .unwrap_or(false)
}

fn interface_speed(name: &str) -> Option<u64> {
    let speed = std::fs::read_to_string(format!("/sys/class/net/{name}/speed")).ok()?;
    match speed.trim().parse::<i64>() {
        Ok(mbps) if mbps > 0 => Some(mbps as u64),
        _ => None,
    }
}

fn sysfs_counter(name: &str, stat: &str) -> u64 {
    std::fs::read_to_string(format!("/sys/class/net/{name}/{stat}"))
        .ok()
        .and_then(|content| content.trim().parse().ok())
        .unwrap_or(0)
}

fn connection_counts() -> ConnectionCounts {
    let mut counts = ConnectionCounts {
        total: 0,
        established: 0,
        listen: 0,
        time_wait: 0,
        close_wait: 0,
    };

    for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
        let Ok(content) = std::fs::read_to_string(table) else {
            debug!("{table} not readable, skipping");
            continue;
        };
        tally_tcp_states(&content, &mut counts);
    }

    counts
}

/// Tallies the hex `st` column of a /proc/net/tcp-format table.
fn tally_tcp_states(content: &str, counts: &mut ConnectionCounts) {
    for line in content.lines().skip(1) {
        let Some(state) = line.split_whitespace().nth(3) else {
            continue;
        };

        counts.total += 1;
        match state {
            "01" => counts.established += 1,
            "06" => counts.time_wait += 1,
            "08" => counts.close_wait += 1,
            "0A" => counts.listen += 1,
            _ => {}
        }
    }
}

async fn dns_info() -> DnsInfo {
    let mut nameservers = Vec::new();

    match std::fs::read_to_string("/etc/resolv.conf") {
        Ok(content) => {
            for line in content.lines() {
                let mut parts = line.split_whitespace();
                if parts.next() == Some("nameserver") {
                    if let Some(address) = parts.next() {
                        nameservers.push(address.to_string());
                    }
                }
            }
        }
        Err(e) => warn!("resolv.conf not readable: {e}"),
    }

    let can_resolve = matches!(
        tokio::time::timeout(DNS_PROBE_TIMEOUT, lookup_host(DNS_PROBE_HOST)).await,
        Ok(Ok(_))
    );

    DnsInfo {
        nameservers,
        can_resolve,
    }
}

async fn probe_host(host: &str) -> ConnectivityProbe {
    match run_command("ping", &["-c", "1", "-W", "2", host], PING_TIMEOUT).await {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            ConnectivityProbe {
                host: host.to_string(),
                reachable: true,
                latency_ms: parse_ping_latency(&stdout),
            }
        }
        Ok(_) => ConnectivityProbe {
            host: host.to_string(),
            reachable: false,
            latency_ms: None,
        },
        Err(e) => {
            warn!("ping probe for {host} failed: {e}");
            ConnectivityProbe {
                host: host.to_string(),
                reachable: false,
                latency_ms: None,
            }
        }
    }
}

fn parse_ping_latency(output: &str) -> Option<f64> {
    let pattern = Regex::new(r"time=([0-9.]+)").ok()?;
    let captures = pattern.captures(output)?;
    captures[1].parse().ok().map(round2)
}
