//! Ping sweep via `nmap -sn`.
//!
//! Needs no raw sockets of its own, but only reports MAC addresses for
//! hosts on the local segment and misses hosts that drop ICMP.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use presence_core::{DiscoveredDevice, NormalizedMac, ScanTool};

use crate::config::PresenceConfig;
use crate::error::ScanFailure;
use crate::scanner::{looks_like_mac, ScanStrategy, ToolCommand};

const REPORT_PREFIX: &str = "Nmap scan report for ";
const MAC_PREFIX: &str = "MAC Address: ";

pub struct NmapStrategy {
    command: ToolCommand,
}

impl NmapStrategy {
    pub fn new(config: &PresenceConfig, range: Ipv4Net) -> Self {
        let command = ToolCommand::new(
            &config.nmap_path,
            Duration::from_secs(config.nmap_timeout_secs),
        )
        .arg("-sn")
        .arg(range.to_string())
        .arg("--max-retries")
        .arg(config.nmap_max_retries.to_string())
        .args(["--max-rtt-timeout", "500ms", "--host-timeout", "5s"]);

        Self { command }
    }

    pub fn command(&self) -> &ToolCommand {
        &self.command
    }
}

#[async_trait]
impl ScanStrategy for NmapStrategy {
    fn tool(&self) -> ScanTool {
        ScanTool::Nmap
    }

    async fn scan(&self) -> Result<Vec<DiscoveredDevice>, ScanFailure> {
        let stdout = self.command.run().await?;
        let devices = parse_nmap_output(&stdout, Utc::now());
        tracing::info!(devices = devices.len(), "nmap sweep finished");
        Ok(devices)
    }
}

/// Parse nmap's normal (human-readable) ping-sweep output.
///
/// A `Nmap scan report for` line sets the current host; a following
/// `MAC Address:` line emits a device for it.
pub fn parse_nmap_output(stdout: &str, now: DateTime<Utc>) -> Vec<DiscoveredDevice> {
    let mut devices = Vec::new();
    let mut current: Option<(String, Option<String>)> = None;

    for line in stdout.lines().map(str::trim) {
        if let Some(target) = line.strip_prefix(REPORT_PREFIX) {
            current = Some(parse_report_target(target));
            continue;
        }

        let Some(rest) = line.strip_prefix(MAC_PREFIX) else {
            continue;
        };
        // Each report has at most one MAC line.
        let Some((ip, hostname)) = current.take() else {
            continue;
        };

        let (raw_mac, vendor) = match rest.split_once(' ') {
            Some((mac, vendor)) => (mac, parse_vendor(vendor)),
            None => (rest, None),
        };

        if !looks_like_mac(raw_mac) {
            continue;
        }
        let Ok(mac) = NormalizedMac::parse(raw_mac) else {
            continue;
        };

        devices.push(DiscoveredDevice {
            ip,
            mac,
            observed_at: now,
            source_tool: ScanTool::Nmap,
            vendor,
            hostname,
        });
    }

    devices
}

/// `192.168.1.5` or `printer.lan (192.168.1.5)`.
fn parse_report_target(target: &str) -> (String, Option<String>) {
    let target = target.trim();
    match target.strip_suffix(')').and_then(|t| t.split_once(" (")) {
        Some((host, ip)) => (ip.to_string(), Some(host.to_string())),
        None => (target.to_string(), None),
    }
}

fn parse_vendor(raw: &str) -> Option<String> {
    raw.trim()
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .filter(|v| !v.is_empty() && *v != "Unknown")
        .map(String::from)
}
