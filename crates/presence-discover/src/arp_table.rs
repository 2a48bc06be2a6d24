//! Passive read of the system neighbor cache via `arp -a`.
//!
//! Sends nothing on the wire, so it only knows hosts this machine has
//! talked to recently.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use presence_core::{DiscoveredDevice, NormalizedMac, ScanTool};

use crate::config::PresenceConfig;
use crate::error::ScanFailure;
use crate::scanner::{looks_like_mac, ScanStrategy, ToolCommand};

pub struct ArpTableStrategy {
    command: ToolCommand,
}

impl ArpTableStrategy {
    pub fn new(config: &PresenceConfig) -> Self {
        let command = ToolCommand::new(
            &config.arp_path,
            Duration::from_secs(config.arp_table_timeout_secs),
        )
        .arg("-a");

        Self { command }
    }
}

#[async_trait]
impl ScanStrategy for ArpTableStrategy {
    fn tool(&self) -> ScanTool {
        ScanTool::ArpTable
    }

    async fn scan(&self) -> Result<Vec<DiscoveredDevice>, ScanFailure> {
        let stdout = self.command.run().await?;
        let devices = parse_arp_table(&stdout, Utc::now());
        tracing::info!(devices = devices.len(), "ARP table read");
        Ok(devices)
    }
}

/// Parse `host (ip) at mac ...` lines from `arp -a`.
pub fn parse_arp_table(stdout: &str, now: DateTime<Utc>) -> Vec<DiscoveredDevice> {
    stdout
        .lines()
        .filter_map(|line| parse_line(line, now))
        .collect()
}

fn parse_line(line: &str, now: DateTime<Utc>) -> Option<DiscoveredDevice> {
    let mut tokens = line.split_whitespace();
    let host = tokens.next()?;
    let ip = tokens.next()?.strip_prefix('(')?.strip_suffix(')')?;
    if tokens.next()? != "at" {
        return None;
    }

    // `<incomplete>` and friends fail here.
    let raw_mac = pad_octets(tokens.next()?)?;
    if !looks_like_mac(&raw_mac) {
        return None;
    }
    let mac = NormalizedMac::parse(&raw_mac).ok()?;

    Some(DiscoveredDevice {
        ip: ip.to_string(),
        mac,
        observed_at: now,
        source_tool: ScanTool::ArpTable,
        vendor: None,
        hostname: (host != "?").then(|| host.to_string()),
    })
}

/// BSD/macOS `arp` drops leading zeros (`0:1e:c2:9:a:ff`).
fn pad_octets(raw: &str) -> Option<String> {
    let octets: Vec<&str> = raw.split(':').collect();
    if octets.len() != 6 || octets.iter().any(|o| o.is_empty() || o.len() > 2) {
        return None;
    }
    Some(
        octets
            .iter()
            .map(|o| format!("{o:0>2}"))
            .collect::<Vec<_>>()
            .join(":"),
    )
}
