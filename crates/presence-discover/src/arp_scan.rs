//! Active link-layer scan via `arp-scan`.
//!
//! Fastest and most complete strategy, but needs raw sockets (root) and an
//! optional package.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use is_root::is_root;
use presence_core::{DiscoveredDevice, NormalizedMac, ScanTool};

use crate::config::PresenceConfig;
use crate::error::ScanFailure;
use crate::scanner::{looks_like_mac, ScanStrategy, ToolCommand};

pub struct ArpScanStrategy {
    command: ToolCommand,
}

impl ArpScanStrategy {
    pub fn new(config: &PresenceConfig, interface: &str) -> Self {
        Self::with_privileges(config, interface, is_root())
    }

    /// `sudo` is only prepended when configured and not already root.
    fn with_privileges(config: &PresenceConfig, interface: &str, running_as_root: bool) -> Self {
        let timeout = Duration::from_secs(config.arp_scan_timeout_secs);
        let args = [
            "--localnet".to_string(),
            "--interface".to_string(),
            interface.to_string(),
            format!("--retry={}", config.arp_scan_retries),
            format!("--timeout={}", config.arp_scan_probe_timeout_ms),
        ];

        let command = if config.use_sudo && !running_as_root {
            ToolCommand::new("sudo", timeout)
                .arg("-n")
                .arg(config.arp_scan_path.as_str())
                .args(args)
        } else {
            ToolCommand::new(&config.arp_scan_path, timeout).args(args)
        };

        Self { command }
    }

    pub fn command(&self) -> &ToolCommand {
        &self.command
    }
}

#[async_trait]
impl ScanStrategy for ArpScanStrategy {
    fn tool(&self) -> ScanTool {
        ScanTool::ArpScan
    }

    async fn scan(&self) -> Result<Vec<DiscoveredDevice>, ScanFailure> {
        let stdout = self.command.run().await?;
        let devices = parse_arp_scan_output(&stdout, Utc::now());
        tracing::info!(devices = devices.len(), "arp-scan finished");
        Ok(devices)
    }
}

/// Parse `IP<TAB>MAC<TAB>Vendor` lines; banner and summary lines are skipped.
pub fn parse_arp_scan_output(stdout: &str, now: DateTime<Utc>) -> Vec<DiscoveredDevice> {
    stdout
        .lines()
        .filter(|line| !line.is_empty() && !line.contains("arp-scan") && !line.contains("packets"))
        .filter_map(|line| parse_line(line, now))
        .collect()
}

fn parse_line(line: &str, now: DateTime<Utc>) -> Option<DiscoveredDevice> {
    let mut fields = line.split('\t');
    let ip = fields.next()?.trim();
    let raw_mac = fields.next()?.trim();

    if !looks_like_mac(raw_mac) {
        return None;
    }
    let mac = NormalizedMac::parse(raw_mac).ok()?;

    let vendor = fields
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from);

    Some(DiscoveredDevice {
        ip: ip.to_string(),
        mac,
        observed_at: now,
        source_tool: ScanTool::ArpScan,
        vendor,
        hostname: None,
    })
}
