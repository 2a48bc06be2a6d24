//! Configuration for the presence scanner.

use std::path::Path;
use std::time::Duration;

use ipnet::Ipv4Net;
use presence_core::ScanTool;
use serde::Deserialize;

use crate::error::{DiscoverError, Result};

/// Top-level presence configuration.
///
/// Loaded from `presence.toml` `[presence]` section or
/// `PRESENCE__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    /// JSON file mapping names to MAC addresses. A relative path is taken
    /// relative to the config file's directory (see `resolve_roster_path`).
    #[serde(default = "default_roster_path")]
    pub roster_path: String,

    /// How long a non-empty scan result is reused before rescanning.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Interval between background presence checks in daemon mode.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Strategies to try, in order.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<ScanTool>,

    #[serde(default = "default_arp_scan_path")]
    pub arp_scan_path: String,

    #[serde(default = "default_nmap_path")]
    pub nmap_path: String,

    #[serde(default = "default_arp_path")]
    pub arp_path: String,

    #[serde(default = "default_ip_path")]
    pub ip_path: String,

    /// Run arp-scan through `sudo -n` (it needs raw sockets). Ignored when
    /// already running as root.
    #[serde(default = "default_true")]
    pub use_sudo: bool,

    /// Passed as `--retry=<n>` to arp-scan.
    #[serde(default = "default_arp_scan_retries")]
    pub arp_scan_retries: u32,

    /// Passed as `--timeout=<ms>` to arp-scan (per-probe wait).
    #[serde(default = "default_arp_scan_probe_timeout")]
    pub arp_scan_probe_timeout_ms: u64,

    #[serde(default = "default_arp_scan_timeout")]
    pub arp_scan_timeout_secs: u64,

    /// Passed as `--max-retries <n>` to nmap.
    #[serde(default = "default_nmap_max_retries")]
    pub nmap_max_retries: u32,

    #[serde(default = "default_nmap_timeout")]
    pub nmap_timeout_secs: u64,

    #[serde(default = "default_arp_table_timeout")]
    pub arp_table_timeout_secs: u64,

    /// Timeout for each `ip` invocation during network detection.
    #[serde(default = "default_detect_timeout")]
    pub detect_timeout_secs: u64,

    /// Interface override; skips default-route detection.
    #[serde(default)]
    pub interface: Option<String>,

    /// CIDR override for the nmap sweep (e.g., "10.0.1.0/24").
    #[serde(default)]
    pub network_range: Option<String>,

    #[serde(default = "default_fallback_interface")]
    pub fallback_interface: String,

    #[serde(default = "default_fallback_range")]
    pub fallback_range: String,
}

impl PresenceConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Anchor a relative `roster_path` at `base`, so the roster is found no
    /// matter which directory the process was started from.
    pub fn resolve_roster_path(&mut self, base: &Path) {
        let path = Path::new(&self.roster_path);
        if path.is_relative() {
            self.roster_path = base.join(path).display().to_string();
        }
    }

    /// Parse `network_range`, if configured.
    pub fn network_range_override(&self) -> Result<Option<Ipv4Net>> {
        self.network_range
            .as_deref()
            .map(|raw| parse_cidr("network_range", raw))
            .transpose()
    }

    /// Parse `fallback_range`, falling back to 192.168.1.0/24 if it is invalid.
    pub fn fallback_network(&self) -> Ipv4Net {
        parse_cidr("fallback_range", &self.fallback_range).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Using built-in fallback range");
            builtin_fallback_range()
        })
    }
}

fn parse_cidr(field: &str, raw: &str) -> Result<Ipv4Net> {
    raw.trim()
        .parse::<Ipv4Net>()
        .map(|net| net.trunc())
        .map_err(|e| DiscoverError::Config(format!("{field} {raw:?} is not an IPv4 CIDR: {e}")))
}

fn builtin_fallback_range() -> Ipv4Net {
    Ipv4Net::new(std::net::Ipv4Addr::new(192, 168, 1, 0), 24).unwrap_or_default()
}

fn default_roster_path() -> String {
    "colleagues.json".to_string()
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_scan_interval() -> u64 {
    300
}

fn default_strategies() -> Vec<ScanTool> {
    vec![ScanTool::ArpScan, ScanTool::Nmap, ScanTool::ArpTable]
}

fn default_arp_scan_path() -> String {
    "arp-scan".to_string()
}

fn default_nmap_path() -> String {
    "nmap".to_string()
}

fn default_arp_path() -> String {
    "arp".to_string()
}

fn default_ip_path() -> String {
    "ip".to_string()
}

fn default_true() -> bool {
    true
}

fn default_arp_scan_retries() -> u32 {
    3
}

fn default_arp_scan_probe_timeout() -> u64 {
    3000
}

fn default_arp_scan_timeout() -> u64 {
    30
}

fn default_nmap_max_retries() -> u32 {
    1
}

fn default_nmap_timeout() -> u64 {
    60
}

fn default_arp_table_timeout() -> u64 {
    10
}

fn default_detect_timeout() -> u64 {
    5
}

fn default_fallback_interface() -> String {
    "wlan0".to_string()
}

fn default_fallback_range() -> String {
    "192.168.1.0/24".to_string()
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            roster_path: default_roster_path(),
            cache_ttl_secs: default_cache_ttl(),
            scan_interval_secs: default_scan_interval(),
            strategies: default_strategies(),
            arp_scan_path: default_arp_scan_path(),
            nmap_path: default_nmap_path(),
            arp_path: default_arp_path(),
            ip_path: default_ip_path(),
            use_sudo: default_true(),
            arp_scan_retries: default_arp_scan_retries(),
            arp_scan_probe_timeout_ms: default_arp_scan_probe_timeout(),
            arp_scan_timeout_secs: default_arp_scan_timeout(),
            nmap_max_retries: default_nmap_max_retries(),
            nmap_timeout_secs: default_nmap_timeout(),
            arp_table_timeout_secs: default_arp_table_timeout(),
            detect_timeout_secs: default_detect_timeout(),
            interface: None,
            network_range: None,
            fallback_interface: default_fallback_interface(),
            fallback_range: default_fallback_range(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PresenceConfig::default();
        assert_eq!(config.roster_path, "colleagues.json");
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(
            config.strategies,
            vec![ScanTool::ArpScan, ScanTool::Nmap, ScanTool::ArpTable]
        );
        assert!(config.use_sudo);
        assert_eq!(config.fallback_network().to_string(), "192.168.1.0/24");
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: PresenceConfig = serde_json::from_value(serde_json::json!({
            "cache_ttl_secs": 60,
            "strategies": ["arp_table"],
            "interface": "eth0"
        }))
        .unwrap();

        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.strategies, vec![ScanTool::ArpTable]);
        assert_eq!(config.interface.as_deref(), Some("eth0"));
        assert_eq!(config.nmap_timeout_secs, 60);
    }

    #[test]
    fn test_network_range_override() {
        let mut config = PresenceConfig::default();
        assert!(config.network_range_override().unwrap().is_none());

        config.network_range = Some("10.0.1.77/24".to_string());
        let net = config.network_range_override().unwrap().unwrap();
        assert_eq!(net.to_string(), "10.0.1.0/24");

        config.network_range = Some("not-a-cidr".to_string());
        assert!(matches!(
            config.network_range_override(),
            Err(DiscoverError::Config(_))
        ));
    }

    #[test]
    fn test_relative_roster_path_resolved_against_base() {
        let mut config = PresenceConfig::default();
        config.resolve_roster_path(Path::new("/etc/presence"));
        assert_eq!(config.roster_path, "/etc/presence/colleagues.json");

        let mut config = PresenceConfig {
            roster_path: "/srv/roster.json".to_string(),
            ..Default::default()
        };
        config.resolve_roster_path(Path::new("/etc/presence"));
        assert_eq!(config.roster_path, "/srv/roster.json");
    }

    #[test]
    fn test_bad_fallback_range_uses_builtin() {
        let config = PresenceConfig {
            fallback_range: "garbage".to_string(),
            ..Default::default()
        };
        assert_eq!(config.fallback_network().to_string(), "192.168.1.0/24");
    }
}
