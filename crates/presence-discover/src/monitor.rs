//! The presence pipeline: roster + discoverer + matcher.
//!
//! Construct one `PresenceMonitor` at startup and share it (`Arc`) with
//! whoever needs presence answers. Every method always answers; scan and
//! roster failures degrade to smaller results rather than errors.

use std::path::PathBuf;

use presence_core::{DetailedPresence, PresenceResult, Roster};
use tokio::sync::RwLock;

use crate::config::PresenceConfig;
use crate::discoverer::{DeviceScan, Discoverer};
use crate::matcher;
use crate::roster;

/// A presence result together with the scan it was computed from.
#[derive(Debug, Clone)]
pub struct PresenceCheck {
    pub scan: DeviceScan,
    pub result: PresenceResult,
}

pub struct PresenceMonitor {
    roster_path: Option<PathBuf>,
    roster: RwLock<Roster>,
    discoverer: Discoverer,
}

impl PresenceMonitor {
    /// Load the roster and set up discovery from config.
    pub async fn from_config(config: &PresenceConfig) -> Self {
        let roster_path = PathBuf::from(&config.roster_path);
        let roster = roster::load_roster(&roster_path);
        let discoverer = Discoverer::from_config(config).await;

        tracing::info!(members = roster.len(), "Presence monitor initialized");

        Self {
            roster_path: Some(roster_path),
            roster: RwLock::new(roster),
            discoverer,
        }
    }

    /// Use a fixed in-memory roster; `reload_roster` keeps it as is.
    pub fn new(roster: Roster, discoverer: Discoverer) -> Self {
        Self {
            roster_path: None,
            roster: RwLock::new(roster),
            discoverer,
        }
    }

    pub async fn roster(&self) -> Roster {
        self.roster.read().await.clone()
    }

    /// Re-read the roster file. Returns the new member count.
    pub async fn reload_roster(&self) -> usize {
        let Some(path) = &self.roster_path else {
            return self.roster.read().await.len();
        };

        let fresh = roster::load_roster(path);
        let count = fresh.len();
        *self.roster.write().await = fresh;
        count
    }

    /// Who is here, using the cached scan when fresh.
    pub async fn detect_presence(&self) -> PresenceResult {
        self.check(true).await.result
    }

    /// Run a presence check and keep the scan record alongside the result.
    pub async fn check(&self, use_cache: bool) -> PresenceCheck {
        let roster = self.roster().await;
        if roster.is_empty() {
            tracing::warn!("No roster members configured");
        }

        let scan = self.discoverer.scan(use_cache).await;
        if scan.devices.is_empty() {
            tracing::warn!("No devices found on network");
        }

        let result = matcher::match_roster(&roster, &scan.devices);
        tracing::info!(
            present = result.present.len(),
            absent = result.absent.len(),
            "Presence checked"
        );

        PresenceCheck { scan, result }
    }

    /// Presence with device details for each present member.
    pub async fn detailed_presence(&self) -> DetailedPresence {
        let roster = self.roster().await;
        let scan = self.discoverer.scan(true).await;
        matcher::detailed_presence(&roster, &scan.devices, Some(scan.scanned_at))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use presence_core::{DiscoveredDevice, NormalizedMac, ScanTool};

    use super::*;
    use crate::error::ScanFailure;
    use crate::roster::roster_from_pairs;
    use crate::scanner::ScanStrategy;

    struct FixedStrategy(Vec<&'static str>);

    #[async_trait]
    impl ScanStrategy for FixedStrategy {
        fn tool(&self) -> ScanTool {
            ScanTool::ArpTable
        }

        async fn scan(&self) -> Result<Vec<DiscoveredDevice>, ScanFailure> {
            Ok(self
                .0
                .iter()
                .map(|m| {
                    DiscoveredDevice::new("10.0.0.5", NormalizedMac::parse(m).unwrap(), self.tool())
                })
                .collect())
        }
    }

    fn monitor(devices: Vec<&'static str>) -> PresenceMonitor {
        let roster = roster_from_pairs([("Alice", "AA:BB:CC:DD:EE:FF"), ("Bob", "11:22:33:44:55:66")]);
        let discoverer =
            Discoverer::new(vec![Box::new(FixedStrategy(devices))], Duration::from_secs(300));
        PresenceMonitor::new(roster, discoverer)
    }

    #[tokio::test]
    async fn test_detect_presence() {
        let result = monitor(vec!["aa-bb-cc-dd-ee-ff"]).detect_presence().await;
        assert_eq!(result.present, vec!["Alice"]);
        assert_eq!(result.absent, vec!["Bob"]);
    }

    #[tokio::test]
    async fn test_check_carries_scan() {
        let check = monitor(vec!["11:22:33:44:55:66"]).check(false).await;
        assert_eq!(check.scan.tool, Some(ScanTool::ArpTable));
        assert_eq!(check.scan.devices.len(), 1);
        assert_eq!(check.result.present, vec!["Bob"]);
    }

    #[tokio::test]
    async fn test_detailed_presence() {
        let detail = monitor(vec!["aa:bb:cc:dd:ee:ff"]).detailed_presence().await;
        assert_eq!(detail.present.len(), 1);
        assert_eq!(detail.present[0].ip, "10.0.0.5");
        assert_eq!(detail.absent, vec!["Bob"]);
        assert!(detail.last_scan.is_some());
    }

    #[tokio::test]
    async fn test_reload_roster_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colleagues.json");
        std::fs::write(&path, r#"{"Alice": "AA:BB:CC:DD:EE:FF"}"#).unwrap();

        let config = PresenceConfig {
            roster_path: path.display().to_string(),
            strategies: vec![],
            interface: Some("eth0".to_string()),
            network_range: Some("10.0.0.0/24".to_string()),
            ..Default::default()
        };
        let monitor = PresenceMonitor::from_config(&config).await;
        assert_eq!(monitor.roster().await.names(), vec!["Alice"]);

        std::fs::write(
            &path,
            r#"{"Alice": "AA:BB:CC:DD:EE:FF", "Bob": "11:22:33:44:55:66"}"#,
        )
        .unwrap();
        assert_eq!(monitor.reload_roster().await, 2);

        // No strategies configured: everyone is absent.
        let result = monitor.detect_presence().await;
        assert_eq!(result.absent, vec!["Alice", "Bob"]);
    }
}
