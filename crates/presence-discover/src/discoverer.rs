//! Device discovery: ordered strategy fallback plus a short-lived cache.
//!
//! Strategies are tried in order and the first non-empty result wins. The
//! cache lock is held across the whole scan so concurrent callers on a miss
//! wait for one scan instead of each spawning their own.

use std::time::Duration;

use chrono::{DateTime, Utc};
use presence_core::{DiscoveredDevice, ScanTool};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::arp_scan::ArpScanStrategy;
use crate::arp_table::ArpTableStrategy;
use crate::config::PresenceConfig;
use crate::netdetect::{self, NetworkParams};
use crate::nmap::NmapStrategy;
use crate::scanner::ScanStrategy;

/// Outcome of one pass through the strategy chain.
#[derive(Debug, Clone)]
pub struct DeviceScan {
    pub scan_id: Uuid,
    pub scanned_at: DateTime<Utc>,
    /// Strategy that produced `devices`; `None` if all came up empty.
    pub tool: Option<ScanTool>,
    pub devices: Vec<DiscoveredDevice>,
}

struct CachedScan {
    scan: DeviceScan,
    taken_at: Instant,
}

pub struct Discoverer {
    strategies: Vec<Box<dyn ScanStrategy>>,
    cache_ttl: Duration,
    cache: Mutex<Option<CachedScan>>,
}

impl Discoverer {
    pub fn new(strategies: Vec<Box<dyn ScanStrategy>>, cache_ttl: Duration) -> Self {
        Self {
            strategies,
            cache_ttl,
            cache: Mutex::new(None),
        }
    }

    /// Build the configured strategy chain, detecting network parameters first.
    pub async fn from_config(config: &PresenceConfig) -> Self {
        let params = netdetect::detect_network(config).await;
        Self::with_network(config, &params)
    }

    pub fn with_network(config: &PresenceConfig, params: &NetworkParams) -> Self {
        let strategies = config
            .strategies
            .iter()
            .map(|tool| -> Box<dyn ScanStrategy> {
                match tool {
                    ScanTool::ArpScan => Box::new(ArpScanStrategy::new(config, &params.interface)),
                    ScanTool::Nmap => Box::new(NmapStrategy::new(config, params.range)),
                    ScanTool::ArpTable => Box::new(ArpTableStrategy::new(config)),
                }
            })
            .collect();

        tracing::info!(
            interface = %params.interface,
            range = %params.range,
            strategies = ?config.strategies,
            "Discoverer initialized"
        );

        Self::new(strategies, config.cache_ttl())
    }

    /// Devices currently on the network, served from cache when fresh.
    pub async fn discover(&self) -> Vec<DiscoveredDevice> {
        self.scan(true).await.devices
    }

    /// Full scan record. `use_cache = false` forces a rescan.
    ///
    /// Empty results are stored but never served from cache.
    pub async fn scan(&self, use_cache: bool) -> DeviceScan {
        let mut cache = self.cache.lock().await;

        if use_cache {
            if let Some(cached) = cache.as_ref() {
                let age = cached.taken_at.elapsed();
                if age < self.cache_ttl && !cached.scan.devices.is_empty() {
                    tracing::debug!(
                        devices = cached.scan.devices.len(),
                        age_secs = age.as_secs(),
                        "Using cached device list"
                    );
                    return cached.scan.clone();
                }
            }
        }

        let scan = self.run_strategies().await;
        *cache = Some(CachedScan {
            scan: scan.clone(),
            taken_at: Instant::now(),
        });
        scan
    }

    /// Time of the most recent scan, cached or not.
    pub async fn last_scan_time(&self) -> Option<DateTime<Utc>> {
        self.cache.lock().await.as_ref().map(|c| c.scan.scanned_at)
    }

    async fn run_strategies(&self) -> DeviceScan {
        let scan_id = Uuid::new_v4();
        let start = Instant::now();

        for strategy in &self.strategies {
            let tool = strategy.tool();
            match strategy.scan().await {
                Ok(devices) if !devices.is_empty() => {
                    tracing::info!(
                        scan_id = %scan_id,
                        tool = %tool,
                        devices = devices.len(),
                        duration_ms = start.elapsed().as_millis(),
                        "Device scan complete"
                    );
                    return DeviceScan {
                        scan_id,
                        scanned_at: Utc::now(),
                        tool: Some(tool),
                        devices,
                    };
                }
                Ok(_) => {
                    tracing::debug!(scan_id = %scan_id, tool = %tool, "Strategy found no devices");
                }
                Err(e) => {
                    tracing::warn!(scan_id = %scan_id, tool = %tool, error = %e, "Strategy failed");
                }
            }
        }

        tracing::warn!(scan_id = %scan_id, "No devices found by any strategy");
        DeviceScan {
            scan_id,
            scanned_at: Utc::now(),
            tool: None,
            devices: Vec::new(),
        }
    }
}
