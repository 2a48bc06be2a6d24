//! Background presence tracking.
//!
//! Spawns one tokio task that re-runs the presence check, waiting the scan
//! interval after each check finishes, keeps the latest result, and
//! publishes arrival/departure events on a broadcast channel.

use std::sync::Arc;

use presence_core::events::{EventPayload, PresenceEvent};
use presence_core::PresenceResult;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::diff;
use crate::monitor::PresenceMonitor;

const EVENT_CAPACITY: usize = 64;
const STOP_GRACE: Duration = Duration::from_secs(5);

struct Running {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// State shared between the tracker handle and its background task.
struct Inner {
    monitor: Arc<PresenceMonitor>,
    current: RwLock<Option<PresenceResult>>,
    events: broadcast::Sender<PresenceEvent>,
}

impl Inner {
    async fn run_cycle(&self, use_cache: bool) -> PresenceResult {
        let check = self.monitor.check(use_cache).await;

        // Hold the write lock while diffing so a forced scan and a
        // scheduled one can't interleave their change events.
        let mut current = self.current.write().await;
        let mut payloads = match current.as_ref() {
            Some(previous) => {
                let changes = diff::compute_changes(previous, &check.result);
                for name in &changes.arrived {
                    tracing::info!(name = %name, "Arrived");
                }
                for name in &changes.departed {
                    tracing::info!(name = %name, "Departed");
                }
                changes.into_events()
            }
            None => Vec::new(),
        };

        payloads.push(EventPayload::ScanCompleted {
            scan_id: check.scan.scan_id,
            tool: check.scan.tool,
            device_count: check.scan.devices.len(),
            present_count: check.result.present.len(),
            absent_count: check.result.absent.len(),
        });

        for payload in payloads {
            // No subscribers is fine.
            let _ = self.events.send(PresenceEvent::new(payload));
        }

        *current = Some(check.result.clone());
        check.result
    }
}

pub struct PresenceTracker {
    inner: Arc<Inner>,
    scan_interval: Duration,
    running: Mutex<Option<Running>>,
}

impl PresenceTracker {
    pub fn new(monitor: Arc<PresenceMonitor>, scan_interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        tracing::info!(interval_secs = scan_interval.as_secs(), "Presence tracker created");

        Self {
            inner: Arc::new(Inner {
                monitor,
                current: RwLock::new(None),
                events,
            }),
            scan_interval: scan_interval.max(Duration::from_secs(1)),
            running: Mutex::new(None),
        }
    }

    /// Start background scanning. A second call while running is a no-op.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::warn!("Tracker already running");
            return;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let inner = self.inner.clone();
        let period = self.scan_interval;
        let handle = tokio::spawn(async move {
            run_loop(inner, period, shutdown_rx).await;
        });

        *running = Some(Running { handle, shutdown });
        tracing::info!("Background presence tracking started");
    }

    /// Latest result; empty until the first check completes.
    pub async fn current(&self) -> PresenceResult {
        self.inner.current.read().await.clone().unwrap_or_default()
    }

    /// Rescan now, bypassing the device cache.
    pub async fn force_scan(&self) -> PresenceResult {
        self.inner.run_cycle(false).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> {
        self.inner.events.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Stop background scanning, waiting briefly for an in-flight check.
    pub async fn stop(&self) {
        let Some(Running {
            mut handle,
            shutdown,
        }) = self.running.lock().await.take()
        else {
            return;
        };

        let _ = shutdown.send(true);
        match tokio::time::timeout(STOP_GRACE, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Tracker task panicked"),
            Err(_) => {
                tracing::warn!("Tracker did not stop in time, aborting");
                handle.abort();
            }
        }
        tracing::info!("Presence tracker stopped");
    }
}

/// Waits `period` after each check finishes. Scheduled checks bypass the
/// device cache, so every one is a fresh scan.
async fn run_loop(inner: Arc<Inner>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    loop {
        inner.run_cycle(false).await;

        tokio::select! {
            _ = sleep(period) => {}
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use presence_core::{DiscoveredDevice, NormalizedMac, ScanTool};

    use super::*;
    use crate::discoverer::Discoverer;
    use crate::error::ScanFailure;
    use crate::roster::roster_from_pairs;
    use crate::scanner::ScanStrategy;

    /// Strategy whose visible MACs can be changed between scans.
    struct SwitchableStrategy(Arc<StdMutex<Vec<&'static str>>>);

    #[async_trait]
    impl ScanStrategy for SwitchableStrategy {
        fn tool(&self) -> ScanTool {
            ScanTool::ArpScan
        }

        async fn scan(&self) -> Result<Vec<DiscoveredDevice>, ScanFailure> {
            let macs = self.0.lock().unwrap().clone();
            Ok(macs
                .into_iter()
                .map(|m| DiscoveredDevice::new("10.0.0.9", NormalizedMac::parse(m).unwrap(), self.tool()))
                .collect())
        }
    }

    fn tracker(visible: Arc<StdMutex<Vec<&'static str>>>) -> PresenceTracker {
        let roster = roster_from_pairs([("Alice", "AA:BB:CC:DD:EE:FF"), ("Bob", "11:22:33:44:55:66")]);
        let discoverer = Discoverer::new(
            vec![Box::new(SwitchableStrategy(visible))],
            Duration::from_secs(300),
        );
        let monitor = Arc::new(PresenceMonitor::new(roster, discoverer));
        PresenceTracker::new(monitor, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_force_scan_emits_changes() {
        let visible = Arc::new(StdMutex::new(vec!["aa:bb:cc:dd:ee:ff"]));
        let tracker = tracker(visible.clone());
        let mut events = tracker.subscribe();

        let first = tracker.force_scan().await;
        assert_eq!(first.present, vec!["Alice"]);
        // Baseline: only the scan summary.
        assert!(matches!(
            events.recv().await.unwrap().payload,
            EventPayload::ScanCompleted { present_count: 1, .. }
        ));

        *visible.lock().unwrap() = vec!["11:22:33:44:55:66"];
        let second = tracker.force_scan().await;
        assert_eq!(second.present, vec!["Bob"]);
        assert_eq!(tracker.current().await, second);

        assert_eq!(
            events.recv().await.unwrap().payload,
            EventPayload::MemberArrived {
                name: "Bob".to_string()
            }
        );
        assert_eq!(
            events.recv().await.unwrap().payload,
            EventPayload::MemberDeparted {
                name: "Alice".to_string()
            }
        );
        assert!(matches!(
            events.recv().await.unwrap().payload,
            EventPayload::ScanCompleted { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_loop_runs_and_stops() {
        let visible = Arc::new(StdMutex::new(vec!["aa:bb:cc:dd:ee:ff"]));
        let tracker = tracker(visible);
        let mut events = tracker.subscribe();

        assert_eq!(tracker.current().await, PresenceResult::default());

        tracker.start().await;
        tracker.start().await;
        assert!(tracker.is_running().await);

        // First check runs immediately.
        let event = events.recv().await.unwrap();
        assert!(matches!(event.payload, EventPayload::ScanCompleted { .. }));
        assert_eq!(tracker.current().await.present, vec!["Alice"]);

        // Next one after the interval.
        let event = events.recv().await.unwrap();
        assert!(matches!(event.payload, EventPayload::ScanCompleted { .. }));

        tracker.stop().await;
        assert!(!tracker.is_running().await);
        tracker.stop().await;
    }

    /// Strategy that takes a while to answer and counts its scans.
    struct SlowStrategy {
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ScanStrategy for SlowStrategy {
        fn tool(&self) -> ScanTool {
            ScanTool::Nmap
        }

        async fn scan(&self) -> Result<Vec<DiscoveredDevice>, ScanFailure> {
            tokio::time::sleep(self.delay).await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![DiscoveredDevice::new(
                "10.0.0.9",
                NormalizedMac::parse("aa:bb:cc:dd:ee:ff").unwrap(),
                self.tool(),
            )])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_scheduled_check_rescans_when_ttl_equals_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategy = SlowStrategy {
            delay: Duration::from_secs(3),
            calls: calls.clone(),
        };
        let roster = roster_from_pairs([("Alice", "AA:BB:CC:DD:EE:FF")]);
        let discoverer = Discoverer::new(vec![Box::new(strategy)], Duration::from_secs(300));
        let monitor = Arc::new(PresenceMonitor::new(roster, discoverer));
        let tracker = PresenceTracker::new(monitor, Duration::from_secs(300));
        let mut events = tracker.subscribe();

        tracker.start().await;

        let mut scan_ids = Vec::new();
        while scan_ids.len() < 4 {
            if let EventPayload::ScanCompleted { scan_id, .. } = events.recv().await.unwrap().payload {
                scan_ids.push(scan_id);
            }
        }
        tracker.stop().await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let unique: HashSet<_> = scan_ids.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[tokio::test]
    async fn test_scan_completed_reports_counts() {
        let visible = Arc::new(StdMutex::new(vec!["aa:bb:cc:dd:ee:ff", "01:02:03:04:05:06"]));
        let tracker = tracker(visible);
        let mut events = tracker.subscribe();

        tracker.force_scan().await;

        assert!(matches!(
            events.recv().await.unwrap().payload,
            EventPayload::ScanCompleted {
                tool: Some(ScanTool::ArpScan),
                device_count: 2,
                present_count: 1,
                absent_count: 1,
                ..
            }
        ));
    }
}
