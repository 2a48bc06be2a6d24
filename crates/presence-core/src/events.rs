//! Presence-change events.
//!
//! The tracker publishes these on a broadcast channel whenever a roster
//! member arrives or leaves, and after every completed scan cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ScanTool;

/// Unique identifier for an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// An event emitted by the presence tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl PresenceEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// The event payload, tagged by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    /// A roster member's device appeared on the network.
    MemberArrived { name: String },
    /// A roster member's device is no longer seen.
    MemberDeparted { name: String },
    /// A presence check finished.
    ScanCompleted {
        scan_id: Uuid,
        /// Strategy that produced the devices; `None` when every strategy came up empty.
        tool: Option<ScanTool>,
        device_count: usize,
        present_count: usize,
        absent_count: usize,
    },
}
