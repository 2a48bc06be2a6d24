//! Presence matching: roster × discovered devices → present/absent.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use presence_core::{
    DetailedPresence, DiscoveredDevice, NormalizedMac, PresenceResult, PresentMember, Roster,
};

/// Split roster names into present and absent, keeping roster order.
///
/// No devices means everyone is absent; there is no "unknown" state.
pub fn match_roster(roster: &Roster, devices: &[DiscoveredDevice]) -> PresenceResult {
    let observed: HashSet<&NormalizedMac> = devices.iter().map(|d| &d.mac).collect();

    let (present, absent) = roster
        .iter()
        .partition::<Vec<_>, _>(|entry| observed.contains(&entry.mac));

    PresenceResult {
        present: present.into_iter().map(|e| e.name.clone()).collect(),
        absent: absent.into_iter().map(|e| e.name.clone()).collect(),
    }
}

/// Like [`match_roster`], with the matching device's IP and timestamp for
/// each present member.
pub fn detailed_presence(
    roster: &Roster,
    devices: &[DiscoveredDevice],
    last_scan: Option<DateTime<Utc>>,
) -> DetailedPresence {
    // First sighting wins if a tool reports the same MAC twice.
    let mut by_mac: HashMap<&NormalizedMac, &DiscoveredDevice> = HashMap::new();
    for device in devices {
        by_mac.entry(&device.mac).or_insert(device);
    }

    let mut present = Vec::new();
    let mut absent = Vec::new();

    for entry in roster.iter() {
        match by_mac.get(&entry.mac) {
            Some(device) => present.push(PresentMember {
                name: entry.name.clone(),
                mac: entry.mac.clone(),
                ip: device.ip.clone(),
                last_seen: device.observed_at,
            }),
            None => absent.push(entry.name.clone()),
        }
    }

    DetailedPresence {
        present,
        absent,
        total_devices: devices.len(),
        last_scan,
    }
}
