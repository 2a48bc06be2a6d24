//! Change detection between successive presence results.

use std::collections::HashSet;

use presence_core::events::EventPayload;
use presence_core::PresenceResult;

/// Who arrived and who left since the previous check.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PresenceChanges {
    pub arrived: Vec<String>,
    pub departed: Vec<String>,
}

impl PresenceChanges {
    pub fn is_empty(&self) -> bool {
        self.arrived.is_empty() && self.departed.is_empty()
    }

    /// One event per arrival, then one per departure.
    pub fn into_events(self) -> Vec<EventPayload> {
        self.arrived
            .into_iter()
            .map(|name| EventPayload::MemberArrived { name })
            .chain(
                self.departed
                    .into_iter()
                    .map(|name| EventPayload::MemberDeparted { name }),
            )
            .collect()
    }
}

/// Compare two results. Names keep the order they have in `current`
/// (arrivals) or `previous` (departures).
///
/// A name that dropped out of the roster entirely is not a departure.
pub fn compute_changes(previous: &PresenceResult, current: &PresenceResult) -> PresenceChanges {
    let was_present: HashSet<&str> = previous.present.iter().map(String::as_str).collect();
    let now_absent: HashSet<&str> = current.absent.iter().map(String::as_str).collect();

    let arrived = current
        .present
        .iter()
        .filter(|name| !was_present.contains(name.as_str()))
        .cloned()
        .collect();

    let departed = previous
        .present
        .iter()
        .filter(|name| now_absent.contains(name.as_str()))
        .cloned()
        .collect();

    PresenceChanges { arrived, departed }
}
