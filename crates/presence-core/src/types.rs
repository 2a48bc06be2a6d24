//! Core domain types for presence detection.
//!
//! A roster maps people to the MAC address of a device they carry. A scan
//! produces `DiscoveredDevice`s, and matching the two yields a
//! `PresenceResult`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ── MAC addresses ─────────────────────────────────────────────────

/// A 6-octet link-layer address in canonical `AA:BB:CC:DD:EE:FF` form.
///
/// Every constructed value holds exactly 12 uppercase hex digits, so two
/// addresses compare equal regardless of how the source formatted them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NormalizedMac(String);

impl NormalizedMac {
    /// Strip every non-hex character, uppercase, and re-insert colons.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let hex: Vec<char> = raw
            .chars()
            .filter(char::is_ascii_hexdigit)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if hex.len() != 12 {
            return Err(CoreError::InvalidMac {
                input: raw.to_string(),
                digits: hex.len(),
            });
        }

        let formatted = hex
            .chunks(2)
            .map(|pair| pair.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join(":");

        Ok(Self(formatted))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for NormalizedMac {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NormalizedMac {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NormalizedMac> for String {
    fn from(mac: NormalizedMac) -> Self {
        mac.0
    }
}

impl fmt::Display for NormalizedMac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Roster ────────────────────────────────────────────────────────

/// A known person and the MAC address of their device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub mac: NormalizedMac,
}

/// The configured set of people, in insertion order, keyed by unique name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. A repeated name replaces the earlier MAC but keeps
    /// the earlier position.
    pub fn insert(&mut self, name: impl Into<String>, mac: NormalizedMac) {
        let name = name.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.mac = mac,
            None => self.entries.push(RosterEntry { name, mac }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&NormalizedMac> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.mac)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, NormalizedMac)> for Roster {
    fn from_iter<T: IntoIterator<Item = (String, NormalizedMac)>>(iter: T) -> Self {
        let mut roster = Roster::new();
        for (name, mac) in iter {
            roster.insert(name, mac);
        }
        roster
    }
}

// ── Discovery ─────────────────────────────────────────────────────

/// The external tool that observed a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanTool {
    /// Active link-layer probe (`arp-scan`).
    ArpScan,
    /// ICMP ping sweep with MAC resolution (`nmap -sn`).
    Nmap,
    /// Passive read of the kernel neighbor cache (`arp -a`).
    ArpTable,
}

impl ScanTool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArpScan => "arp_scan",
            Self::Nmap => "nmap",
            Self::ArpTable => "arp_table",
        }
    }
}

impl fmt::Display for ScanTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device seen on the local network during one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub ip: String,
    pub mac: NormalizedMac,
    pub observed_at: DateTime<Utc>,
    pub source_tool: ScanTool,
    pub vendor: Option<String>,
    pub hostname: Option<String>,
}

impl DiscoveredDevice {
    pub fn new(ip: impl Into<String>, mac: NormalizedMac, source_tool: ScanTool) -> Self {
        Self {
            ip: ip.into(),
            mac,
            observed_at: Utc::now(),
            source_tool,
            vendor: None,
            hostname: None,
        }
    }
}

// ── Presence ──────────────────────────────────────────────────────

/// Roster names split into present and absent, both in roster order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceResult {
    pub present: Vec<String>,
    pub absent: Vec<String>,
}

/// A present roster member with the device that gave them away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentMember {
    pub name: String,
    pub mac: NormalizedMac,
    pub ip: String,
    pub last_seen: DateTime<Utc>,
}

/// Presence with per-member device details and scan metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedPresence {
    pub present: Vec<PresentMember>,
    pub absent: Vec<String>,
    pub total_devices: usize,
    pub last_scan: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(s: &str) -> NormalizedMac {
        NormalizedMac::parse(s).unwrap()
    }

    #[test]
    fn normalizes_separators_and_case() {
        for raw in [
            "aa:bb:cc:dd:ee:ff",
            "AA-BB-CC-DD-EE-FF",
            "aabb.ccdd.eeff",
            "aabbccddeeff",
            " Aa:bB:cc:DD:ee:Ff ",
        ] {
            assert_eq!(mac(raw).as_str(), "AA:BB:CC:DD:EE:FF", "input {raw:?}");
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["01-23-45-67-89-ab", "0123.4567.89AB", "01:23:45:67:89:ab"] {
            let once = mac(raw);
            let twice = mac(once.as_str());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn rejects_wrong_digit_count() {
        for raw in ["", "not-a-mac", "aa:bb:cc:dd:ee", "aa:bb:cc:dd:ee:ff:00", "zz:zz:zz:zz:zz:zz"] {
            assert!(NormalizedMac::parse(raw).is_err(), "input {raw:?}");
        }

        let err = NormalizedMac::parse("aa:bb:cc").unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidMac {
                input: "aa:bb:cc".to_string(),
                digits: 6
            }
        );
    }

    #[test]
    fn mac_serializes_as_plain_string() {
        let json = serde_json::to_string(&mac("aa-bb-cc-dd-ee-ff")).unwrap();
        assert_eq!(json, "\"AA:BB:CC:DD:EE:FF\"");

        let back: NormalizedMac = serde_json::from_str("\"aa-bb-cc-dd-ee-ff\"").unwrap();
        assert_eq!(back.as_str(), "AA:BB:CC:DD:EE:FF");

        assert!(serde_json::from_str::<NormalizedMac>("\"nope\"").is_err());
    }

    #[test]
    fn roster_last_write_wins_in_place() {
        let mut roster = Roster::new();
        roster.insert("Alice", mac("AA:BB:CC:DD:EE:FF"));
        roster.insert("Bob", mac("11:22:33:44:55:66"));
        roster.insert("Alice", mac("00:00:00:00:00:01"));

        assert_eq!(roster.len(), 2);
        assert_eq!(roster.names(), vec!["Alice", "Bob"]);
        assert_eq!(roster.get("Alice").unwrap().as_str(), "00:00:00:00:00:01");
    }

    #[test]
    fn scan_tool_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&ScanTool::ArpScan).unwrap(), "\"arp_scan\"");
        assert_eq!(serde_json::to_string(&ScanTool::ArpTable).unwrap(), "\"arp_table\"");
        assert_eq!(ScanTool::Nmap.to_string(), "nmap");
    }

    #[test]
    fn presence_result_json_shape() {
        let result = PresenceResult {
            present: vec!["Alice".to_string()],
            absent: vec!["Bob".to_string()],
        };
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"present":["Alice"],"absent":["Bob"]}"#);
    }
}
