//! presence-core: Shared types and error handling for the office presence scanner.
//!
//! This crate provides the foundational types used by the scanner:
//! - MAC address normalization (`NormalizedMac`)
//! - The roster of known people and their devices
//! - Devices observed on the local network and the tool that saw them
//! - Presence results and presence-change events

pub mod error;
pub mod events;
pub mod types;

pub use error::CoreError;
pub use types::{
    DetailedPresence, DiscoveredDevice, NormalizedMac, PresenceResult, PresentMember, Roster,
    RosterEntry, ScanTool,
};
