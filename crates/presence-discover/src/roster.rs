//! Roster loading.
//!
//! The roster file is a JSON object mapping a person's name to the MAC
//! address of their device. Key order in the file is the order presence
//! results are reported in.

use std::path::Path;

use presence_core::{NormalizedMac, Roster};
use serde_json::Value;

use crate::error::{DiscoverError, Result};

/// Load the roster from `path`.
///
/// Never fails: a missing or unreadable file yields an empty roster and a
/// log line. Entries with an invalid MAC are dropped with a warning.
pub fn load_roster(path: &Path) -> Roster {
    match read_roster_file(path) {
        Ok(roster) => {
            tracing::info!(path = %path.display(), members = roster.len(), "Loaded roster");
            roster
        }
        Err(DiscoverError::RosterNotFound { path }) => {
            tracing::warn!(path = %path, "Roster file not found");
            Roster::new()
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to load roster");
            Roster::new()
        }
    }
}

fn read_roster_file(path: &Path) -> Result<Roster> {
    if !path.exists() {
        return Err(DiscoverError::RosterNotFound {
            path: path.display().to_string(),
        });
    }

    let contents = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&contents)?;

    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(DiscoverError::RosterShape {
                found: json_kind(&other),
            })
        }
    };

    let pairs = map.into_iter().filter_map(|(name, raw)| match raw {
        Value::String(mac) => Some((name, mac)),
        other => {
            tracing::warn!(name = %name, value = %other, "Roster MAC is not a string, skipping");
            None
        }
    });

    Ok(roster_from_pairs(pairs))
}

/// Build a roster from already-parsed `name -> raw MAC` pairs.
pub fn roster_from_pairs<I, K, V>(pairs: I) -> Roster
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: AsRef<str>,
{
    let mut roster = Roster::new();

    for (name, raw_mac) in pairs {
        let name = name.into();
        match NormalizedMac::parse(raw_mac.as_ref()) {
            Ok(mac) => roster.insert(name, mac),
            Err(e) => tracing::warn!(name = %name, error = %e, "Invalid MAC in roster, skipping"),
        }
    }

    roster
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
