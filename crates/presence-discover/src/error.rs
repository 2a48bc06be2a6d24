//! Error types for the presence-discover crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Roster file not found: {path}")]
    RosterNotFound { path: String },

    #[error("Roster must be a JSON object of name -> MAC, got {found}")]
    RosterShape { found: &'static str },

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiscoverError>;

/// Why a single scan strategy produced no devices.
///
/// Never fatal: the discoverer logs it and moves on to the next strategy.
#[derive(Error, Debug)]
pub enum ScanFailure {
    #[error("{program:?} could not be started: {source}")]
    ToolNotFound {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program:?} exited with code {code}: {stderr}")]
    ToolFailed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("{program:?} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        program: String,
        timeout: std::time::Duration,
    },
}
