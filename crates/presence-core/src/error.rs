use thiserror::Error;

/// Top-level error type for presence-core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid MAC address {input:?}: expected 12 hex digits, found {digits}")]
    InvalidMac { input: String, digits: usize },
}
