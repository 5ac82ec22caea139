//! Error types shared across sitegate crates

use thiserror::Error;

/// Result type alias using the sitegate common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid threshold or missing required option. Fatal at startup.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Invalid colour value: {0}")]
    InvalidColor(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
