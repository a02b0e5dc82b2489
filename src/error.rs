//! Error types for the voice bridge

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside the voice taxonomy
///
/// Controller failures never surface as `Error`; they are reported to the
/// content surface as [`ErrorKind`](crate::voice::ErrorKind) invocations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Voice processing error
    #[error("voice error: {0}")]
    Voice(String),

    /// Dispatcher is gone (shut down or every handle dropped)
    #[error("bridge closed")]
    BridgeClosed,

    /// Content surface rejected an invocation
    #[error("surface error: {0}")]
    Surface(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
