//! Error types for parley-channels

use thiserror::Error;

/// Channel error type
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid connector configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Slack API returned an error
    #[error("slack error: {0}")]
    Slack(String),

    /// Payload parsing error
    #[error("payload parsing error: {0}")]
    Parse(String),

    /// Request signature rejected
    #[error("signature verification failed: {0}")]
    Signature(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
