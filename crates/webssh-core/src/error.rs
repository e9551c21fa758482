//! Error types for webssh-core

use thiserror::Error;

/// Main error type for webssh-core
#[derive(Error, Debug)]
pub enum Error {
    /// Required settings or connection fields are missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The server rejected every credential we offered.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Network, timeout or host key failure while establishing the session.
    #[error("{0}")]
    Connect(String),

    /// Failure on an already established session or shell channel.
    #[error("SSH channel error: {0}")]
    Channel(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for webssh-core
pub type Result<T> = std::result::Result<T, Error>;
