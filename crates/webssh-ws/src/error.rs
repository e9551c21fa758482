//! Error types for webssh-ws

use thiserror::Error;

/// WebSocket bridge error type
#[derive(Error, Debug)]
pub enum WsError {
    /// Transport failure on the browser side
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inbound message that could not be decoded; never fatal to a session
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Core(#[from] webssh_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for webssh-ws
pub type Result<T> = std::result::Result<T, WsError>;
