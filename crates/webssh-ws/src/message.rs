//! WebSocket message types
//!
//! Defines the JSON control messages exchanged with the terminal page.
//! Terminal output itself is not wrapped in JSON; it is sent as raw frames.

use serde::{Deserialize, Serialize};
use webssh_core::PtySize;

use crate::{Result, WsError};

/// Message from the browser to the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keystrokes to write to the shell verbatim
    Input { data: String },

    /// Viewport size changed; absent fields default to 80x24
    Resize {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cols: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rows: Option<u32>,
    },

    /// Any other `type`; ignored
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Decode one text frame
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| WsError::Protocol(e.to_string()))
    }
}

/// Requested size of a resize message, with defaults applied
pub fn resize_size(cols: Option<u32>, rows: Option<u32>) -> PtySize {
    let default = PtySize::default();
    PtySize::new(cols.unwrap_or(default.cols), rows.unwrap_or(default.rows))
}

/// Status message from the bridge to the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Progress of the connection
    Status { data: String },

    /// A failure the user should see
    Error { data: String },
}

impl ServerMessage {
    pub fn status(data: impl Into<String>) -> Self {
        Self::Status { data: data.into() }
    }

    pub fn error(data: impl Into<String>) -> Self {
        Self::Error { data: data.into() }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
