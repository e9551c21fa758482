//! Browser-side transport
//!
//! The bridge talks to the browser through [`ClientSocket`] so the pump loop
//! does not depend on axum directly.

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use tracing::debug;

use crate::{Result, WsError};

/// Outgoing WebSocket frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Result of a bounded-wait receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text payload (binary frames holding valid UTF-8 are accepted too)
    Text(String),
    /// Nothing arrived within the wait, or a control frame was consumed
    Idle,
    /// The browser closed the connection
    Closed,
}

/// Message-framed connection to the browser
#[async_trait]
pub trait ClientSocket: Send {
    async fn send_frame(&mut self, frame: Frame) -> Result<()>;

    /// Wait at most `wait` for one message. A zero wait still returns a
    /// message that is already available.
    async fn recv_timeout(&mut self, wait: Duration) -> Result<Inbound>;

    /// Best-effort close handshake
    async fn close(&mut self);
}

#[async_trait]
impl ClientSocket for WebSocket {
    async fn send_frame(&mut self, frame: Frame) -> Result<()> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes.into()),
        };
        self.send(message)
            .await
            .map_err(|e| WsError::WebSocket(e.to_string()))
    }

    async fn recv_timeout(&mut self, wait: Duration) -> Result<Inbound> {
        let received = match tokio::time::timeout(wait, self.recv()).await {
            Err(_) => return Ok(Inbound::Idle),
            Ok(received) => received,
        };

        match received {
            None => Ok(Inbound::Closed),
            Some(Err(e)) => Err(WsError::WebSocket(e.to_string())),
            Some(Ok(Message::Text(text))) => Ok(Inbound::Text(text.as_str().to_owned())),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => Ok(Inbound::Text(text)),
                Err(_) => {
                    debug!("Ignoring non UTF-8 binary frame ({} bytes)", bytes.len());
                    Ok(Inbound::Idle)
                }
            },
            Some(Ok(Message::Close(frame))) => {
                debug!("Close frame from client: {:?}", frame);
                Ok(Inbound::Closed)
            }
            // Pings are answered by the websocket layer itself.
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => Ok(Inbound::Idle),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.send(Message::Close(None)).await {
            debug!("Close handshake skipped: {}", e);
        }
    }
}
