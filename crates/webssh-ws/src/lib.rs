//! webssh-ws: browser terminal over WebSocket
//!
//! Bridges each WebSocket connection to an interactive SSH shell and serves
//! the terminal and configuration pages. Built with axum.

pub mod error;
pub mod handler;
pub mod message;
pub mod output;
pub mod pages;
pub mod server;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use error::{Result, WsError};
pub use handler::websocket_handler;
pub use message::{ClientMessage, ServerMessage};
pub use server::{router, start_server, WsServerBuilder, WsState};
pub use session::{BridgeOptions, BridgeSession, SessionEnd};
pub use transport::{ClientSocket, Frame, Inbound};
