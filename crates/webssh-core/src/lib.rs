//! webssh-core: settings, connection config and the SSH session adapter
//!
//! Everything the terminal bridge needs from outside the WebSocket:
//! where to connect, how to trust the host, and a small capability
//! interface over the SSH client library.

pub mod config;
pub mod connection;
pub mod error;
pub mod ssh;

pub use config::{OutputMode, ServerSettings, Settings, SshSettings, TerminalSettings};
pub use connection::{ConfigStore, ConnectionConfig, JsonConfigStore, Password, DEFAULT_SSH_PORT};
pub use error::{Error, Result};
pub use ssh::{
    HostKeyPolicy, PtySize, ReadOutcome, RusshConnector, ShellChannel, SshConnector, SshSession,
};
