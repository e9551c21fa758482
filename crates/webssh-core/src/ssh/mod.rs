//! SSH session adapter
//!
//! A narrow capability interface over the SSH client library. The bridge only
//! talks to these traits, so tests can drive it with scripted fakes and the
//! `russh` implementation lives in [`client`].

mod client;
mod host_key;

use async_trait::async_trait;

use crate::connection::ConnectionConfig;
use crate::Result;

pub use client::{RusshChannel, RusshConnector, RusshSession};
pub use host_key::HostKeyPolicy;

/// Terminal size in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtySize {
    pub cols: u32,
    pub rows: u32,
}

impl PtySize {
    pub fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }
}

impl Default for PtySize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Result of a non-blocking read from a shell channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes produced by the remote shell (never empty)
    Data(Vec<u8>),
    /// Nothing available right now
    NoData,
    /// The remote side ended the stream
    Eof,
}

/// Establishes authenticated SSH sessions
#[async_trait]
pub trait SshConnector: Send + Sync {
    /// Connect and authenticate.
    ///
    /// Fails with [`crate::Error::Authentication`] when credentials are
    /// rejected and [`crate::Error::Connect`] for every other failure.
    async fn connect(
        &self,
        target: &ConnectionConfig,
        policy: &HostKeyPolicy,
    ) -> Result<Box<dyn SshSession>>;
}

/// An established SSH session
#[async_trait]
pub trait SshSession: Send {
    /// Open an interactive shell with a PTY of the given size.
    async fn open_shell(&mut self, term: &str, size: PtySize) -> Result<Box<dyn ShellChannel>>;

    /// Disconnect. Idempotent.
    async fn close(&mut self);
}

/// An interactive shell channel
#[async_trait]
pub trait ShellChannel: Send {
    /// Read up to `max_bytes` without waiting.
    fn read_nonblocking(&mut self, max_bytes: usize) -> Result<ReadOutcome>;

    async fn write(&mut self, data: &[u8]) -> Result<()>;

    async fn resize(&mut self, size: PtySize) -> Result<()>;

    fn is_active(&self) -> bool;

    /// Close the channel. Idempotent.
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pty_size_default() {
        assert_eq!(PtySize::default(), PtySize::new(80, 24));
    }
}
