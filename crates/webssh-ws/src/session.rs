//! Terminal bridge session
//!
//! One [`BridgeSession`] owns one browser socket and at most one SSH session.
//! It connects, opens a shell and then pumps in a single sequential loop:
//!
//! 1. non-blocking read from the shell, forwarded to the browser;
//! 2. bounded-wait receive of one browser message, applied to the shell;
//! 3. liveness check of the shell channel.
//!
//! Within one iteration shell output is therefore forwarded before the browser
//! message of the same iteration is applied. Teardown (channel, then session)
//! runs exactly once on every exit path.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, info_span, warn, Instrument};
use webssh_core::{
    ConnectionConfig, Error as CoreError, HostKeyPolicy, OutputMode, PtySize, ReadOutcome,
    Settings, ShellChannel, SshConnector, SshSession,
};

use crate::message::{resize_size, ClientMessage, ServerMessage};
use crate::output::OutputEncoder;
use crate::transport::{ClientSocket, Frame, Inbound};
use crate::Result;

/// Per-session knobs, derived from [`Settings`]
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub term: String,
    pub output_mode: OutputMode,
    pub poll_interval: Duration,
    pub read_buffer_size: usize,
    pub host_key_policy: HostKeyPolicy,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for BridgeOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            term: settings.terminal.term.clone(),
            output_mode: settings.terminal.output_mode,
            poll_interval: settings.terminal.poll_interval(),
            read_buffer_size: settings.terminal.read_buffer_size,
            host_key_policy: settings.ssh.host_key_policy(),
        }
    }
}

/// Why a bridge session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Hostname or username missing; nothing was attempted
    InvalidConfig,
    AuthenticationFailed,
    ConnectFailed,
    /// The remote shell ended its output stream
    RemoteClosed,
    /// The shell channel stopped being active
    ChannelInactive,
    /// The browser closed the WebSocket
    ClientClosed,
    /// Unrecoverable error during the session
    Failed(String),
}

impl SessionEnd {
    /// Whether the session ended without an error on either side
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            Self::RemoteClosed | Self::ChannelInactive | Self::ClientClosed
        )
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig => write!(f, "invalid config"),
            Self::AuthenticationFailed => write!(f, "authentication failed"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::RemoteClosed => write!(f, "remote closed"),
            Self::ChannelInactive => write!(f, "channel inactive"),
            Self::ClientClosed => write!(f, "client closed"),
            Self::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Bridges one browser socket to one remote shell
pub struct BridgeSession<S> {
    id: String,
    socket: S,
    connector: Arc<dyn SshConnector>,
    options: BridgeOptions,
}

impl<S: ClientSocket> BridgeSession<S> {
    pub fn new(
        id: impl Into<String>,
        socket: S,
        connector: Arc<dyn SshConnector>,
        options: BridgeOptions,
    ) -> Self {
        Self {
            id: id.into(),
            socket,
            connector,
            options,
        }
    }

    /// Run the session to completion and close the browser socket.
    pub async fn run(mut self, config: &ConnectionConfig) -> SessionEnd {
        let span = info_span!("bridge", session = %self.id);
        async move {
            let end = self.connect_and_pump(config).await;
            self.socket.close().await;
            end
        }
        .instrument(span)
        .await
    }

    async fn connect_and_pump(&mut self, config: &ConnectionConfig) -> SessionEnd {
        if let Err(e) = config.validate() {
            warn!("SSH connection aborted: {}", e);
            self.send_error(e.to_string()).await;
            return SessionEnd::InvalidConfig;
        }

        info!("Attempting SSH connection to {}", config.target());
        self.send_status(format!("Connecting to {}...", config.target()))
            .await;

        let mut session = match self
            .connector
            .connect(config, &self.options.host_key_policy)
            .await
        {
            Ok(session) => session,
            Err(e @ CoreError::Authentication(_)) => {
                warn!("{} for {}", e, config.target());
                self.send_error(e.to_string()).await;
                return SessionEnd::AuthenticationFailed;
            }
            Err(e) => {
                error!("SSH connection error to {}: {}", config.target(), e);
                self.send_error(format!("Connection Error: {}", e)).await;
                return SessionEnd::ConnectFailed;
            }
        };

        info!("SSH connection established to {}", config.target());
        self.send_status("SSH Connected.").await;

        let end = self.attach(session.as_mut()).await;

        info!("Closing SSH connection");
        session.close().await;
        end
    }

    /// Open the shell, pump until done, close the channel.
    async fn attach(&mut self, session: &mut dyn SshSession) -> SessionEnd {
        let mut channel = match session
            .open_shell(&self.options.term, PtySize::default())
            .await
        {
            Ok(channel) => channel,
            Err(e) => {
                error!("Failed to open shell: {}", e);
                self.send_error(format!("Runtime Error: {}", e)).await;
                return SessionEnd::Failed(e.to_string());
            }
        };

        let end = match self.pump(channel.as_mut()).await {
            Ok(end) => end,
            Err(e) => {
                error!("Error during SSH/WS bridge: {}", e);
                self.send_error(format!("Runtime Error: {}", e)).await;
                SessionEnd::Failed(e.to_string())
            }
        };

        channel.close().await;
        end
    }

    async fn pump(&mut self, channel: &mut dyn ShellChannel) -> Result<SessionEnd> {
        let mut output = OutputEncoder::new(self.options.output_mode);

        loop {
            let mut forwarded = false;
            match channel.read_nonblocking(self.options.read_buffer_size)? {
                ReadOutcome::Data(bytes) => {
                    if let Some(frame) = output.encode(&bytes) {
                        self.socket.send_frame(frame).await?;
                    }
                    forwarded = true;
                }
                ReadOutcome::NoData => {}
                ReadOutcome::Eof => {
                    info!("SSH channel closed by remote end");
                    if let Some(frame) = output.finish() {
                        self.socket.send_frame(frame).await?;
                    }
                    return Ok(SessionEnd::RemoteClosed);
                }
            }

            // Don't sleep while the shell is producing output.
            let wait = if forwarded {
                Duration::ZERO
            } else {
                self.options.poll_interval
            };

            match self.socket.recv_timeout(wait).await? {
                Inbound::Text(text) => self.apply(channel, &text).await?,
                Inbound::Idle => {}
                Inbound::Closed => {
                    info!("WebSocket closed by client");
                    return Ok(SessionEnd::ClientClosed);
                }
            }

            if !channel.is_active() {
                info!("SSH channel became inactive");
                return Ok(SessionEnd::ChannelInactive);
            }
        }
    }

    /// Apply one browser message. Undecodable messages are logged and dropped.
    async fn apply(&mut self, channel: &mut dyn ShellChannel, text: &str) -> Result<()> {
        match ClientMessage::decode(text) {
            Ok(ClientMessage::Input { data }) => {
                if !data.is_empty() {
                    channel.write(data.as_bytes()).await?;
                }
            }
            Ok(ClientMessage::Resize { cols, rows }) => {
                let size = resize_size(cols, rows);
                channel.resize(size).await?;
                debug!("Resized PTY to {}x{}", size.cols, size.rows);
            }
            Ok(ClientMessage::Unknown) => {
                debug!("Ignoring message with unknown type: {}", preview(text));
            }
            Err(e) => {
                warn!("Discarding WebSocket message ({}): {}", e, preview(text));
            }
        }
        Ok(())
    }

    async fn send_status(&mut self, data: impl Into<String>) {
        self.send_message(ServerMessage::status(data)).await;
    }

    async fn send_error(&mut self, data: impl Into<String>) {
        self.send_message(ServerMessage::error(data)).await;
    }

    /// Best-effort; the browser may already be gone.
    async fn send_message(&mut self, message: ServerMessage) {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to encode {:?}: {}", message, e);
                return;
            }
        };
        if let Err(e) = self.socket.send_frame(Frame::Text(json)).await {
            debug!("Could not deliver {:?}: {}", message, e);
        }
    }
}

/// First 50 characters of a message, for logs
fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(50).collect();
    if preview.len() < text.len() {
        preview.push_str("...");
    }
    preview
}
