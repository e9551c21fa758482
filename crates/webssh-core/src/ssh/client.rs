//! `russh` implementation of the SSH session adapter

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::{KeyPair, PublicKey};
use tracing::{debug, info, trace, warn};

use super::{HostKeyPolicy, PtySize, ReadOutcome, ShellChannel, SshConnector, SshSession};
use crate::config::SshSettings;
use crate::connection::ConnectionConfig;
use crate::{Error, Result};

/// Connects with `russh`, bounded by a connect timeout
#[derive(Debug, Clone)]
pub struct RusshConnector {
    connect_timeout: Duration,
    keepalive_interval: Option<Duration>,
}

impl RusshConnector {
    pub fn new(connect_timeout: Duration, keepalive_interval: Option<Duration>) -> Self {
        Self {
            connect_timeout,
            keepalive_interval,
        }
    }

    pub fn from_settings(settings: &SshSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.connect_timeout_secs),
            settings.keepalive_interval_secs.map(Duration::from_secs),
        )
    }
}

/// Client handler; the only callback we need is host key verification
struct HostKeyCheck {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

#[async_trait]
impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(self.policy.verify(&self.host, self.port, server_public_key))
    }
}

#[async_trait]
impl SshConnector for RusshConnector {
    async fn connect(
        &self,
        target: &ConnectionConfig,
        policy: &HostKeyPolicy,
    ) -> Result<Box<dyn SshSession>> {
        let config = Arc::new(client::Config {
            keepalive_interval: self.keepalive_interval,
            ..Default::default()
        });
        let handler = HostKeyCheck {
            host: target.hostname.clone(),
            port: target.port,
            policy: policy.clone(),
        };

        let connecting = client::connect(config, (target.hostname.clone(), target.port), handler);
        let mut handle = match tokio::time::timeout(self.connect_timeout, connecting).await {
            Err(_) => {
                return Err(Error::Connect(format!(
                    "timed out after {}s connecting to {}:{}",
                    self.connect_timeout.as_secs(),
                    target.hostname,
                    target.port
                )));
            }
            Ok(Err(russh::Error::UnknownKey)) => {
                return Err(Error::Connect(format!(
                    "host key for {}:{} is not trusted",
                    target.hostname, target.port
                )));
            }
            Ok(Err(e)) => return Err(Error::Connect(e.to_string())),
            Ok(Ok(handle)) => handle,
        };

        debug!("Transport established to {}:{}", target.hostname, target.port);

        let authenticated =
            tokio::time::timeout(self.connect_timeout, authenticate(&mut handle, target)).await;
        let outcome = match authenticated {
            Err(_) => Err(Error::Connect(format!(
                "timed out after {}s during authentication",
                self.connect_timeout.as_secs()
            ))),
            Ok(result) => result,
        };

        if let Err(e) = outcome {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await;
            return Err(e);
        }

        info!("Authenticated as {}@{}", target.username, target.hostname);
        Ok(Box::new(RusshSession {
            handle,
            close: CloseOnce::default(),
        }))
    }
}

/// Private keys tried when no key path is configured, in preference order
const DEFAULT_IDENTITY_FILES: [&str; 3] = ["id_ed25519", "id_ecdsa", "id_rsa"];

/// Existing default identity files under `<home>/.ssh`
fn default_identity_files(home: Option<&Path>) -> Vec<PathBuf> {
    let Some(home) = home else {
        return Vec::new();
    };
    let ssh_dir = home.join(".ssh");
    DEFAULT_IDENTITY_FILES
        .iter()
        .map(|name| ssh_dir.join(name))
        .filter(|path| path.is_file())
        .collect()
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Load unencrypted keys from `paths`, skipping any that cannot be read.
fn load_identities(paths: &[PathBuf]) -> Vec<KeyPair> {
    paths
        .iter()
        .filter_map(|path| match russh_keys::load_secret_key(path, None) {
            Ok(key) => Some(key),
            Err(e) => {
                debug!("Skipping identity {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

/// Keys to offer: the configured one, or else the default identities.
fn identities(target: &ConnectionConfig) -> Result<Vec<KeyPair>> {
    match target.private_key_path.as_deref().filter(|p| !p.is_empty()) {
        Some(key_path) => {
            let key = russh_keys::load_secret_key(key_path, None).map_err(|e| {
                Error::Authentication(format!("cannot load private key {}: {}", key_path, e))
            })?;
            Ok(vec![key])
        }
        None => Ok(load_identities(&default_identity_files(
            home_dir().as_deref(),
        ))),
    }
}

/// Try public key auth, then password auth.
async fn authenticate(handle: &mut Handle<HostKeyCheck>, target: &ConnectionConfig) -> Result<()> {
    let mut attempted = Vec::new();

    let keys = identities(target)?;
    if !keys.is_empty() {
        attempted.push("publickey");
    }
    for key in keys {
        let accepted = handle
            .authenticate_publickey(target.username.clone(), Arc::new(key))
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;
        if accepted {
            return Ok(());
        }
        debug!("Public key rejected for {}", target.username);
    }

    if !target.password.is_empty() {
        attempted.push("password");
        let accepted = handle
            .authenticate_password(target.username.clone(), target.password.expose().to_string())
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;
        if accepted {
            return Ok(());
        }
    }

    if attempted.is_empty() {
        Err(Error::Authentication(
            "no password or private key configured".to_string(),
        ))
    } else {
        Err(Error::Authentication(format!(
            "server rejected {} for {} (incorrect password or key?)",
            attempted.join(" and "),
            target.username
        )))
    }
}

/// Lets `close` run its teardown only once
#[derive(Debug, Default)]
struct CloseOnce {
    closed: bool,
}

impl CloseOnce {
    /// True on the first call only.
    fn begin(&mut self) -> bool {
        !std::mem::replace(&mut self.closed, true)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// An authenticated `russh` session
pub struct RusshSession {
    handle: Handle<HostKeyCheck>,
    close: CloseOnce,
}

#[async_trait]
impl SshSession for RusshSession {
    async fn open_shell(&mut self, term: &str, size: PtySize) -> Result<Box<dyn ShellChannel>> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Channel(format!("failed to open session channel: {}", e)))?;

        channel
            .request_pty(false, term, size.cols, size.rows, 0, 0, &[])
            .await
            .map_err(|e| Error::Channel(format!("PTY request failed: {}", e)))?;
        channel
            .request_shell(true)
            .await
            .map_err(|e| Error::Channel(format!("shell request failed: {}", e)))?;

        debug!("Shell opened ({}, {}x{})", term, size.cols, size.rows);
        Ok(Box::new(RusshChannel::new(channel)))
    }

    async fn close(&mut self) {
        if !self.close.begin() {
            return;
        }
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!("Disconnect failed (already gone?): {}", e);
        }
    }
}

/// Receive side of a shell channel, fed one queued message at a time
#[derive(Debug)]
struct ReadState {
    /// Bytes received but not yet handed out because of `max_bytes`
    pending: Vec<u8>,
    eof: bool,
    active: bool,
}

impl ReadState {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
            eof: false,
            active: true,
        }
    }

    /// Outcome available without looking at the channel queue
    fn buffered(&mut self, max_bytes: usize) -> Option<ReadOutcome> {
        if !self.pending.is_empty() {
            return Some(ReadOutcome::Data(self.take_pending(max_bytes)));
        }
        self.eof.then_some(ReadOutcome::Eof)
    }

    /// Map one queued message. `None` means the message carries no output.
    fn on_message(&mut self, msg: Option<ChannelMsg>, max_bytes: usize) -> Option<ReadOutcome> {
        match msg {
            Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                if data.is_empty() {
                    return None;
                }
                self.pending.extend_from_slice(&data);
                Some(ReadOutcome::Data(self.take_pending(max_bytes)))
            }
            Some(ChannelMsg::Eof) => {
                debug!("Remote sent EOF");
                self.eof = true;
                Some(ReadOutcome::Eof)
            }
            Some(ChannelMsg::Close) | None => {
                debug!("Remote closed the channel");
                self.eof = true;
                self.active = false;
                Some(ReadOutcome::Eof)
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                info!("Remote shell exited with status {}", exit_status);
                None
            }
            Some(other) => {
                trace!("Ignoring channel message: {:?}", other);
                None
            }
        }
    }

    fn take_pending(&mut self, max_bytes: usize) -> Vec<u8> {
        let n = self.pending.len().min(max_bytes.max(1));
        let rest = self.pending.split_off(n);
        std::mem::replace(&mut self.pending, rest)
    }
}

/// A shell channel read without ever awaiting on the incoming queue
pub struct RusshChannel {
    channel: Channel<Msg>,
    state: ReadState,
    close: CloseOnce,
}

impl RusshChannel {
    fn new(channel: Channel<Msg>) -> Self {
        Self {
            channel,
            state: ReadState::new(),
            close: CloseOnce::default(),
        }
    }
}

#[async_trait]
impl ShellChannel for RusshChannel {
    fn read_nonblocking(&mut self, max_bytes: usize) -> Result<ReadOutcome> {
        if let Some(outcome) = self.state.buffered(max_bytes) {
            return Ok(outcome);
        }

        loop {
            // Polled once; a message already queued is returned, otherwise NoData.
            let Some(msg) = self.channel.wait().now_or_never() else {
                return Ok(ReadOutcome::NoData);
            };
            if let Some(outcome) = self.state.on_message(msg, max_bytes) {
                return Ok(outcome);
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if let Err(e) = self.channel.data(data).await {
            self.state.active = false;
            return Err(Error::Channel(format!("write failed: {}", e)));
        }
        Ok(())
    }

    async fn resize(&mut self, size: PtySize) -> Result<()> {
        self.channel
            .window_change(size.cols, size.rows, 0, 0)
            .await
            .map_err(|e| Error::Channel(format!("resize failed: {}", e)))
    }

    fn is_active(&self) -> bool {
        self.state.active && !self.close.is_closed()
    }

    async fn close(&mut self) {
        if !self.close.begin() {
            return;
        }
        self.state.active = false;
        if let Err(e) = self.channel.close().await {
            warn!("Channel close failed: {}", e);
        }
    }
}
