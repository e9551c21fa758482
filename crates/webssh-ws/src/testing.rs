//! Scripted fakes for the SSH adapter, browser socket and config store

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use webssh_core::{
    ConfigStore, ConnectionConfig, Error as CoreError, HostKeyPolicy, PtySize, ReadOutcome,
    ShellChannel, SshConnector, SshSession,
};

use crate::message::ServerMessage;
use crate::transport::{ClientSocket, Frame, Inbound};
use crate::{Result, WsError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    OpenShell,
    Write(Vec<u8>),
    Resize(PtySize),
    ChannelClose,
    SessionClose,
    Sent(Frame),
    SocketClose,
}

/// Shared, ordered log of everything the fakes observed
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Event>>>);

impl Recorder {
    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Write(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }

    pub fn resizes(&self) -> Vec<PtySize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Resize(size) => Some(size),
                _ => None,
            })
            .collect()
    }

    /// `data` of every sent status/error message of the given `kind`
    pub fn server_messages(&self, kind: &str) -> Vec<String> {
        self.sent_text()
            .filter_map(|text| serde_json::from_str::<ServerMessage>(&text).ok())
            .filter_map(|msg| match (msg, kind) {
                (ServerMessage::Status { data }, "status") => Some(data),
                (ServerMessage::Error { data }, "error") => Some(data),
                _ => None,
            })
            .collect()
    }

    /// Text frames that are not status/error messages
    pub fn terminal_output(&self) -> Vec<String> {
        self.sent_text()
            .filter(|text| serde_json::from_str::<ServerMessage>(text).is_err())
            .collect()
    }

    fn sent_text(&self) -> impl Iterator<Item = String> {
        self.events().into_iter().filter_map(|e| match e {
            Event::Sent(Frame::Text(text)) => Some(text),
            _ => None,
        })
    }
}

/// Browser socket replaying a fixed inbound script, then reporting close
pub struct FakeSocket {
    recorder: Recorder,
    inbound: VecDeque<Inbound>,
    fail_output_sends: bool,
}

impl FakeSocket {
    pub fn new(recorder: &Recorder, inbound: Vec<Inbound>) -> Self {
        Self {
            recorder: recorder.clone(),
            inbound: inbound.into(),
            fail_output_sends: false,
        }
    }

    /// Fail every frame that is not a status/error message
    pub fn fail_output_sends(mut self) -> Self {
        self.fail_output_sends = true;
        self
    }
}

#[async_trait]
impl ClientSocket for FakeSocket {
    async fn send_frame(&mut self, frame: Frame) -> Result<()> {
        if self.fail_output_sends {
            let is_control = matches!(&frame, Frame::Text(text)
                if serde_json::from_str::<ServerMessage>(text).is_ok());
            if !is_control {
                return Err(WsError::WebSocket("connection reset".to_string()));
            }
        }
        self.recorder.push(Event::Sent(frame));
        Ok(())
    }

    async fn recv_timeout(&mut self, _wait: Duration) -> Result<Inbound> {
        Ok(self.inbound.pop_front().unwrap_or(Inbound::Closed))
    }

    async fn close(&mut self) {
        self.recorder.push(Event::SocketClose);
    }
}

#[derive(Debug, Clone, Default)]
struct ChannelScript {
    reads: VecDeque<ReadOutcome>,
    deactivate_when_drained: bool,
    fail_writes: bool,
}

/// SSH connector handing out one scripted session
pub struct FakeConnector {
    recorder: Recorder,
    connect_error: Mutex<Option<CoreError>>,
    script: ChannelScript,
    fail_open_shell: bool,
}

impl FakeConnector {
    pub fn new(recorder: &Recorder) -> Self {
        Self {
            recorder: recorder.clone(),
            connect_error: Mutex::new(None),
            script: ChannelScript::default(),
            fail_open_shell: false,
        }
    }

    pub fn fail_with(self, error: CoreError) -> Self {
        *self.connect_error.lock().unwrap() = Some(error);
        self
    }

    /// Outcomes of successive reads; `NoData` once exhausted
    pub fn reads(mut self, reads: Vec<ReadOutcome>) -> Self {
        self.script.reads = reads.into();
        self
    }

    pub fn deactivate_when_drained(mut self) -> Self {
        self.script.deactivate_when_drained = true;
        self
    }

    pub fn fail_writes(mut self) -> Self {
        self.script.fail_writes = true;
        self
    }

    pub fn fail_open_shell(mut self) -> Self {
        self.fail_open_shell = true;
        self
    }
}

#[async_trait]
impl SshConnector for FakeConnector {
    async fn connect(
        &self,
        _target: &ConnectionConfig,
        _policy: &HostKeyPolicy,
    ) -> webssh_core::Result<Box<dyn SshSession>> {
        self.recorder.push(Event::Connect);
        if let Some(error) = self.connect_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(Box::new(FakeSession {
            recorder: self.recorder.clone(),
            script: self.script.clone(),
            fail_open_shell: self.fail_open_shell,
        }))
    }
}

struct FakeSession {
    recorder: Recorder,
    script: ChannelScript,
    fail_open_shell: bool,
}

#[async_trait]
impl SshSession for FakeSession {
    async fn open_shell(
        &mut self,
        _term: &str,
        _size: PtySize,
    ) -> webssh_core::Result<Box<dyn ShellChannel>> {
        if self.fail_open_shell {
            return Err(CoreError::Channel("shell request refused".to_string()));
        }
        self.recorder.push(Event::OpenShell);
        Ok(Box::new(FakeChannel {
            recorder: self.recorder.clone(),
            script: std::mem::take(&mut self.script),
        }))
    }

    async fn close(&mut self) {
        self.recorder.push(Event::SessionClose);
    }
}

struct FakeChannel {
    recorder: Recorder,
    script: ChannelScript,
}

#[async_trait]
impl ShellChannel for FakeChannel {
    fn read_nonblocking(&mut self, _max_bytes: usize) -> webssh_core::Result<ReadOutcome> {
        Ok(self.script.reads.pop_front().unwrap_or(ReadOutcome::NoData))
    }

    async fn write(&mut self, data: &[u8]) -> webssh_core::Result<()> {
        if self.script.fail_writes {
            return Err(CoreError::Channel("write failed: broken pipe".to_string()));
        }
        self.recorder.push(Event::Write(data.to_vec()));
        Ok(())
    }

    async fn resize(&mut self, size: PtySize) -> webssh_core::Result<()> {
        self.recorder.push(Event::Resize(size));
        Ok(())
    }

    fn is_active(&self) -> bool {
        !(self.script.deactivate_when_drained && self.script.reads.is_empty())
    }

    async fn close(&mut self) {
        self.recorder.push(Event::ChannelClose);
    }
}

/// In-memory config store
#[derive(Default)]
pub struct MemoryConfigStore {
    config: Mutex<ConnectionConfig>,
    fail_saves: bool,
}

impl MemoryConfigStore {
    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            config: Mutex::new(config),
            fail_saves: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Default::default()
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> ConnectionConfig {
        self.config.lock().unwrap().clone()
    }

    fn save(&self, config: &ConnectionConfig) -> bool {
        if self.fail_saves {
            return false;
        }
        *self.config.lock().unwrap() = config.clone();
        true
    }
}
