//! Server settings
//!
//! Settings are read in this order of precedence:
//! 1. Environment variables (`WEBSSH_*`)
//! 2. `webssh.toml` settings file
//! 3. Default values
//!
//! `${VAR_NAME}` inside the settings file is expanded from the environment.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ssh::HostKeyPolicy;
use crate::{Error, Result};

/// Default settings file name
pub const DEFAULT_SETTINGS_FILE: &str = "webssh.toml";

/// How remote shell output is framed on the WebSocket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// UTF-8 text frames, invalid sequences replaced with U+FFFD
    #[default]
    Text,
    /// Raw bytes in binary frames
    Binary,
}

impl std::str::FromStr for OutputMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "binary" => Ok(Self::Binary),
            other => Err(Error::Config(format!("unknown output mode: {}", other))),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// SSH client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// JSON file holding the connection config
    pub config_file: String,

    pub connect_timeout_secs: u64,

    /// `None` disables keepalives
    pub keepalive_interval_secs: Option<u64>,

    /// Insecure trust-on-first-use; must be opted into
    pub accept_unknown_host_keys: bool,

    /// Defaults to `~/.ssh/known_hosts`
    pub known_hosts_path: Option<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            config_file: "config.json".to_string(),
            connect_timeout_secs: 10,
            keepalive_interval_secs: Some(30),
            accept_unknown_host_keys: false,
            known_hosts_path: None,
        }
    }
}

impl SshSettings {
    /// Host key policy to inject into every connect
    pub fn host_key_policy(&self) -> HostKeyPolicy {
        if self.accept_unknown_host_keys {
            HostKeyPolicy::AcceptAny
        } else {
            HostKeyPolicy::KnownHosts {
                path: self.known_hosts_path.as_ref().map(PathBuf::from),
            }
        }
    }
}

/// Terminal bridge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSettings {
    /// `TERM` requested for the remote PTY
    pub term: String,

    pub output_mode: OutputMode,

    /// Bounded wait for one WebSocket message per pump iteration
    pub poll_interval_ms: u64,

    /// Maximum bytes read from the shell per iteration
    pub read_buffer_size: usize,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            term: "xterm-256color".to_string(),
            output_mode: OutputMode::Text,
            poll_interval_ms: 10,
            read_buffer_size: 16 * 1024,
        }
    }
}

impl TerminalSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Top-level settings for webssh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub ssh: SshSettings,
    pub terminal: TerminalSettings,
}

impl Settings {
    /// Replace `${VAR_NAME}` with the variable's value (empty when unset)
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                while let Some(c) = chars.next() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Parse settings from TOML text (after env expansion)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings = Self::parse_toml(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn parse_toml(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load settings from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_toml_file_with(path, |key| std::env::var(key).ok())
    }

    /// Validation runs once, after overrides, so the environment can fix a bad file value.
    fn from_toml_file_with<P, F>(path: P, lookup: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read settings file: {}", e)))?;
        let mut settings = Self::parse_toml(&content)?;
        settings.apply_overrides(lookup);
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, `./webssh.toml` is used
    /// when present, otherwise defaults plus environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_toml_file(path);
        }
        if Path::new(DEFAULT_SETTINGS_FILE).exists() {
            return Self::from_toml_file(DEFAULT_SETTINGS_FILE);
        }

        let mut settings = Self::default();
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Override settings from `WEBSSH_*` variables, read through `lookup`
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("WEBSSH_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Some(port) = lookup("WEBSSH_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Some(path) = lookup("WEBSSH_CONFIG_FILE") {
            if !path.is_empty() {
                self.ssh.config_file = path;
            }
        }
        if let Some(accept) = lookup("WEBSSH_ACCEPT_UNKNOWN_HOST_KEYS") {
            self.ssh.accept_unknown_host_keys = parse_bool(&accept);
        }
        if let Some(path) = lookup("WEBSSH_KNOWN_HOSTS") {
            if !path.is_empty() {
                self.ssh.known_hosts_path = Some(path);
            }
        }
        if let Some(mode) = lookup("WEBSSH_OUTPUT_MODE") {
            match mode.parse() {
                Ok(mode) => self.terminal.output_mode = mode,
                Err(e) => tracing::warn!("Ignoring WEBSSH_OUTPUT_MODE: {}", e),
            }
        }
        if let Some(ms) = lookup("WEBSSH_POLL_INTERVAL_MS") {
            if let Ok(ms) = ms.parse() {
                self.terminal.poll_interval_ms = ms;
            }
        }
    }

    /// Reject settings the bridge cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.terminal.poll_interval_ms == 0 || self.terminal.poll_interval_ms > 1000 {
            return Err(Error::Config(format!(
                "terminal.poll_interval_ms must be between 1 and 1000, got {}",
                self.terminal.poll_interval_ms
            )));
        }
        if self.terminal.read_buffer_size == 0 {
            return Err(Error::Config(
                "terminal.read_buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.ssh.connect_timeout_secs == 0 {
            return Err(Error::Config(
                "ssh.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.ssh.config_file.trim().is_empty() {
            return Err(Error::Config("ssh.config_file must not be empty".to_string()));
        }
        Ok(())
    }

    /// Address the HTTP server binds to
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address: {}", e)))
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
