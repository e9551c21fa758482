//! Connection config and its file-backed store
//!
//! The connection config names the SSH target. It is stored as JSON next to
//! the server and re-read for every new WebSocket connection, so edits made
//! through the config page apply to the next terminal session.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{error, info, warn};
use zeroize::Zeroize;

use crate::{Error, Result};

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A password that is wiped from memory on drop and never printed
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Password(<empty>)")
        } else {
            f.write_str("Password(***)")
        }
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// SSH target for one terminal session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub hostname: String,

    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,

    pub username: String,

    /// Empty means "no password auth"
    pub password: Password,

    /// Private key used for public key auth before falling back to password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            port: DEFAULT_SSH_PORT,
            username: String::new(),
            password: Password::default(),
            private_key_path: None,
        }
    }
}

/// Accept the port as a number or a numeric string
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Number(u16),
        Text(String),
    }

    match PortRepr::deserialize(deserializer)? {
        PortRepr::Number(port) => Ok(port),
        PortRepr::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {:?}", text))),
    }
}

impl ConnectionConfig {
    /// Names of the required fields that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.hostname.trim().is_empty() {
            missing.push("hostname");
        }
        if self.username.trim().is_empty() {
            missing.push("username");
        }
        missing
    }

    /// Check that hostname and username are set
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Hostname and Username are required in config (missing: {})",
                missing.join(", ")
            )))
        }
    }

    /// `user@host:port`, used in status messages and logs
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.username, self.hostname, self.port)
    }
}

/// Loads and saves the connection config
pub trait ConfigStore: Send + Sync {
    /// Load the current config; falls back to defaults when unavailable.
    fn load(&self) -> ConnectionConfig;

    /// Persist `config`, returning whether it succeeded.
    fn save(&self, config: &ConnectionConfig) -> bool;
}

/// Config stored as a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<ConnectionConfig> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, config: &ConnectionConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, content)?;

        // The file holds a plaintext password.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> ConnectionConfig {
        match self.read() {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Config file '{}' not found or invalid ({}). Using defaults.",
                    self.path.display(),
                    e
                );
                ConnectionConfig::default()
            }
        }
    }

    fn save(&self, config: &ConnectionConfig) -> bool {
        match self.write(config) {
            Ok(()) => {
                info!("Configuration saved to {}", self.path.display());
                true
            }
            Err(e) => {
                error!("Error saving config file {}: {}", self.path.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> ConnectionConfig {
        ConnectionConfig {
            hostname: "example.com".to_string(),
            port: 2222,
            username: "alice".to_string(),
            password: "hunter2".into(),
            private_key_path: None,
        }
    }

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.hostname, "");
        assert_eq!(config.port, 22);
        assert_eq!(config.username, "");
        assert!(config.password.is_empty());
    }

    #[test]
    fn test_missing_fields() {
        let mut config = sample();
        assert!(config.validate().is_ok());

        config.hostname = "  ".to_string();
        assert_eq!(config.missing_fields(), vec!["hostname"]);

        config.username.clear();
        assert_eq!(config.missing_fields(), vec!["hostname", "username"]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("hostname, username"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"hostname": "box", "username": "bob"}"#).unwrap();
        assert_eq!(config.port, 22);
        assert!(config.password.is_empty());
    }

    #[test]
    fn test_port_as_string() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"hostname": "box", "port": "2200"}"#).unwrap();
        assert_eq!(config.port, 2200);

        let bad = serde_json::from_str::<ConnectionConfig>(r#"{"port": "ssh"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_password_not_in_debug() {
        let debug = format!("{:?}", sample());
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonConfigStore::new(dir.path().join("config.json"));

        assert!(store.save(&sample()));
        assert_eq!(store.load(), sample());
    }

    #[test]
    fn test_store_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let store = JsonConfigStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load(), ConnectionConfig::default());
    }

    #[test]
    fn test_store_malformed_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonConfigStore::new(&path);
        assert_eq!(store.load(), ConnectionConfig::default());
    }

    #[test]
    fn test_store_save_into_missing_dir() {
        let dir = TempDir::new().unwrap();
        let store = JsonConfigStore::new(dir.path().join("nested/dir/config.json"));
        assert!(store.save(&sample()));
        assert_eq!(store.load().hostname, "example.com");
    }

    #[test]
    fn test_store_save_failure_returns_false() {
        let dir = TempDir::new().unwrap();
        // A directory in place of the file makes the write fail.
        let store = JsonConfigStore::new(dir.path());
        assert!(!store.save(&sample()));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let store = JsonConfigStore::new(&path);
        assert!(store.save(&sample()));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
