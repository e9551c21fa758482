//! Host key trust policy
//!
//! The policy is passed explicitly to every connect call. Accepting unknown
//! keys is never implied: the operator has to opt in.

use std::path::PathBuf;

use russh_keys::key::PublicKey;
use tracing::{debug, warn};

/// How the SSH client decides whether to trust a server's host key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Only keys present in a known_hosts file are trusted.
    /// `None` uses the user's `~/.ssh/known_hosts`.
    KnownHosts { path: Option<PathBuf> },

    /// Trust-on-first-use without verification. Insecure.
    AcceptAny,
}

impl Default for HostKeyPolicy {
    fn default() -> Self {
        Self::KnownHosts { path: None }
    }
}

impl HostKeyPolicy {
    /// Decide whether `key` is acceptable for `host:port`.
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> bool {
        match self {
            Self::AcceptAny => {
                warn!(
                    "Accepting unverified host key {} for {}:{}",
                    key.fingerprint(),
                    host,
                    port
                );
                true
            }
            Self::KnownHosts { path } => {
                let result = match path {
                    Some(path) => russh_keys::check_known_hosts_path(host, port, key, path),
                    None => russh_keys::check_known_hosts(host, port, key),
                };
                match result {
                    Ok(true) => {
                        debug!("Host key for {}:{} matches known_hosts", host, port);
                        true
                    }
                    Ok(false) => {
                        warn!(
                            "Host key {} for {}:{} not found in known_hosts",
                            key.fingerprint(),
                            host,
                            port
                        );
                        false
                    }
                    Err(e) => {
                        warn!("Host key check failed for {}:{}: {}", host, port, e);
                        false
                    }
                }
            }
        }
    }

    /// Short human readable name, used in startup logs
    pub fn describe(&self) -> String {
        match self {
            Self::AcceptAny => "accept-any (insecure)".to_string(),
            Self::KnownHosts { path: Some(path) } => format!("known_hosts ({})", path.display()),
            Self::KnownHosts { path: None } => "known_hosts (~/.ssh/known_hosts)".to_string(),
        }
    }
}
