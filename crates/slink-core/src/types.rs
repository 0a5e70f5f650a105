//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Identifier of a remote machine as handed to ssh.
///
/// May embed a user (`me@box`) or be an alias from `~/.ssh/config`. Two
/// different strings naming the same machine are distinct hosts. A port
/// cannot be embedded: neither ssh nor the rsync `host:path` operand would
/// read `box:2222` as one, so it is configured through ssh options instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Host(String);

impl Host {
    /// Validate and wrap a host string
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let host = raw.trim();
        if host.is_empty()
            || host.starts_with('-')
            || host.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ConfigError::InvalidHost(raw.to_string()));
        }
        if has_port_suffix(host) {
            return Err(ConfigError::PortInHost(host.to_string()));
        }
        Ok(Self(host.to_string()))
    }

    /// Get the raw host string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `box:22` or `[::1]:22`; bare IPv6 literals such as `fe80::1` are left alone
fn has_port_suffix(host: &str) -> bool {
    let Some((name, port)) = host.rsplit_once(':') else {
        return false;
    };
    (name.ends_with(']') || !name.contains(':'))
        && !port.is_empty()
        && port.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote working directory for `go` and `run`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteDir {
    /// The mirror of the local directory exists on the remote
    Mirrored(PathBuf),
    /// The mirror is absent; the session stays in the login directory
    LoginDefault { missing: PathBuf },
}

impl RemoteDir {
    /// Directory to `cd` into before running anything, if any
    pub fn target(&self) -> Option<&Path> {
        match self {
            RemoteDir::Mirrored(path) => Some(path),
            RemoteDir::LoginDefault { .. } => None,
        }
    }
}

/// Direction of a tree synchronisation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Local tree to remote mirror
    Up,
    /// Remote mirror to local tree
    Down,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncDirection::Up => write!(f, "up"),
            SyncDirection::Down => write!(f, "down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_parse_trims() {
        let host = Host::parse("  dev@box.example.com\n").unwrap();
        assert_eq!(host.as_str(), "dev@box.example.com");
    }

    #[test]
    fn test_host_parse_rejects_malformed() {
        assert!(Host::parse("").is_err());
        assert!(Host::parse("   ").is_err());
        assert!(Host::parse("-oProxyCommand=evil").is_err());
        assert!(Host::parse("two words").is_err());
    }

    #[test]
    fn test_host_parse_rejects_embedded_port() {
        for raw in ["box:2222", "me@box.example.com:22", "[::1]:22"] {
            assert!(
                matches!(Host::parse(raw), Err(ConfigError::PortInHost(_))),
                "{raw} should be rejected"
            );
        }
        let msg = Host::parse("box:2222").unwrap_err().to_string();
        assert!(msg.contains("Port"));
    }

    #[test]
    fn test_host_parse_accepts_ipv6_literal() {
        assert_eq!(Host::parse("fe80::1").unwrap().as_str(), "fe80::1");
        assert_eq!(Host::parse("me@[::1]").unwrap().as_str(), "me@[::1]");
    }

    #[test]
    fn test_hosts_are_keyed_by_exact_string() {
        let a = Host::parse("box").unwrap();
        let b = Host::parse("me@box").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_remote_dir_target() {
        let mirrored = RemoteDir::Mirrored(PathBuf::from("/srv/x"));
        assert_eq!(mirrored.target(), Some(Path::new("/srv/x")));

        let fallback = RemoteDir::LoginDefault {
            missing: PathBuf::from("/srv/x"),
        };
        assert_eq!(fallback.target(), None);
    }
}
