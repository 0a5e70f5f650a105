//! Control-channel naming
//!
//! Each host gets its own ssh control socket and lock file, named after a
//! digest of the exact host string so that any host string produces a short,
//! filesystem-safe and distinct name.

use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

use crate::types::Host;

/// Hex characters of the digest kept in file names.
/// Unix socket paths are limited to ~100 bytes, so the name stays short.
const DIGEST_HEX_LEN: usize = 20;

/// On-disk artifacts that represent one host's multiplexed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlChannel {
    host: Host,
    socket: PathBuf,
    lock: PathBuf,
}

impl ControlChannel {
    /// Derive the channel for `host` inside `control_dir`
    pub fn for_host(control_dir: &Path, host: &Host) -> Self {
        let digest = hex::encode(Sha256::digest(host.as_str().as_bytes()));
        let name = &digest[..DIGEST_HEX_LEN];
        Self {
            host: host.clone(),
            socket: control_dir.join(format!("conn-{}.sock", name)),
            lock: control_dir.join(format!("conn-{}.lock", name)),
        }
    }

    /// Host this channel connects to
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Path of the ssh control socket
    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Path of the lock file guarding master creation
    pub fn lock(&self) -> &Path {
        &self.lock
    }

    /// Whether a socket file is present (it may still be dead)
    pub fn socket_exists(&self) -> bool {
        self.socket.exists()
    }

    /// Remove a socket left behind by a master that is no longer running
    pub fn remove_stale_socket(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.socket) {
            Ok(()) => {
                tracing::debug!("Removed stale control socket {:?}", self.socket);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
