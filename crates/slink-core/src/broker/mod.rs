//! Multiplexed session broker
//!
//! Keeps at most one ssh master connection per host. The master outlives
//! the slink process that started it (ssh `ControlPersist`) and is shared by
//! every later invocation through its control socket. Creation is guarded
//! by an exclusive file lock and re-checked after the lock is taken, so concurrent
//! invocations that race for a missing channel end up sharing the winner's.

mod control;
mod lock;

pub use control::ControlChannel;
pub use lock::ChannelLock;

use std::path::{Path, PathBuf};

use crate::error::ConnectionError;
use crate::transport::Transport;
use crate::types::Host;

/// A live multiplexed session usable by sub-operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    channel: ControlChannel,
}

impl SessionHandle {
    /// Host the session is connected to
    pub fn host(&self) -> &Host {
        self.channel.host()
    }

    /// Control socket every sub-operation attaches to
    pub fn control_path(&self) -> &Path {
        self.channel.socket()
    }

    /// Underlying control channel
    pub fn channel(&self) -> &ControlChannel {
        &self.channel
    }
}

/// Creates or reuses control channels
pub struct ConnectionBroker<T> {
    transport: T,
    control_dir: PathBuf,
}

impl<T: Transport> ConnectionBroker<T> {
    /// Broker keeping its sockets in `control_dir`
    pub fn new(transport: T, control_dir: PathBuf) -> Self {
        Self {
            transport,
            control_dir,
        }
    }

    /// Transport used to reach the hosts
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Directory holding sockets and lock files
    pub fn control_dir(&self) -> &Path {
        &self.control_dir
    }

    /// Return a session for `host`, opening the master connection if needed.
    ///
    /// A failed master is reported once and never retried here; ssh already
    /// applies its own connection attempts and timeouts.
    pub async fn acquire(&self, host: &Host) -> Result<SessionHandle, ConnectionError> {
        let channel = ControlChannel::for_host(&self.control_dir, host);

        if self.transport.probe(&channel).await {
            tracing::debug!("Reusing control channel {:?} for {}", channel.socket(), host);
            return Ok(SessionHandle { channel });
        }

        std::fs::create_dir_all(&self.control_dir).map_err(|source| ConnectionError::Lock {
            path: self.control_dir.clone(),
            source,
        })?;
        restrict_permissions(&self.control_dir);

        let _lock = ChannelLock::acquire(channel.lock())
            .await
            .map_err(|source| ConnectionError::Lock {
                path: channel.lock().to_path_buf(),
                source,
            })?;

        // Another process may have finished creating it while we waited
        if self.transport.probe(&channel).await {
            tracing::debug!("Control channel for {} created concurrently, reusing", host);
            return Ok(SessionHandle { channel });
        }

        channel
            .remove_stale_socket()
            .map_err(|source| ConnectionError::Lock {
                path: channel.socket().to_path_buf(),
                source,
            })?;

        tracing::info!("Opening control channel to {}", host);
        self.transport.open_master(&channel).await?;
        tracing::debug!("Control channel ready at {:?}", channel.socket());

        Ok(SessionHandle { channel })
    }
}

/// Control sockets grant shell access; keep their directory private
#[cfg(unix)]
fn restrict_permissions(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)) {
        tracing::warn!("Could not restrict permissions on {:?}: {}", dir, e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_dir: &Path) {}
