//! Cross-process lock guarding control-channel creation
//!
//! On Unix the lock is an exclusive `flock` on a file that is never removed.
//! The kernel drops the lock when its holder exits, crashed or not, so there
//! is no stale lock to detect and break. The holder's PID is written into the
//! file for diagnostics only.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Delay between attempts to take a held lock
const RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Held lock; released when dropped
#[derive(Debug)]
pub struct ChannelLock {
    path: PathBuf,
    file: fs::File,
}

impl ChannelLock {
    /// Try once to take the lock
    #[cfg(unix)]
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        use std::os::unix::fs::OpenOptionsExt;

        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .mode(0o600)
            .open(path)?;

        if !try_lock_exclusive(&file)? {
            return Ok(None);
        }

        let mut lock = Self {
            path: path.to_path_buf(),
            file,
        };
        lock.record_owner()?;
        Ok(Some(lock))
    }

    /// Try once to take the lock
    ///
    /// Without `flock` the lock is the file's existence, so a holder that
    /// crashes leaves it behind until removed by hand.
    #[cfg(not(unix))]
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        let file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut lock = Self {
            path: path.to_path_buf(),
            file,
        };
        lock.record_owner()?;
        Ok(Some(lock))
    }

    /// Wait until the lock can be taken.
    ///
    /// There is no upper bound on the wait while the holder is alive: the
    /// holder is itself waiting on ssh, which enforces its own timeouts.
    pub async fn acquire(path: &Path) -> io::Result<Self> {
        let mut announced = false;
        loop {
            if let Some(lock) = Self::try_acquire(path)? {
                return Ok(lock);
            }

            if !announced {
                tracing::debug!("Waiting for another slink process holding {:?}", path);
                announced = true;
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record_owner(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        writeln!(self.file, "{}", std::process::id())?;
        self.file.sync_all()
    }
}

#[cfg(not(unix))]
impl Drop for ChannelLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove lock file {:?}: {}", self.path, e),
        }
    }
}

/// Non-blocking exclusive `flock`; `Ok(false)` if another descriptor holds it
#[cfg(unix)]
fn try_lock_exclusive(file: &fs::File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: `file` owns the descriptor for the duration of the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}
