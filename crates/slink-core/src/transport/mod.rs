//! Secure-shell transport abstraction
//!
//! The broker and runner talk to the remote side only through
//! [`Transport`], which lets tests substitute an in-process fake for the
//! real OpenSSH client.

mod script;
mod ssh;

pub use script::{
    command_script, home_script, mkdir_script, parse_home, shell_quote, shell_script,
    test_dir_script,
};
pub use ssh::OpenSsh;

use async_trait::async_trait;
use std::process::ExitStatus;

use crate::broker::{ControlChannel, SessionHandle};
use crate::error::ConnectionError;

/// Collected result of a non-interactive remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// A terminal-attached sub-operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attach {
    /// Interactive login shell; `script` runs first when present
    Shell { script: Option<String> },
    /// Caller-supplied command line
    Command { script: String },
    /// Local port forwards held open until interrupted
    Forward { ports: Vec<u16> },
}

/// Operations slink needs from the secure-shell subsystem
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether a master is answering on the channel's control socket
    async fn probe(&self, channel: &ControlChannel) -> bool;

    /// Start a background master for the channel
    async fn open_master(&self, channel: &ControlChannel) -> Result<(), ConnectionError>;

    /// Run a short script over the session and collect its stdout
    async fn capture(
        &self,
        session: &SessionHandle,
        script: &str,
    ) -> Result<CommandOutput, ConnectionError>;

    /// Run a sub-operation attached to the local terminal, returning its exit code
    async fn attach(&self, session: &SessionHandle, request: Attach)
        -> Result<i32, ConnectionError>;
}

/// Convert a child's exit status into a shell-style exit code.
///
/// Death by signal N becomes 128 + N, as a shell would report it.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// Wait for a terminal-attached child.
///
/// Ctrl-C is delivered by the terminal to the whole foreground process
/// group, so the child (and through ssh, the remote process) already gets
/// it. Listening for it here keeps this process alive long enough to report
/// the child's status.
pub async fn wait_attached(child: &mut tokio::process::Child) -> std::io::Result<ExitStatus> {
    loop {
        tokio::select! {
            status = child.wait() => return status,
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!("Cannot listen for interrupts: {}", e);
                    return child.wait().await;
                }
                tracing::debug!("Interrupt received, waiting for subordinate process to exit");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_exit_code_plain() {
        assert_eq!(exit_code(ExitStatus::from_raw(7 << 8)), 7);
        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
    }

    #[test]
    fn test_exit_code_signal() {
        // SIGINT
        assert_eq!(exit_code(ExitStatus::from_raw(2)), 130);
    }

    #[tokio::test]
    async fn test_wait_attached_reports_status() {
        let mut child = tokio::process::Command::new("sh")
            .args(["-c", "exit 7"])
            .spawn()
            .unwrap();
        let status = wait_attached(&mut child).await.unwrap();
        assert_eq!(exit_code(status), 7);
    }
}
