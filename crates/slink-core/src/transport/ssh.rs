//! OpenSSH client transport
//!
//! Shells out to the system `ssh`, so `~/.ssh/config`, agents, keys and
//! host-key policy all behave exactly as they do for plain ssh.

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::IsTerminal;
use std::process::Stdio;
use tokio::process::Command;

use super::{exit_code, wait_attached, Attach, CommandOutput, Transport};
use crate::broker::{ControlChannel, SessionHandle};
use crate::config::SshSettings;
use crate::error::ConnectionError;

/// ssh reports its own failures (as opposed to the remote command's) as 255
const SSH_FAILURE_STATUS: i32 = 255;

/// Ports below this need root to bind
const FIRST_UNPRIVILEGED_PORT: u16 = 1024;

/// Transport backed by the OpenSSH command-line client
#[derive(Debug, Clone)]
pub struct OpenSsh {
    settings: SshSettings,
    tty: bool,
}

impl OpenSsh {
    /// Client configured by `settings`; pty allocation for commands follows
    /// whether stdout is a terminal
    pub fn new(settings: SshSettings) -> Self {
        let tty = std::io::stdout().is_terminal();
        Self { settings, tty }
    }

    /// Override terminal detection
    pub fn with_tty(mut self, tty: bool) -> Self {
        self.tty = tty;
        self
    }

    /// Options shared by every invocation over `channel`
    fn base_args(&self, channel: &ControlChannel) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-S".into(), channel.socket().into()];
        for opt in &self.settings.options {
            args.push("-o".into());
            args.push(opt.into());
        }
        args
    }

    fn probe_args(&self, channel: &ControlChannel) -> Vec<OsString> {
        let mut args = self.base_args(channel);
        args.extend(["-O", "check", channel.host().as_str()].map(OsString::from));
        args
    }

    fn master_args(&self, channel: &ControlChannel) -> Vec<OsString> {
        // -M master, -N no command, -f background once authenticated
        let mut args: Vec<OsString> = vec!["-M".into(), "-N".into(), "-f".into()];
        args.extend(self.base_args(channel));
        args.push("-o".into());
        args.push(format!("ControlPersist={}", self.settings.control_persist).into());
        args.push(channel.host().as_str().into());
        args
    }

    fn capture_args(&self, session: &SessionHandle, script: &str) -> Vec<OsString> {
        let mut args = self.base_args(session.channel());
        args.extend(["-q", "-T", session.host().as_str(), script].map(OsString::from));
        args
    }

    /// Program and arguments for a terminal-attached request
    fn attach_command(&self, session: &SessionHandle, request: &Attach) -> (String, Vec<OsString>) {
        let mut args = self.base_args(session.channel());
        let host: OsString = session.host().as_str().into();

        match request {
            Attach::Shell { script } => {
                args.extend([OsString::from("-q"), OsString::from("-t"), host]);
                if let Some(script) = script {
                    args.push(script.into());
                }
                (self.settings.program.clone(), args)
            }
            Attach::Command { script } => {
                args.push("-q".into());
                if self.tty {
                    args.push("-t".into());
                }
                args.extend([host, OsString::from(script)]);
                (self.settings.program.clone(), args)
            }
            Attach::Forward { ports } => {
                args.push("-N".into());
                for port in ports {
                    args.push("-L".into());
                    args.push(format!("{}:127.0.0.1:{}", port, port).into());
                }
                args.push(host);

                if ports.iter().any(|p| *p < FIRST_UNPRIVILEGED_PORT) {
                    let mut sudo_args: Vec<OsString> = vec![self.settings.program.clone().into()];
                    sudo_args.extend(args);
                    ("sudo".to_string(), sudo_args)
                } else {
                    (self.settings.program.clone(), args)
                }
            }
        }
    }

    fn spawn_error(&self, program: &str) -> impl FnOnce(std::io::Error) -> ConnectionError {
        let program = program.to_string();
        move |source| ConnectionError::Spawn { program, source }
    }
}

#[async_trait]
impl Transport for OpenSsh {
    async fn probe(&self, channel: &ControlChannel) -> bool {
        if !channel.socket_exists() {
            return false;
        }

        let status = Command::new(&self.settings.program)
            .args(self.probe_args(channel))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::debug!("Control channel probe could not run: {}", e);
                false
            }
        }
    }

    async fn open_master(&self, channel: &ControlChannel) -> Result<(), ConnectionError> {
        // stdin and stderr stay attached so password prompts and ssh's own
        // error messages reach the user unchanged
        let status = Command::new(&self.settings.program)
            .args(self.master_args(channel))
            .stdout(Stdio::null())
            .status()
            .await
            .map_err(self.spawn_error(&self.settings.program))?;

        if !status.success() {
            return Err(ConnectionError::EstablishFailed {
                host: channel.host().to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }

    async fn capture(
        &self,
        session: &SessionHandle,
        script: &str,
    ) -> Result<CommandOutput, ConnectionError> {
        tracing::trace!("Remote query on {}: {}", session.host(), script);

        let output = Command::new(&self.settings.program)
            .args(self.capture_args(session, script))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(self.spawn_error(&self.settings.program))?;

        let status = exit_code(output.status);
        if status == SSH_FAILURE_STATUS {
            return Err(ConnectionError::Lost {
                host: session.host().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(CommandOutput {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    async fn attach(
        &self,
        session: &SessionHandle,
        request: Attach,
    ) -> Result<i32, ConnectionError> {
        let (program, args) = self.attach_command(session, &request);
        tracing::debug!("Attaching to {}: {} {:?}", session.host(), program, args);

        let mut child = Command::new(&program)
            .args(&args)
            .spawn()
            .map_err(self.spawn_error(&program))?;

        let status = wait_attached(&mut child)
            .await
            .map_err(self.spawn_error(&program))?;
        Ok(exit_code(status))
    }
}
