//! rsync and scp over the shared control socket

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::io;
use tokio::process::Command;

use super::FileSync;
use crate::broker::SessionHandle;
use crate::config::{CopySettings, SshSettings, SyncSettings};
use crate::mirror::MirrorPath;
use crate::transport::{exit_code, shell_quote, wait_attached};
use crate::types::SyncDirection;

/// Sync with rsync, copy with scp
#[derive(Debug, Clone)]
pub struct ExternalSync {
    ssh: SshSettings,
    sync: SyncSettings,
    copy: CopySettings,
}

impl ExternalSync {
    pub fn new(ssh: SshSettings, sync: SyncSettings, copy: CopySettings) -> Self {
        Self { ssh, sync, copy }
    }

    /// Remote shell rsync should use, reusing the control socket
    fn rsync_shell(&self, session: &SessionHandle) -> String {
        let mut shell = format!(
            "{} -S {}",
            shell_quote(&self.ssh.program),
            shell_quote(&session.control_path().to_string_lossy())
        );
        for opt in &self.ssh.options {
            shell.push_str(" -o ");
            shell.push_str(&shell_quote(opt));
        }
        shell
    }

    fn rsync_args(
        &self,
        session: &SessionHandle,
        direction: SyncDirection,
        pair: &MirrorPath,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-az".into()];
        if self.sync.delete {
            args.push("--delete".into());
        }
        for pattern in &self.sync.exclude {
            args.push(format!("--exclude={}", pattern).into());
        }
        args.push("-e".into());
        args.push(self.rsync_shell(session).into());

        // Trailing slashes make rsync copy directory contents, so the two
        // trees line up instead of nesting one inside the other
        let local = with_trailing_slash(pair.local.as_os_str());
        let remote = remote_operand(session, &with_trailing_slash(pair.remote.as_os_str()));
        let (from, to) = endpoints(direction, local, remote);
        args.push(from);
        args.push(to);
        args
    }

    fn scp_args(
        &self,
        session: &SessionHandle,
        direction: SyncDirection,
        pair: &MirrorPath,
    ) -> Vec<OsString> {
        let mut control = OsString::from("ControlPath=");
        control.push(session.control_path());
        let mut args: Vec<OsString> = vec!["-o".into(), control];
        for opt in &self.ssh.options {
            args.push("-o".into());
            args.push(opt.into());
        }

        let local = pair.local.as_os_str().to_os_string();
        let remote = remote_operand(session, pair.remote.as_os_str());
        let (from, to) = endpoints(direction, local, remote);
        args.push(from);
        args.push(to);
        args
    }

    async fn run(&self, program: &str, args: Vec<OsString>) -> io::Result<i32> {
        tracing::debug!("Running {} {:?}", program, args);
        let mut child = Command::new(program)
            .args(&args)
            .spawn()
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {}", program, e)))?;
        let status = wait_attached(&mut child).await?;
        Ok(exit_code(status))
    }
}

#[async_trait]
impl FileSync for ExternalSync {
    async fn sync_tree(
        &self,
        session: &SessionHandle,
        direction: SyncDirection,
        pair: &MirrorPath,
    ) -> io::Result<i32> {
        let args = self.rsync_args(session, direction, pair);
        self.run(&self.sync.program, args).await
    }

    async fn copy_file(
        &self,
        session: &SessionHandle,
        direction: SyncDirection,
        pair: &MirrorPath,
    ) -> io::Result<i32> {
        let args = self.scp_args(session, direction, pair);
        self.run(&self.copy.program, args).await
    }
}

fn endpoints(direction: SyncDirection, local: OsString, remote: OsString) -> (OsString, OsString) {
    match direction {
        SyncDirection::Up => (local, remote),
        SyncDirection::Down => (remote, local),
    }
}

/// `host:path`
fn remote_operand(session: &SessionHandle, path: &OsStr) -> OsString {
    let mut operand = OsString::from(session.host().as_str());
    operand.push(":");
    operand.push(path);
    operand
}

fn with_trailing_slash(path: &OsStr) -> OsString {
    let mut out = path.to_os_string();
    if !path.to_string_lossy().ends_with('/') {
        out.push("/");
    }
    out
}
