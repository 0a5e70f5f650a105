//! Operation runner
//!
//! Drives one user-facing operation through
//! `Idle → ResolvingHost → AcquiringSession → ResolvingPath → Executing →
//! Terminal`. Forwarding skips path resolution since it has no working
//! directory.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::broker::{ConnectionBroker, SessionHandle};
use crate::config::Profile;
use crate::error::{PathResolutionError, SlinkError, SlinkResult};
use crate::mirror::{self, MirrorPath};
use crate::sync::FileSync;
use crate::transport::{self, Attach, Transport};
use crate::types::{RemoteDir, SyncDirection};

/// A user-facing operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Interactive shell in the mirror of the working directory
    Shell,
    /// Run a command line in the mirror of the working directory
    Exec { command: String },
    /// Synchronise the working directory with its mirror
    Sync(SyncDirection),
    /// Copy one local file to its mirror
    Upload { path: PathBuf },
    /// Copy one file from its mirror to the local path
    Download { path: PathBuf },
    /// Forward local ports to the same ports on the remote loopback
    Forward { ports: Vec<u16> },
}

impl Operation {
    fn is_transfer(&self) -> bool {
        matches!(
            self,
            Operation::Sync(_) | Operation::Upload { .. } | Operation::Download { .. }
        )
    }
}

/// How an operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Success,
    Failure,
}

/// Runner progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    ResolvingHost,
    AcquiringSession,
    ResolvingPath,
    Executing,
    Terminal(Completion),
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerState::Idle => write!(f, "idle"),
            RunnerState::ResolvingHost => write!(f, "resolving host"),
            RunnerState::AcquiringSession => write!(f, "acquiring session"),
            RunnerState::ResolvingPath => write!(f, "resolving path"),
            RunnerState::Executing => write!(f, "executing"),
            RunnerState::Terminal(Completion::Success) => write!(f, "done"),
            RunnerState::Terminal(Completion::Failure) => write!(f, "failed"),
        }
    }
}

/// Local side of the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalContext {
    /// Working directory the operation is relative to
    pub cwd: PathBuf,
    /// Local home directory
    pub home: PathBuf,
}

impl LocalContext {
    /// Working directory and home of the current process
    pub fn from_env() -> SlinkResult<Self> {
        let cwd = std::env::current_dir()?;
        let home = dirs::home_dir().ok_or(PathResolutionError::Unknown("local home directory"))?;
        Ok(Self { cwd, home })
    }
}

/// Runs operations over a brokered session
pub struct SessionRunner<T, S> {
    profile: Profile,
    local: LocalContext,
    broker: ConnectionBroker<T>,
    sync: S,
    state: RunnerState,
}

impl<T: Transport, S: FileSync> SessionRunner<T, S> {
    pub fn new(profile: Profile, local: LocalContext, broker: ConnectionBroker<T>, sync: S) -> Self {
        Self {
            profile,
            local,
            broker,
            sync,
            state: RunnerState::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Run `operation` to completion.
    ///
    /// A non-zero status from the remote side or the transfer tool comes
    /// back as [`SlinkError::RemoteExecutionFailure`] or
    /// [`SlinkError::SyncFailure`] carrying that status.
    pub async fn run(&mut self, operation: Operation) -> SlinkResult<()> {
        let result = self.drive(operation).await;
        let completion = match &result {
            Ok(()) => Completion::Success,
            Err(_) => Completion::Failure,
        };
        self.transition(RunnerState::Terminal(completion));
        result
    }

    async fn drive(&mut self, operation: Operation) -> SlinkResult<()> {
        self.transition(RunnerState::ResolvingHost);
        let host = self
            .profile
            .selected
            .clone()
            .ok_or(SlinkError::NoHostSelected)?;

        self.transition(RunnerState::AcquiringSession);
        let session = self.broker.acquire(&host).await?;

        let transfer = operation.is_transfer();
        let status = match operation {
            Operation::Shell => {
                self.transition(RunnerState::ResolvingPath);
                let dir = self.remote_dir(&session).await?;
                let script = transport::shell_script(&dir)?;

                self.transition(RunnerState::Executing);
                self.broker
                    .transport()
                    .attach(&session, Attach::Shell { script })
                    .await?
            }
            Operation::Exec { command } => {
                self.transition(RunnerState::ResolvingPath);
                let dir = self.remote_dir(&session).await?;
                let script = transport::command_script(&dir, &command)?;

                self.transition(RunnerState::Executing);
                self.broker
                    .transport()
                    .attach(&session, Attach::Command { script })
                    .await?
            }
            Operation::Sync(direction) => {
                self.transition(RunnerState::ResolvingPath);
                let pair = self.mirror(&session, &self.local.cwd).await?;

                self.transition(RunnerState::Executing);
                if direction == SyncDirection::Up {
                    self.ensure_remote_dir(&session, &pair.remote).await?;
                }
                tracing::info!(
                    "Syncing {} {:?} <-> {}:{:?}",
                    direction,
                    pair.local,
                    session.host(),
                    pair.remote
                );
                self.sync.sync_tree(&session, direction, &pair).await?
            }
            Operation::Upload { path } => {
                self.transition(RunnerState::ResolvingPath);
                let local = mirror::normalize(&self.local.cwd, &path)?;
                let pair = self.mirror(&session, &local).await?;

                self.transition(RunnerState::Executing);
                if let Some(parent) = pair.remote.parent() {
                    self.ensure_remote_dir(&session, parent).await?;
                }
                self.sync
                    .copy_file(&session, SyncDirection::Up, &pair)
                    .await?
            }
            Operation::Download { path } => {
                self.transition(RunnerState::ResolvingPath);
                let local = mirror::normalize(&self.local.cwd, &path)?;
                let pair = self.mirror(&session, &local).await?;

                self.transition(RunnerState::Executing);
                if let Some(parent) = pair.local.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                self.sync
                    .copy_file(&session, SyncDirection::Down, &pair)
                    .await?
            }
            Operation::Forward { ports } => {
                self.transition(RunnerState::Executing);
                tracing::info!("Forwarding ports {:?} to {}", ports, session.host());
                self.broker
                    .transport()
                    .attach(&session, Attach::Forward { ports })
                    .await?
            }
        };

        match status {
            0 => Ok(()),
            code if transfer => Err(SlinkError::SyncFailure(code)),
            code => Err(SlinkError::RemoteExecutionFailure(code)),
        }
    }

    fn transition(&mut self, next: RunnerState) {
        tracing::debug!("Runner: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Remote home, from settings or from the remote `$HOME`
    async fn remote_home(&self, session: &SessionHandle) -> SlinkResult<PathBuf> {
        if let Some(home) = &self.profile.settings.remote_home {
            return Ok(home.clone());
        }

        let output = self
            .broker
            .transport()
            .capture(session, &transport::home_script())
            .await?;
        let home = match transport::parse_home(&output.stdout) {
            Some(home) if output.success() && Path::new(home).is_absolute() => home,
            _ => return Err(PathResolutionError::Unknown("remote home directory").into()),
        };
        tracing::debug!("Remote home on {} is {}", session.host(), home);
        Ok(PathBuf::from(home))
    }

    async fn mirror(&self, session: &SessionHandle, local: &Path) -> SlinkResult<MirrorPath> {
        let remote_home = self.remote_home(session).await?;
        let pair = mirror::resolve(local, &self.local.home, &remote_home)?;
        tracing::debug!("Mirrored {:?} -> {:?} ({:?})", pair.local, pair.remote, pair.rule);
        Ok(pair)
    }

    /// Mirror of the working directory, or the login directory if absent
    async fn remote_dir(&self, session: &SessionHandle) -> SlinkResult<RemoteDir> {
        let pair = self.mirror(session, &self.local.cwd).await?;
        let script = transport::test_dir_script(&pair.remote)?;
        let exists = self
            .broker
            .transport()
            .capture(session, &script)
            .await?
            .success();

        if exists {
            Ok(RemoteDir::Mirrored(pair.remote))
        } else {
            tracing::info!(
                "{:?} does not exist on {}, staying in the login directory",
                pair.remote,
                session.host()
            );
            Ok(RemoteDir::LoginDefault {
                missing: pair.remote,
            })
        }
    }

    async fn ensure_remote_dir(&self, session: &SessionHandle, dir: &Path) -> SlinkResult<()> {
        let script = transport::mkdir_script(dir)?;
        let output = self.broker.transport().capture(session, &script).await?;
        if !output.success() {
            return Err(SlinkError::SyncFailure(output.status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::ControlChannel;
    use crate::config::Settings;
    use crate::error::ConnectionError;
    use crate::transport::CommandOutput;
    use crate::types::Host;
    use async_trait::async_trait;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Remote side simulated in memory
    #[derive(Clone, Default)]
    struct FakeRemote {
        existing_dirs: Vec<PathBuf>,
        exit_status: i32,
        unreachable: bool,
        banner: String,
        scripts: Arc<Mutex<Vec<String>>>,
        attached: Arc<Mutex<Vec<Attach>>>,
        transfers: Arc<Mutex<Vec<(SyncDirection, MirrorPath, bool)>>>,
    }

    #[async_trait]
    impl Transport for FakeRemote {
        async fn probe(&self, channel: &ControlChannel) -> bool {
            channel.socket_exists()
        }

        async fn open_master(&self, channel: &ControlChannel) -> Result<(), ConnectionError> {
            if self.unreachable {
                return Err(ConnectionError::EstablishFailed {
                    host: channel.host().to_string(),
                    status: "exit status: 255".into(),
                });
            }
            std::fs::write(channel.socket(), b"").unwrap();
            Ok(())
        }

        async fn capture(
            &self,
            _session: &SessionHandle,
            script: &str,
        ) -> Result<CommandOutput, ConnectionError> {
            self.scripts.lock().unwrap().push(script.to_string());
            if script == transport::home_script() {
                return Ok(CommandOutput {
                    status: 0,
                    stdout: format!("{}\n@@SLINK_HOME@@/srv/me@@SLINK_HOME@@\n", self.banner),
                });
            }
            if let Some(dir) = script.strip_prefix("test -d ") {
                let dir = dir.trim_matches('\'');
                let status = if self.existing_dirs.iter().any(|d| d == Path::new(dir)) {
                    0
                } else {
                    1
                };
                return Ok(CommandOutput {
                    status,
                    stdout: String::new(),
                });
            }
            Ok(CommandOutput {
                status: 0,
                stdout: String::new(),
            })
        }

        async fn attach(
            &self,
            _session: &SessionHandle,
            request: Attach,
        ) -> Result<i32, ConnectionError> {
            self.attached.lock().unwrap().push(request);
            Ok(self.exit_status)
        }
    }

    #[async_trait]
    impl FileSync for FakeRemote {
        async fn sync_tree(
            &self,
            _session: &SessionHandle,
            direction: SyncDirection,
            pair: &MirrorPath,
        ) -> io::Result<i32> {
            self.transfers
                .lock()
                .unwrap()
                .push((direction, pair.clone(), true));
            Ok(self.exit_status)
        }

        async fn copy_file(
            &self,
            _session: &SessionHandle,
            direction: SyncDirection,
            pair: &MirrorPath,
        ) -> io::Result<i32> {
            self.transfers
                .lock()
                .unwrap()
                .push((direction, pair.clone(), false));
            Ok(self.exit_status)
        }
    }

    struct Fixture {
        _dir: TempDir,
        remote: FakeRemote,
        runner: SessionRunner<FakeRemote, FakeRemote>,
    }

    fn fixture(host: Option<&str>, remote: FakeRemote) -> Fixture {
        let dir = TempDir::new().unwrap();
        let profile = Profile {
            config_dir: dir.path().to_path_buf(),
            settings: Settings::default(),
            selected: host.map(|h| Host::parse(h).unwrap()),
        };
        let local = LocalContext {
            cwd: PathBuf::from("/home/me/project"),
            home: PathBuf::from("/home/me"),
        };
        let broker = ConnectionBroker::new(remote.clone(), dir.path().join("ctl"));
        let runner = SessionRunner::new(profile, local, broker, remote.clone());
        Fixture {
            _dir: dir,
            remote,
            runner,
        }
    }

    fn exec(command: &str) -> Operation {
        Operation::Exec {
            command: command.to_string(),
        }
    }

    #[tokio::test]
    async fn test_no_host_selected() {
        let mut f = fixture(None, FakeRemote::default());
        let err = f.runner.run(exec("ls")).await.unwrap_err();
        assert!(matches!(err, SlinkError::NoHostSelected));
        assert_eq!(f.runner.state(), RunnerState::Terminal(Completion::Failure));
        assert!(f.remote.attached.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connection_error_is_terminal() {
        let remote = FakeRemote {
            unreachable: true,
            ..Default::default()
        };
        let mut f = fixture(Some("nowhere"), remote);
        let err = f.runner.run(Operation::Shell).await.unwrap_err();
        assert!(matches!(err, SlinkError::Connection(_)));
        assert_eq!(err.exit_code(), crate::error::EXIT_CONNECTION);
        assert!(f.remote.scripts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_in_existing_mirror() {
        let remote = FakeRemote {
            existing_dirs: vec![PathBuf::from("/srv/me/project")],
            ..Default::default()
        };
        let mut f = fixture(Some("devbox"), remote);
        f.runner.run(exec("cargo test")).await.unwrap();

        assert_eq!(f.runner.state(), RunnerState::Terminal(Completion::Success));
        assert_eq!(
            f.remote.attached.lock().unwrap().as_slice(),
            [Attach::Command {
                script: "cd '/srv/me/project' && cargo test".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_rc_file_output_does_not_corrupt_remote_home() {
        let remote = FakeRemote {
            existing_dirs: vec![PathBuf::from("/srv/me/project")],
            banner: "Welcome to devbox\nmotd: patch tuesday".into(),
            ..Default::default()
        };
        let mut f = fixture(Some("devbox"), remote);
        f.runner.run(exec("make")).await.unwrap();

        assert_eq!(
            f.remote.attached.lock().unwrap().as_slice(),
            [Attach::Command {
                script: "cd '/srv/me/project' && make".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_run_falls_back_when_mirror_missing() {
        let mut f = fixture(Some("devbox"), FakeRemote::default());
        f.runner.run(exec("uptime")).await.unwrap();

        // Reached Executing with the command left in the login directory
        assert_eq!(
            f.remote.attached.lock().unwrap().as_slice(),
            [Attach::Command {
                script: "uptime".into()
            }]
        );
        assert_eq!(f.runner.state(), RunnerState::Terminal(Completion::Success));
    }

    #[tokio::test]
    async fn test_shell_falls_back_to_login_shell() {
        let mut f = fixture(Some("devbox"), FakeRemote::default());
        f.runner.run(Operation::Shell).await.unwrap();
        assert_eq!(
            f.remote.attached.lock().unwrap().as_slice(),
            [Attach::Shell { script: None }]
        );
    }

    #[tokio::test]
    async fn test_remote_exit_status_propagates() {
        let remote = FakeRemote {
            exit_status: 7,
            ..Default::default()
        };
        let mut f = fixture(Some("devbox"), remote);
        let err = f.runner.run(exec("exit 7")).await.unwrap_err();
        assert!(matches!(err, SlinkError::RemoteExecutionFailure(7)));
        assert_eq!(err.exit_code(), 7);
        assert_eq!(f.runner.state(), RunnerState::Terminal(Completion::Failure));
    }

    #[tokio::test]
    async fn test_sync_up_creates_remote_dir_first() {
        let mut f = fixture(Some("devbox"), FakeRemote::default());
        f.runner
            .run(Operation::Sync(SyncDirection::Up))
            .await
            .unwrap();

        let scripts = f.remote.scripts.lock().unwrap().clone();
        assert_eq!(scripts.last().unwrap(), "mkdir -p '/srv/me/project'");

        let transfers = f.remote.transfers.lock().unwrap();
        let (direction, pair, tree) = &transfers[0];
        assert_eq!(*direction, SyncDirection::Up);
        assert!(*tree);
        assert_eq!(pair.local, PathBuf::from("/home/me/project"));
        assert_eq!(pair.remote, PathBuf::from("/srv/me/project"));
    }

    #[tokio::test]
    async fn test_sync_down_does_not_touch_remote() {
        let mut f = fixture(Some("devbox"), FakeRemote::default());
        f.runner
            .run(Operation::Sync(SyncDirection::Down))
            .await
            .unwrap();
        assert!(!f
            .remote
            .scripts
            .lock()
            .unwrap()
            .iter()
            .any(|s| s.starts_with("mkdir")));
        assert_eq!(f.remote.transfers.lock().unwrap()[0].0, SyncDirection::Down);
    }

    #[tokio::test]
    async fn test_sync_failure_status_propagates() {
        let remote = FakeRemote {
            exit_status: 23,
            ..Default::default()
        };
        let mut f = fixture(Some("devbox"), remote);
        let err = f
            .runner
            .run(Operation::Sync(SyncDirection::Down))
            .await
            .unwrap_err();
        assert!(matches!(err, SlinkError::SyncFailure(23)));
    }

    #[tokio::test]
    async fn test_upload_mirrors_relative_file() {
        let mut f = fixture(Some("devbox"), FakeRemote::default());
        f.runner
            .run(Operation::Upload {
                path: PathBuf::from("src/../Cargo.toml"),
            })
            .await
            .unwrap();

        let transfers = f.remote.transfers.lock().unwrap();
        let (direction, pair, tree) = &transfers[0];
        assert_eq!(*direction, SyncDirection::Up);
        assert!(!*tree);
        assert_eq!(pair.local, PathBuf::from("/home/me/project/Cargo.toml"));
        assert_eq!(pair.remote, PathBuf::from("/srv/me/project/Cargo.toml"));
        assert!(f
            .remote
            .scripts
            .lock()
            .unwrap()
            .contains(&"mkdir -p '/srv/me/project'".to_string()));
    }

    #[tokio::test]
    async fn test_configured_remote_home_skips_query() {
        let mut f = fixture(Some("devbox"), FakeRemote::default());
        f.runner.profile.settings.remote_home = Some(PathBuf::from("/data/me"));
        f.runner
            .run(Operation::Sync(SyncDirection::Down))
            .await
            .unwrap();

        assert!(!f
            .remote
            .scripts
            .lock()
            .unwrap()
            .iter()
            .any(|s| s.starts_with("printf")));
        assert_eq!(
            f.remote.transfers.lock().unwrap()[0].1.remote,
            PathBuf::from("/data/me/project")
        );
    }

    #[tokio::test]
    async fn test_forward_skips_path_resolution() {
        let mut f = fixture(Some("devbox"), FakeRemote::default());
        f.runner
            .run(Operation::Forward { ports: vec![8080] })
            .await
            .unwrap();
        assert!(f.remote.scripts.lock().unwrap().is_empty());
        assert_eq!(
            f.remote.attached.lock().unwrap().as_slice(),
            [Attach::Forward { ports: vec![8080] }]
        );
    }
}
