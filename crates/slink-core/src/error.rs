//! Core error types for slink

use std::path::PathBuf;
use thiserror::Error;

/// Exit code used when no host has been selected with `slink use`
pub const EXIT_NO_HOST: i32 = 3;
/// Exit code used when the control channel could not be established
pub const EXIT_CONNECTION: i32 = 4;
/// Exit code used when a local path cannot be mirrored
pub const EXIT_PATH: i32 = 5;
/// Exit code used for unreadable or invalid configuration
pub const EXIT_CONFIG: i32 = 6;
/// Exit code for any other local failure
pub const EXIT_FAILURE: i32 = 1;

/// Convenience alias used throughout the crate
pub type SlinkResult<T> = Result<T, SlinkError>;

/// Top-level error type for slink
#[derive(Error, Debug)]
pub enum SlinkError {
    /// No host has been selected yet
    #[error("No host selected; run `slink use <hostname>` first")]
    NoHostSelected,

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Path could not be mirrored
    #[error("Path resolution error: {0}")]
    PathResolution(#[from] PathResolutionError),

    /// Remote shell or command exited non-zero
    #[error("Remote command exited with status {0}")]
    RemoteExecutionFailure(i32),

    /// External sync or copy tool exited non-zero
    #[error("Transfer tool exited with status {0}")]
    SyncFailure(i32),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SlinkError {
    /// Process exit code for this error.
    ///
    /// Remote and transfer failures carry the child's own status so the
    /// caller's shell sees exactly what the remote side reported.
    pub fn exit_code(&self) -> i32 {
        match self {
            SlinkError::NoHostSelected => EXIT_NO_HOST,
            SlinkError::Connection(_) => EXIT_CONNECTION,
            SlinkError::PathResolution(_) => EXIT_PATH,
            SlinkError::RemoteExecutionFailure(code) | SlinkError::SyncFailure(code) => *code,
            SlinkError::Config(_) => EXIT_CONFIG,
            SlinkError::Io(_) => EXIT_FAILURE,
        }
    }

    /// Whether the failure was already reported by the child process itself
    pub fn is_propagated_status(&self) -> bool {
        matches!(
            self,
            SlinkError::RemoteExecutionFailure(_) | SlinkError::SyncFailure(_)
        )
    }
}

/// Connection-related errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The master connection could not be created
    #[error("could not establish connection to {host} (ssh exited with {status})")]
    EstablishFailed { host: String, status: String },

    /// A subordinate process could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A query over an established channel failed
    #[error("connection to {host} lost: {reason}")]
    Lost { host: String, reason: String },

    /// The control-channel lock could not be taken
    #[error("control channel lock {path:?}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from mirroring a local path onto the remote
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathResolutionError {
    /// Input path is relative
    #[error("path is not absolute: {0:?}")]
    NotAbsolute(PathBuf),

    /// Input path contains `.` or `..` segments
    #[error("path is not normalized: {0:?}")]
    NotNormalized(PathBuf),

    /// Path cannot be passed through a remote shell
    #[error("path is not valid UTF-8: {0:?}")]
    NotUtf8(PathBuf),

    /// A required directory could not be determined
    #[error("could not determine {0}")]
    Unknown(&'static str),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config directory could not be determined
    #[error("could not determine the configuration directory")]
    NoConfigDir,

    /// Host string cannot be used as an ssh destination
    #[error("invalid host {0:?}")]
    InvalidHost(String),

    /// Host string carries a `:port` suffix ssh would not honour
    #[error(
        "invalid host {0:?}: ssh does not read a port from the host name; \
         set Port in ~/.ssh/config or add \"Port=<n>\" to [ssh] options"
    )]
    PortInHost(String),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Reading or writing a config file failed
    #[error("{path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
