//! slink CLI
//!
//! Treats one remote machine as a mirror of the local filesystem:
//! - `use` / `current` select and show the remote host
//! - `go` / `run` open a shell or run a command in the mirror of `$PWD`
//! - `sync`, `upload`, `download` move files between the two trees
//! - `forward` tunnels local ports to the remote

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slink::commands;
use slink::output::print_error;
use slink_core::config::{self, Profile};
use slink_core::error::{ConfigError, EXIT_CONFIG, EXIT_FAILURE};
use slink_core::{Operation, SlinkError, SyncDirection};

#[derive(Parser)]
#[command(name = "slink")]
#[command(author, version, about = "Interact with a remote machine that mirrors your local filesystem")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration directory
    #[arg(long, global = true, env = "SLINK_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update which remote machine slink uses
    Use {
        /// The hostname of the remote machine
        host: String,
    },

    /// Print the remote machine slink uses
    Current,

    /// Open a shell on the remote, in the mirror of the current directory
    Go,

    /// Run a command on the remote, in the mirror of the current directory
    Run {
        /// Command to run on the remote machine
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Sync the current directory to or from the remote
    Sync {
        #[command(subcommand)]
        direction: Direction,
    },

    /// Upload a file to the remote
    Upload {
        /// Path to local file
        path: PathBuf,
    },

    /// Download a file from the remote
    Download {
        /// Path of the file, as it is mirrored locally
        path: PathBuf,
    },

    /// Forward local ports to the same ports on the remote
    Forward {
        /// Ports to forward
        #[arg(required = true)]
        ports: Vec<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum Direction {
    /// Sync directory up to the remote machine
    Up,
    /// Sync directory down from the remote machine
    Down,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Show config directory path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = exit_code_for(&err);
            match err.downcast_ref::<SlinkError>() {
                // The child already reported its own failure
                Some(e) if e.is_propagated_status() => tracing::debug!("{}", e),
                // Already carries its cause in the message
                Some(e) => print_error(&e.to_string()),
                None => print_error(&format!("{:#}", err)),
            }
            ExitCode::from(u8::try_from(code).unwrap_or(EXIT_FAILURE as u8))
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => config::default_config_dir().map_err(SlinkError::from)?,
    };

    let operation = match cli.command {
        Commands::Use { host } => return commands::use_command(&config_dir, &host),
        Commands::Current => return commands::current_command(&config_dir),
        Commands::Config { action } => {
            return match action {
                ConfigAction::Show => commands::config_show(&config_dir),
                ConfigAction::Path => {
                    commands::config_path(&config_dir);
                    Ok(())
                }
                ConfigAction::Init { force } => commands::config_init(&config_dir, force),
            };
        }

        Commands::Go => Operation::Shell,
        Commands::Run { command } => Operation::Exec {
            command: command.join(" "),
        },
        Commands::Sync { direction } => Operation::Sync(match direction {
            Direction::Up => SyncDirection::Up,
            Direction::Down => SyncDirection::Down,
        }),
        Commands::Upload { path } => Operation::Upload { path },
        Commands::Download { path } => Operation::Download { path },
        Commands::Forward { ports } => Operation::Forward { ports },
    };

    let profile = Profile::load(&config_dir).map_err(SlinkError::from)?;
    commands::run_operation(profile, operation).await
}

/// Exit code for a failed command
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(err) = err.downcast_ref::<SlinkError>() {
        err.exit_code()
    } else if err.downcast_ref::<ConfigError>().is_some() {
        EXIT_CONFIG
    } else {
        EXIT_FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slink_core::error::{ConnectionError, EXIT_CONNECTION, EXIT_NO_HOST};

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_joins_trailing_words() {
        let cli = Cli::parse_from(["slink", "run", "ls", "-la", "/tmp"]);
        match cli.command {
            Commands::Run { command } => assert_eq!(command.join(" "), "ls -la /tmp"),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_keeps_quoted_command_whole() {
        let cli = Cli::parse_from(["slink", "run", "make test && echo ok"]);
        match cli.command {
            Commands::Run { command } => assert_eq!(command, vec!["make test && echo ok"]),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_forward_rejects_non_numeric_port() {
        assert!(Cli::try_parse_from(["slink", "forward", "http"]).is_err());
        assert!(Cli::try_parse_from(["slink", "forward", "70000"]).is_err());
    }

    #[test]
    fn test_exit_code_mapping() {
        let no_host = anyhow::Error::from(SlinkError::NoHostSelected);
        assert_eq!(exit_code_for(&no_host), EXIT_NO_HOST);

        let conn = anyhow::Error::from(SlinkError::from(ConnectionError::Lost {
            host: "h".into(),
            reason: "reset".into(),
        }));
        assert_eq!(exit_code_for(&conn), EXIT_CONNECTION);

        let remote = anyhow::Error::from(SlinkError::RemoteExecutionFailure(7));
        assert_eq!(exit_code_for(&remote), 7);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&other), EXIT_FAILURE);
    }
}
