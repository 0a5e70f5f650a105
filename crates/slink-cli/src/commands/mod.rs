//! CLI command implementations

mod config;
mod host;
mod session;

pub use config::{config_init, config_path, config_show};
pub use host::{current_command, use_command};
pub use session::run_operation;
