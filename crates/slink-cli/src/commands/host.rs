//! `use` and `current` commands

use std::path::Path;

use anyhow::Result;

use crate::output::print_success;
use slink_core::config::HostRegistry;
use slink_core::{Host, SlinkError};

/// Select the host every later command talks to
pub fn use_command(config_dir: &Path, host: &str) -> Result<()> {
    let host = Host::parse(host).map_err(SlinkError::from)?;
    HostRegistry::new(config_dir)
        .store(&host)
        .map_err(SlinkError::from)?;

    print_success(&format!("Now using {}", host));
    Ok(())
}

/// Print the selected host
pub fn current_command(config_dir: &Path) -> Result<()> {
    match HostRegistry::new(config_dir)
        .load()
        .map_err(SlinkError::from)?
    {
        Some(host) => {
            println!("{}", host);
            Ok(())
        }
        None => Err(SlinkError::NoHostSelected.into()),
    }
}
