//! Config command implementations

use std::path::Path;

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use slink_core::config::{Profile, CONFIG_FILE_NAME};
use slink_core::SlinkError;

/// Print the configuration directory
pub fn config_path(config_dir: &Path) {
    println!("{}", config_dir.display());
}

/// Show the effective configuration
pub fn config_show(config_dir: &Path) -> Result<()> {
    let profile = Profile::load(config_dir).map_err(SlinkError::from)?;
    let path = config_dir.join(CONFIG_FILE_NAME);

    if path.exists() {
        print_info(&format!("Configuration file: {:?}", path));
    } else {
        print_warning(&format!("No configuration file at {:?}, showing defaults", path));
    }

    match &profile.selected {
        Some(host) => print_info(&format!("Selected host: {}", host)),
        None => print_info("Selected host: (none)"),
    }
    print_info(&format!("Control sockets: {:?}", profile.control_dir()));
    println!();

    let effective = toml::to_string_pretty(&profile.settings)
        .context("Failed to render configuration")?;
    println!("{}", effective);

    Ok(())
}

/// Write a commented default configuration file
pub fn config_init(config_dir: &Path, force: bool) -> Result<()> {
    let config_file = config_dir.join(CONFIG_FILE_NAME);

    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
        print_success(&format!("Created config directory: {:?}", config_dir));
    }

    if config_file.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", config_file));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    std::fs::write(&config_file, generate_default_config())
        .with_context(|| format!("Failed to write config file: {:?}", config_file))?;

    print_success(&format!("Created configuration file: {:?}", config_file));
    Ok(())
}

/// Generate default configuration content
fn generate_default_config() -> String {
    r#"# slink configuration

# Remote home directory. When unset, the remote $HOME is used.
# remote_home = "/home/me"

# Directory for ssh control sockets (defaults to the user cache directory)
# control_dir = "/tmp/slink"

[ssh]
# ssh executable
program = "ssh"
# Keep idle shared connections open this long (ssh ControlPersist syntax)
control_persist = "10m"
# Extra options passed as -o to every ssh invocation
options = []

[sync]
# rsync executable
program = "rsync"
# Delete destination files missing from the source
delete = false
# Patterns passed to rsync --exclude
exclude = []

[copy]
# scp executable
program = "scp"
"#
    .to_string()
}
