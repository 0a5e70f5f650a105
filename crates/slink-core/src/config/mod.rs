//! Configuration management for slink
//!
//! Two files live in the configuration directory: `hostname`, holding the
//! currently selected host, and the optional `config.toml` with tool
//! settings. Both are read once at process start into a [`Profile`].

mod registry;
mod settings;

pub use registry::HostRegistry;
pub use settings::{CopySettings, Settings, SshSettings, SyncSettings};

use crate::error::ConfigError;
use crate::types::Host;
use std::path::{Path, PathBuf};

/// Settings file name inside the configuration directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the default configuration directory
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("slink"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Get the default directory for control-channel sockets
pub fn default_control_dir(config_dir: &Path) -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("slink"))
        .unwrap_or_else(|| config_dir.join("control"))
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::File {
        path: path.to_path_buf(),
        source,
    })?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::File {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, content).map_err(|source| ConfigError::File {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

/// Everything loaded from the configuration directory at startup
#[derive(Debug, Clone)]
pub struct Profile {
    /// Directory the profile was loaded from
    pub config_dir: PathBuf,
    /// Tool settings (defaults when `config.toml` is absent)
    pub settings: Settings,
    /// Host chosen with `slink use`, if any
    pub selected: Option<Host>,
}

impl Profile {
    /// Load settings and the selected host from `config_dir`
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let settings = if config_path.exists() {
            load_config::<Settings>(&config_path)?
        } else {
            tracing::debug!("No settings at {:?}, using defaults", config_path);
            Settings::default()
        };
        settings.validate()?;

        let selected = HostRegistry::new(config_dir).load()?;

        Ok(Self {
            config_dir: config_dir.to_path_buf(),
            settings,
            selected,
        })
    }

    /// Directory holding control-channel sockets and their lock files
    pub fn control_dir(&self) -> PathBuf {
        self.settings
            .control_dir
            .clone()
            .unwrap_or_else(|| default_control_dir(&self.config_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_profile_defaults_in_empty_dir() {
        let dir = TempDir::new().unwrap();
        let profile = Profile::load(dir.path()).unwrap();
        assert!(profile.selected.is_none());
        assert_eq!(profile.settings.ssh.program, "ssh");
    }

    #[test]
    fn test_profile_reads_host_and_settings() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("hostname"), "devbox\n").unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "control_dir = \"/tmp/slink-test\"\n\n[sync]\ndelete = true\n",
        )
        .unwrap();

        let profile = Profile::load(dir.path()).unwrap();
        assert_eq!(profile.selected.as_ref().unwrap().as_str(), "devbox");
        assert!(profile.settings.sync.delete);
        assert_eq!(profile.control_dir(), PathBuf::from("/tmp/slink-test"));
    }

    #[test]
    fn test_profile_rejects_malformed_settings() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[ssh\nprogram=").unwrap();
        assert!(matches!(
            Profile::load(dir.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_save_and_load_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut settings = Settings::default();
        settings.sync.exclude = vec!["target".to_string()];

        save_config(&path, &settings).unwrap();
        let loaded: Settings = load_config(&path).unwrap();
        assert_eq!(loaded.sync.exclude, vec!["target".to_string()]);
    }
}
