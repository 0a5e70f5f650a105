//! Tool settings read from `config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Settings for the external tools slink drives
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Remote home directory; queried over the session when unset
    pub remote_home: Option<PathBuf>,

    /// Where control sockets are kept (defaults to the user cache dir)
    pub control_dir: Option<PathBuf>,

    pub ssh: SshSettings,
    pub sync: SyncSettings,
    pub copy: CopySettings,
}

/// ssh invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// ssh executable
    pub program: String,
    /// How long an idle master connection is kept, in ssh time format
    pub control_persist: String,
    /// Extra `-o` options passed to every ssh invocation
    pub options: Vec<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            control_persist: "10m".to_string(),
            options: vec![],
        }
    }
}

/// Tree synchronisation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// rsync executable
    pub program: String,
    /// Remove files on the destination that no longer exist at the source
    pub delete: bool,
    /// Patterns passed as `--exclude`
    pub exclude: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            program: "rsync".to_string(),
            delete: false,
            exclude: vec![],
        }
    }
}

/// Single-file copy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopySettings {
    /// scp executable
    pub program: String,
}

impl Default for CopySettings {
    fn default() -> Self {
        Self {
            program: "scp".to_string(),
        }
    }
}

impl Settings {
    /// Reject settings that would produce broken command lines
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, program) in [
            ("ssh.program", &self.ssh.program),
            ("sync.program", &self.sync.program),
            ("copy.program", &self.copy.program),
        ] {
            if program.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
            }
        }

        if let Some(home) = &self.remote_home {
            if !home.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "remote_home must be absolute, got {:?}",
                    home
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings = toml::from_str("[ssh]\ncontrol_persist = \"1h\"\n").unwrap();
        assert_eq!(settings.ssh.program, "ssh");
        assert_eq!(settings.ssh.control_persist, "1h");
        assert_eq!(settings.sync.program, "rsync");
        assert_eq!(settings.copy.program, "scp");
        assert!(settings.remote_home.is_none());
    }

    #[test]
    fn test_relative_remote_home_rejected() {
        let settings: Settings = toml::from_str("remote_home = \"home/me\"\n").unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_empty_program_rejected() {
        let settings: Settings = toml::from_str("[sync]\nprogram = \"\"\n").unwrap();
        assert!(settings.validate().is_err());
    }
}
