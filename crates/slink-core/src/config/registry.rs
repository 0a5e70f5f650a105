//! Selected-host persistence
//!
//! The host chosen with `slink use` is stored as a single line in the
//! `hostname` file of the configuration directory.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::Host;

/// File holding the selected host
const HOST_FILE_NAME: &str = "hostname";

/// Reads and writes the selected host
#[derive(Debug, Clone)]
pub struct HostRegistry {
    path: PathBuf,
}

impl HostRegistry {
    /// Registry backed by `config_dir/hostname`
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join(HOST_FILE_NAME),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the selected host.
    ///
    /// Returns `Ok(None)` if nothing has been selected yet (missing or blank
    /// file).
    pub fn load(&self) -> Result<Option<Host>, ConfigError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::File {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let line = contents.lines().next().unwrap_or("").trim();
        if line.is_empty() {
            return Ok(None);
        }
        Host::parse(line).map(Some)
    }

    /// Persist `host` as the selected host.
    ///
    /// Writes a sibling temporary file and renames it over the old one so a
    /// concurrent reader never sees a half-written host.
    pub fn store(&self, host: &Host) -> Result<(), ConfigError> {
        let file_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ConfigError::File { path, source }
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(file_error(parent))?;
        }

        let tmp = self
            .path
            .with_extension(format!("tmp.{}", std::process::id()));
        {
            let mut file = fs::File::create(&tmp).map_err(file_error(&tmp))?;
            writeln!(file, "{}", host).map_err(file_error(&tmp))?;
            file.sync_all().map_err(file_error(&tmp))?;
        }
        fs::rename(&tmp, &self.path).map_err(file_error(&self.path))?;

        tracing::info!("Selected host {} ({:?})", host, self.path);
        Ok(())
    }
}
