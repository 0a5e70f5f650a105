//! Remote shell snippets
//!
//! Snippets run under the user's login shell, which may be fish or csh, so
//! they stick to syntax those parse too. Paths are single-quoted before being
//! embedded; user commands are passed through untouched, the way they were
//! typed.

use std::path::Path;

use crate::error::PathResolutionError;
use crate::types::RemoteDir;

/// Brackets the remote home in the output of [`home_script`]
const HOME_MARKER: &str = "@@SLINK_HOME@@";

/// Quote `s` as a single word; also valid for fish and csh
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn quote_path(path: &Path) -> Result<String, PathResolutionError> {
    path.to_str()
        .map(shell_quote)
        .ok_or_else(|| PathResolutionError::NotUtf8(path.to_path_buf()))
}

/// Script for an interactive shell in `dir`.
///
/// `None` means a plain login shell, which already starts in the login
/// directory.
pub fn shell_script(dir: &RemoteDir) -> Result<Option<String>, PathResolutionError> {
    match dir.target() {
        Some(path) => Ok(Some(format!(
            "cd {} && exec $SHELL -l",
            quote_path(path)?
        ))),
        None => Ok(None),
    }
}

/// Script running `command` in `dir`
pub fn command_script(dir: &RemoteDir, command: &str) -> Result<String, PathResolutionError> {
    match dir.target() {
        Some(path) => Ok(format!("cd {} && {}", quote_path(path)?, command)),
        None => Ok(command.to_string()),
    }
}

/// Script exiting 0 iff `path` is a directory
pub fn test_dir_script(path: &Path) -> Result<String, PathResolutionError> {
    Ok(format!("test -d {}", quote_path(path)?))
}

/// Script creating `path` and its parents
pub fn mkdir_script(path: &Path) -> Result<String, PathResolutionError> {
    Ok(format!("mkdir -p {}", quote_path(path)?))
}

/// Script printing the remote `$HOME` between markers
pub fn home_script() -> String {
    format!("printf '\\n{m}%s{m}\\n' \"$HOME\"", m = HOME_MARKER)
}

/// Extract the home directory from the output of [`home_script`].
///
/// Anything the remote rc files print around it is ignored.
pub fn parse_home(stdout: &str) -> Option<&str> {
    let mut parts = stdout.rsplitn(3, HOME_MARKER);
    let _trailer = parts.next()?;
    let home = parts.next()?;
    parts.next()?;
    Some(home)
}
