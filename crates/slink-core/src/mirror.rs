//! Local-to-remote path mirroring
//!
//! A local path inside the local home directory maps to the same relative
//! location under the remote home. Anything outside home is reproduced
//! verbatim from the remote root. Paths are treated lexically: symlinks are
//! never resolved, callers canonicalize first if they need to.

use std::path::{Component, Path, PathBuf};

use crate::error::PathResolutionError;

/// Which rule produced a [`MirrorPath`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorRule {
    /// Local path is at or below the local home directory
    HomeRelative,
    /// Local path is outside home and is reused as-is
    RootRelative,
}

/// A local path paired with its remote mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorPath {
    pub local: PathBuf,
    pub remote: PathBuf,
    pub rule: MirrorRule,
}

/// Compute the remote path mirroring `local`.
///
/// All three inputs must be absolute and free of `.`/`..` segments. The
/// home match is done on whole path components, so `/home/user2` is not
/// considered to be inside `/home/user`.
pub fn resolve(
    local: &Path,
    local_home: &Path,
    remote_home: &Path,
) -> Result<MirrorPath, PathResolutionError> {
    ensure_normalized(local)?;
    ensure_normalized(local_home)?;
    ensure_normalized(remote_home)?;

    let (remote, rule) = match local.strip_prefix(local_home) {
        Ok(suffix) if suffix.as_os_str().is_empty() => {
            (remote_home.to_path_buf(), MirrorRule::HomeRelative)
        }
        Ok(suffix) => (remote_home.join(suffix), MirrorRule::HomeRelative),
        Err(_) => (local.to_path_buf(), MirrorRule::RootRelative),
    };

    Ok(MirrorPath {
        local: local.to_path_buf(),
        remote,
        rule,
    })
}

/// Lexically absolutize `path` against `base`.
///
/// `.` segments are dropped and `..` pops the previous segment, never going
/// above the root. The filesystem is not consulted.
pub fn normalize(base: &Path, path: &Path) -> Result<PathBuf, PathResolutionError> {
    if !base.is_absolute() {
        return Err(PathResolutionError::NotAbsolute(base.to_path_buf()));
    }

    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // pop() refuses to remove the root itself
                out.pop();
            }
            Component::Normal(segment) => out.push(segment),
        }
    }
    Ok(out)
}

fn ensure_normalized(path: &Path) -> Result<(), PathResolutionError> {
    if !path.is_absolute() {
        return Err(PathResolutionError::NotAbsolute(path.to_path_buf()));
    }
    if path
        .components()
        .any(|c| matches!(c, Component::CurDir | Component::ParentDir))
    {
        return Err(PathResolutionError::NotNormalized(path.to_path_buf()));
    }
    Ok(())
}
