//! File synchronisation collaborators
//!
//! Whole-tree sync and single-file copy are delegated to external tools
//! that ride on the session's control socket. Incremental transfer and
//! byte-level protocol are entirely theirs.

mod external;

pub use external::ExternalSync;

use async_trait::async_trait;
use std::io;

use crate::broker::SessionHandle;
use crate::mirror::MirrorPath;
use crate::types::SyncDirection;

/// Transfers between a local path and its remote mirror
#[async_trait]
pub trait FileSync: Send + Sync {
    /// Synchronise the directory tree `pair` in `direction`, returning the
    /// tool's exit code
    async fn sync_tree(
        &self,
        session: &SessionHandle,
        direction: SyncDirection,
        pair: &MirrorPath,
    ) -> io::Result<i32>;

    /// Copy the single file `pair` in `direction`, returning the tool's exit code
    async fn copy_file(
        &self,
        session: &SessionHandle,
        direction: SyncDirection,
        pair: &MirrorPath,
    ) -> io::Result<i32>;
}
