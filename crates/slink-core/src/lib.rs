//! slink-core: Connection multiplexing and path mirroring for slink
//!
//! This crate provides the pieces shared by every slink command: the
//! selected-host registry, the local-to-remote path mirror, the broker that
//! keeps one multiplexed ssh control channel per host, and the runner that
//! composes them into the user-facing operations.

pub mod broker;
pub mod config;
pub mod error;
pub mod mirror;
pub mod runner;
pub mod sync;
pub mod transport;
pub mod types;

pub use broker::{ConnectionBroker, SessionHandle};
pub use error::{SlinkError, SlinkResult};
pub use mirror::{MirrorPath, MirrorRule};
pub use runner::{Operation, SessionRunner};
pub use types::{Host, RemoteDir, SyncDirection};
