//! slink-cli: Command-line interface for slink
//!
//! Provides the `slink` CLI for selecting a remote host and running shells,
//! commands and transfers against the mirror of the current directory.

pub mod commands;
pub mod output;
