//! Command handlers, one module per top-level subcommand.

pub mod config_cmd;
pub mod devices;
pub mod install;
pub mod watch;
