//! Data structures shared by the core and the CLI.

pub mod config;
pub mod identity;
pub mod role;
pub mod teardown_state;
