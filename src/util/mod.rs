//! Process, filesystem, and host utilities.

pub mod command;
pub mod fs;
pub mod hostname;
pub mod path;
pub mod privilege;
pub mod systemd;
