//! Ceph node credential and teardown tool.
//!
//! Manages the per-role keyrings a Ceph node needs (admin, mon, osd, mds,
//! rgw) and tears a node down to a clean state: services stopped, keyrings
//! revoked, OSD volumes unmounted, daemon state and cluster config removed.
//!
//! ## Modules
//! - `cli`: command-line handlers
//! - `core`: keyring lifecycle, teardown orchestration, audit trail
//! - `models`: roles, identities, config and discovery snapshots
//! - `util`: command execution, filesystem and host helpers

pub mod cli;
pub mod constants;
pub mod core;
pub mod error;
pub mod models;
pub mod util;
