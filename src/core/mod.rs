//! Keyring lifecycle, teardown, and the node-level plumbing they share.

pub mod audit_log;
pub mod cluster_conf;
pub mod config_file;
pub mod discovery;
pub mod file_lock;
pub mod keyring;
pub mod keyring_store;
pub mod paths;
pub mod teardown;
