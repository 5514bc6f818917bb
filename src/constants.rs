//! Centralized constants for node paths, principals, and permissions.

/// Cluster name used when neither the CLI nor the config file names one.
pub const DEFAULT_CLUSTER_NAME: &str = "ceph";

/// Cluster configuration directory, relative to the node root.
pub const ETC_CEPH_DIR: &str = "etc/ceph";

/// Cluster state directory, relative to the node root.
pub const LIB_CEPH_DIR: &str = "var/lib/ceph";

/// Runtime directory holding the node lock, relative to the node root.
pub const RUN_DIR: &str = "run";

/// Default location of this tool's config file, relative to the node root.
pub const DEFAULT_CONFIG_PATH: &str = "etc/ceph-nodecfg/config.toml";

/// Per-node lock file name inside the runtime directory.
pub const LOCK_FILE_NAME: &str = "ceph-nodecfg.lock";

/// Audit log file name inside the cluster state directory.
pub const AUDIT_LOG_NAME: &str = "nodecfg-audit.log";

/// Permission mode for keyring files written from supplied content.
pub const KEYRING_FILE_MODE: u32 = 0o600;

/// Permission mode for the audit log.
pub const AUDIT_LOG_MODE: u32 = 0o640;

/// Default program names for external collaborators.
pub const DEFAULT_AUTHTOOL: &str = "ceph-authtool";
pub const DEFAULT_SYSTEMCTL: &str = "systemctl";
pub const DEFAULT_UMOUNT: &str = "umount";
pub const DEFAULT_LSBLK: &str = "lsblk";

/// Unit glob stopped during purge.
pub const DEFAULT_SERVICE_PATTERN: &str = "ceph*";

/// GPT partition type GUID of an OSD data partition.
pub const PTYPE_OSD_DATA: &str = "4fbd7e29-9d25-41b8-afd0-062c0ceff05d";

/// GPT partition type GUID of an OSD journal partition.
pub const PTYPE_OSD_JOURNAL: &str = "45b0969e-9b03-4f30-b4c6-b4b80ceff106";

/// Directories under `/dev/disk` scanned for device symlinks.
pub const DEV_DISK_DIR: &str = "/dev/disk";

/// Maximum size of keyring content read from stdin (64 KiB).
pub const MAX_KEYRING_SIZE: usize = 65_536;
