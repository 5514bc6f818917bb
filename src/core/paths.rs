//! Node path layout, optionally re-rooted for chroots and tests.

use crate::constants;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct NodePaths {
    pub root: PathBuf,
    pub etc_ceph: PathBuf,
    pub lib_ceph: PathBuf,
    pub lock_file: PathBuf,
    pub audit_log: PathBuf,
    pub default_config: PathBuf,
}

impl NodePaths {
    /// Resolve the node root from CLI arg, env var, or `/`.
    pub fn resolve(root_arg: Option<PathBuf>) -> Self {
        if let Some(root) = root_arg {
            return Self::from_root(root);
        }
        if let Ok(root) = env::var("CEPH_NODECFG_ROOT") {
            if !root.is_empty() {
                return Self::from_root(PathBuf::from(root));
            }
        }
        Self::from_root(PathBuf::from("/"))
    }

    pub fn from_root(root: PathBuf) -> Self {
        let etc_ceph = root.join(constants::ETC_CEPH_DIR);
        let lib_ceph = root.join(constants::LIB_CEPH_DIR);
        let lock_file = root
            .join(constants::RUN_DIR)
            .join(constants::LOCK_FILE_NAME);
        let audit_log = lib_ceph.join(constants::AUDIT_LOG_NAME);
        let default_config = root.join(constants::DEFAULT_CONFIG_PATH);
        Self {
            root,
            etc_ceph,
            lib_ceph,
            lock_file,
            audit_log,
            default_config,
        }
    }

    /// `bootstrap-<kind>` directory holding a bootstrap keyring.
    pub fn bootstrap_dir(&self, kind: &str) -> PathBuf {
        self.lib_ceph.join(format!("bootstrap-{}", kind))
    }

    /// Per-role daemon state roots emptied by purge, in removal order.
    pub fn role_state_dirs(&self) -> [PathBuf; 4] {
        ["mds", "rgw", "osd", "mon"].map(|kind| self.lib_ceph.join(kind))
    }

    /// `<etc>/<cluster>.conf`
    pub fn cluster_conf(&self, cluster: &str) -> PathBuf {
        self.etc_ceph.join(format!("{}.conf", cluster))
    }

    /// Config file location from CLI arg, env var, or the default under root.
    pub fn config_file(&self, config_arg: Option<&Path>) -> PathBuf {
        if let Some(path) = config_arg {
            return path.to_path_buf();
        }
        if let Ok(path) = env::var("CEPH_NODECFG_CONFIG") {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        self.default_config.clone()
    }
}

impl std::fmt::Display for NodePaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node@{}", self.root.display())
    }
}
