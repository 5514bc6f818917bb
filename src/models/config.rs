//! Node configuration file model (`config.toml`).

use crate::constants;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub cluster: ClusterSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub purge: PurgeSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSection {
    /// Cluster name; `ceph` when unset and no fsid lookup applies.
    #[serde(default)]
    pub name: Option<String>,

    /// Cluster uuid, used to find the cluster name from `<etc>/*.conf`.
    #[serde(default)]
    pub fsid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_authtool")]
    pub authtool: String,
    #[serde(default = "default_systemctl")]
    pub systemctl: String,
    #[serde(default = "default_umount")]
    pub umount: String,
    #[serde(default = "default_lsblk")]
    pub lsblk: String,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            authtool: default_authtool(),
            systemctl: default_systemctl(),
            umount: default_umount(),
            lsblk: default_lsblk(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeSection {
    /// Unit pattern stopped before teardown.
    #[serde(default = "default_service_pattern")]
    pub service_pattern: String,
}

impl Default for PurgeSection {
    fn default() -> Self {
        Self {
            service_pattern: default_service_pattern(),
        }
    }
}

fn default_authtool() -> String {
    constants::DEFAULT_AUTHTOOL.to_string()
}

fn default_systemctl() -> String {
    constants::DEFAULT_SYSTEMCTL.to_string()
}

fn default_umount() -> String {
    constants::DEFAULT_UMOUNT.to_string()
}

fn default_lsblk() -> String {
    constants::DEFAULT_LSBLK.to_string()
}

fn default_service_pattern() -> String {
    constants::DEFAULT_SERVICE_PATTERN.to_string()
}
