//! Snapshot of block devices taken once per purge run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDetails {
    #[serde(default)]
    pub mountpoint: Option<PathBuf>,
    /// GPT partition type GUID, lower-case.
    #[serde(default)]
    pub part_type: Option<String>,
}

/// One whole disk as seen by `lsblk`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskDetails {
    #[serde(default)]
    pub partitions: BTreeMap<String, PartitionDetails>,
}

/// Devices are keyed by their `/dev` path throughout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownState {
    /// Device to the `/dev/disk/by-*` links pointing at it.
    pub symlinks: BTreeMap<String, Vec<PathBuf>>,
    pub lsblk: BTreeMap<String, DiskDetails>,
    /// Device to `parted` attributes, when a parted view was supplied.
    pub parted: BTreeMap<String, BTreeMap<String, String>>,
    /// Partition to parent disk.
    pub part_parent: BTreeMap<String, String>,
    pub partitions_osd: BTreeSet<String>,
    pub partitions_journal: BTreeSet<String>,
}

impl TeardownState {
    /// Follow partition -> parent disk -> disk details -> partition details ->
    /// mount point. Any missing link yields `None`.
    pub fn mount_point(&self, partition: &str) -> Option<&Path> {
        let disk = self.part_parent.get(partition)?;
        let details = self.lsblk.get(disk)?;
        let part = details.partitions.get(partition)?;
        part.mountpoint.as_deref()
    }

    /// Mount points of every classified OSD data partition, in partition order.
    pub fn osd_mounts(&self) -> Vec<(&str, &Path)> {
        self.partitions_osd
            .iter()
            .filter_map(|p| self.mount_point(p).map(|m| (p.as_str(), m)))
            .collect()
    }
}
