//! Block-device discovery for purge.
//!
//! Purge consumes a [`TeardownState`] snapshot and never looks at devices
//! itself. [`LsblkDiscovery`] builds that snapshot from `lsblk --json` and
//! the `/dev/disk/by-*` symlink trees.

use crate::constants;
use crate::error::{Error, Result};
use crate::models::teardown_state::{DiskDetails, PartitionDetails, TeardownState};
use crate::util::command::{render, CommandRunner};
use crate::util::path::normalize;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait Discovery {
    fn discover(&self) -> Result<TeardownState>;
}

/// A snapshot supplied up front.
impl Discovery for TeardownState {
    fn discover(&self) -> Result<TeardownState> {
        Ok(self.clone())
    }
}

pub struct LsblkDiscovery<'a> {
    runner: &'a dyn CommandRunner,
    lsblk: String,
    dev_disk: PathBuf,
}

impl<'a> LsblkDiscovery<'a> {
    pub fn new(runner: &'a dyn CommandRunner, lsblk: &str) -> Self {
        Self {
            runner,
            lsblk: lsblk.to_string(),
            dev_disk: PathBuf::from(constants::DEV_DISK_DIR),
        }
    }

    pub fn with_dev_disk(mut self, dev_disk: PathBuf) -> Self {
        self.dev_disk = dev_disk;
        self
    }
}

impl Discovery for LsblkDiscovery<'_> {
    fn discover(&self) -> Result<TeardownState> {
        let argv = vec![
            self.lsblk.clone(),
            "--json".to_string(),
            "--paths".to_string(),
            "--output".to_string(),
            "NAME,PKNAME,TYPE,MOUNTPOINT,PARTTYPE".to_string(),
        ];
        let output = self.runner.run(&argv)?;
        if !output.success() {
            return Err(Error::Discovery(format!(
                "'{}' exited {}: {}",
                render(&argv),
                output.exit_code,
                output.stderr.trim()
            )));
        }
        let mut state = parse_lsblk(&output.stdout)?;
        state.symlinks = scan_symlinks(&self.dev_disk);
        Ok(state)
    }
}

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    #[serde(default)]
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    mountpoint: Option<String>,
    #[serde(default)]
    parttype: Option<String>,
    #[serde(default)]
    children: Vec<LsblkDevice>,
}

/// Build the block-device view and classify partitions by GPT type.
pub fn parse_lsblk(json: &str) -> Result<TeardownState> {
    let parsed: LsblkOutput = serde_json::from_str(json)
        .map_err(|e| Error::Discovery(format!("parse lsblk output: {}", e)))?;
    let mut state = TeardownState::default();
    for disk in parsed.blockdevices {
        let mut details = DiskDetails::default();
        for part in disk.children {
            if part.kind.as_deref() != Some("part") {
                continue;
            }
            let part_type = part.parttype.map(|t| t.to_ascii_lowercase());
            match part_type.as_deref() {
                Some(constants::PTYPE_OSD_DATA) => {
                    state.partitions_osd.insert(part.name.clone());
                }
                Some(constants::PTYPE_OSD_JOURNAL) => {
                    state.partitions_journal.insert(part.name.clone());
                }
                _ => {}
            }
            state
                .part_parent
                .insert(part.name.clone(), disk.name.clone());
            details.partitions.insert(
                part.name,
                PartitionDetails {
                    mountpoint: part.mountpoint.filter(|m| !m.is_empty()).map(PathBuf::from),
                    part_type,
                },
            );
        }
        state.lsblk.insert(disk.name, details);
    }
    Ok(state)
}

/// Map device nodes to the `/dev/disk/<kind>/<link>` entries naming them.
/// Unreadable entries are skipped.
pub fn scan_symlinks(dev_disk: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut out: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let Ok(kinds) = fs::read_dir(dev_disk) else {
        debug!("no symlink tree at {}", dev_disk.display());
        return out;
    };
    for kind in kinds.flatten() {
        let Ok(links) = fs::read_dir(kind.path()) else {
            continue;
        };
        for link in links.flatten() {
            let link_path = link.path();
            let Ok(target) = fs::read_link(&link_path) else {
                continue;
            };
            let resolved = normalize(&kind.path().join(target));
            out.entry(resolved.display().to_string())
                .or_default()
                .push(link_path);
        }
    }
    for links in out.values_mut() {
        links.sort();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::command::testing::FakeRunner;
    use crate::util::command::CommandOutput;

    const LSBLK: &str = r#"{
      "blockdevices": [
        {"name": "/dev/sda", "pkname": null, "type": "disk", "mountpoint": null, "parttype": null,
         "children": [
           {"name": "/dev/sda1", "pkname": "/dev/sda", "type": "part", "mountpoint": "/", "parttype": "0fc63daf-8483-4772-8e79-3d69d8477de4"}
         ]},
        {"name": "/dev/sdb", "pkname": null, "type": "disk", "mountpoint": null, "parttype": null,
         "children": [
           {"name": "/dev/sdb1", "pkname": "/dev/sdb", "type": "part", "mountpoint": "/var/lib/ceph/osd/ceph-0", "parttype": "4FBD7E29-9D25-41B8-AFD0-062C0CEFF05D"},
           {"name": "/dev/sdb2", "pkname": "/dev/sdb", "type": "part", "mountpoint": null, "parttype": "45b0969e-9b03-4f30-b4c6-b4b80ceff106"}
         ]},
        {"name": "/dev/sr0", "type": "rom"}
      ]
    }"#;

    #[test]
    fn test_parse_lsblk_classifies_partitions() {
        let state = parse_lsblk(LSBLK).unwrap();
        assert_eq!(state.lsblk.len(), 3);
        assert!(state.partitions_osd.contains("/dev/sdb1"));
        assert!(state.partitions_journal.contains("/dev/sdb2"));
        assert!(!state.partitions_osd.contains("/dev/sda1"));
        assert_eq!(state.part_parent.get("/dev/sdb2").map(String::as_str), Some("/dev/sdb"));
        assert_eq!(
            state.mount_point("/dev/sdb1"),
            Some(Path::new("/var/lib/ceph/osd/ceph-0"))
        );
        assert_eq!(state.mount_point("/dev/sdb2"), None);
    }

    #[test]
    fn test_parse_lsblk_rejects_garbage() {
        assert!(matches!(parse_lsblk("not json"), Err(Error::Discovery(_))));
    }

    #[test]
    fn test_discover_runs_lsblk() {
        let runner = FakeRunner::new(|_| CommandOutput {
            exit_code: 0,
            stdout: LSBLK.to_string(),
            stderr: String::new(),
        });
        let dir = tempfile::TempDir::new().unwrap();
        let discovery =
            LsblkDiscovery::new(&runner, "lsblk").with_dev_disk(dir.path().join("none"));
        let state = discovery.discover().unwrap();
        assert_eq!(state.partitions_osd.len(), 1);
        assert!(state.symlinks.is_empty());
        assert_eq!(runner.calls()[0][0], "lsblk");
        assert!(runner.calls()[0].contains(&"--json".to_string()));
    }

    #[test]
    fn test_discover_nonzero_exit() {
        let runner = FakeRunner::failing(32, "lsblk: failed to access sysfs");
        let discovery = LsblkDiscovery::new(&runner, "lsblk");
        assert!(matches!(discovery.discover(), Err(Error::Discovery(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_symlinks() {
        let dir = tempfile::TempDir::new().unwrap();
        let by_id = dir.path().join("by-id");
        fs::create_dir_all(&by_id).unwrap();
        std::os::unix::fs::symlink("../../sdb1", by_id.join("wwn-0x5000-part1")).unwrap();
        let links = scan_symlinks(dir.path());
        let expected = normalize(&by_id.join("../../sdb1")).display().to_string();
        assert_eq!(links.get(&expected), Some(&vec![by_id.join("wwn-0x5000-part1")]));
    }
}
