//! Read-only access to `<etc>/<cluster>.conf`.
//!
//! Only what purge and identity resolution need: the `[global]` fsid and
//! monitor membership. Option names are matched the way the cluster does,
//! with `_` and runs of spaces treated as one separator.

use crate::core::paths::NodePaths;
use crate::error::{Error, IoContext, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterConfig {
    pub sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ClusterConfig {
    pub fn get(&self, section: &str, option: &str) -> Option<&str> {
        self.sections
            .get(section)?
            .get(&normalize_key(option))
            .map(String::as_str)
    }

    pub fn fsid(&self) -> Option<&str> {
        self.get("global", "fsid")
    }

    pub fn mon_initial_members(&self) -> Vec<String> {
        split_list(self.get("global", "mon initial members"))
    }

    pub fn mon_hosts(&self) -> Vec<String> {
        split_list(self.get("global", "mon host"))
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn normalize_key(key: &str) -> String {
    key.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse INI-style content. Comments start with `#` or `;`.
pub fn parse(content: &str) -> ClusterConfig {
    let mut config = ClusterConfig::default();
    let mut current: Option<String> = None;
    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            config.sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let (Some(section), Some((key, value))) = (current.as_ref(), line.split_once('=')) else {
            continue;
        };
        config
            .sections
            .entry(section.clone())
            .or_default()
            .insert(normalize_key(key), value.trim().to_string());
    }
    config
}

pub fn load(path: &Path) -> Result<ClusterConfig> {
    if !path.is_file() {
        return Err(Error::Config {
            path: path.to_path_buf(),
            message: "cluster config file does not exist".to_string(),
        });
    }
    let content = fs::read_to_string(path)
        .io_context(|| format!("read cluster config {}", path.display()))?;
    Ok(parse(&content))
}

/// Cluster uuid recorded in `<cluster>.conf`.
pub fn fsid_for_cluster(paths: &NodePaths, cluster: &str) -> Result<String> {
    let path = paths.cluster_conf(cluster);
    let config = load(&path)?;
    config.fsid().map(str::to_string).ok_or(Error::Config {
        path,
        message: "cluster config file does not set fsid".to_string(),
    })
}

/// Find the cluster whose config file carries `fsid`.
pub fn cluster_for_fsid(paths: &NodePaths, fsid: &str) -> Result<Option<String>> {
    if !paths.etc_ceph.is_dir() {
        return Ok(None);
    }
    let dir = fs::read_dir(&paths.etc_ceph)
        .io_context(|| format!("list {}", paths.etc_ceph.display()))?;
    let mut names = Vec::new();
    for entry in dir {
        let entry = entry.io_context(|| format!("list {}", paths.etc_ceph.display()))?;
        let path = entry.path();
        let Some(name) = path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_suffix(".conf"))
        else {
            continue;
        };
        if name.is_empty() || !path.is_file() {
            continue;
        }
        names.push(name.to_string());
    }
    names.sort();
    for name in names {
        match load(&paths.cluster_conf(&name)) {
            Ok(config) if config.fsid().map(|f| f.eq_ignore_ascii_case(fsid)) == Some(true) => {
                return Ok(Some(name));
            }
            Ok(_) => {}
            Err(e) => debug!("skipping {}: {}", name, e),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONF: &str = "\
# cluster config
[global]
fsid = 1f1b4f3a-8c2e-4f43-9d6e-1a2b3c4d5e6f
mon_initial_members = node1, node2,node3
mon host = 10.0.0.1 10.0.0.2
; legacy
[osd]
osd journal size = 1024
";

    #[test]
    fn test_parse_global() {
        let config = parse(CONF);
        assert_eq!(config.fsid(), Some("1f1b4f3a-8c2e-4f43-9d6e-1a2b3c4d5e6f"));
        assert_eq!(config.mon_initial_members(), vec!["node1", "node2", "node3"]);
        assert_eq!(config.mon_hosts(), vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(config.get("osd", "osd_journal_size"), Some("1024"));
    }

    #[test]
    fn test_lines_before_section_ignored() {
        let config = parse("fsid = x\n[global]\n");
        assert_eq!(config.fsid(), None);
    }

    #[test]
    fn test_fsid_lookup_both_ways() {
        let dir = TempDir::new().unwrap();
        let paths = NodePaths::from_root(dir.path().to_path_buf());
        fs::create_dir_all(&paths.etc_ceph).unwrap();
        fs::write(paths.cluster_conf("backup"), CONF).unwrap();
        fs::write(paths.cluster_conf("other"), "[global]\nfsid = 00000000\n").unwrap();
        fs::write(paths.etc_ceph.join("rbdmap"), "").unwrap();

        assert_eq!(
            fsid_for_cluster(&paths, "backup").unwrap(),
            "1f1b4f3a-8c2e-4f43-9d6e-1a2b3c4d5e6f"
        );
        assert_eq!(
            cluster_for_fsid(&paths, "1F1B4F3A-8C2E-4F43-9D6E-1A2B3C4D5E6F").unwrap(),
            Some("backup".to_string())
        );
        assert_eq!(cluster_for_fsid(&paths, "ffff").unwrap(), None);
    }

    #[test]
    fn test_missing_config_is_error() {
        let dir = TempDir::new().unwrap();
        let paths = NodePaths::from_root(dir.path().to_path_buf());
        assert!(matches!(
            fsid_for_cluster(&paths, "ceph"),
            Err(Error::Config { .. })
        ));
        assert_eq!(cluster_for_fsid(&paths, "x").unwrap(), None);
    }
}
