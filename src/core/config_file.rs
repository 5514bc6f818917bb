//! Loading of the node configuration file.

use crate::error::{Error, IoContext, Result};
use crate::models::config::NodeConfig;
use std::fs;
use std::path::Path;

/// Read `path`, falling back to defaults when the file does not exist.
pub fn load(path: &Path) -> Result<NodeConfig> {
    if !path.exists() {
        return Ok(NodeConfig::default());
    }
    let content =
        fs::read_to_string(path).io_context(|| format!("read config {}", path.display()))?;
    let config: NodeConfig = toml::from_str(&content).map_err(|e| Error::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if config.tools.authtool.trim().is_empty() {
        return Err(Error::Config {
            path: path.to_path_buf(),
            message: "tools.authtool is empty".to_string(),
        });
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let cfg = load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.tools.systemctl, "systemctl");
        assert!(cfg.cluster.fsid.is_none());
    }

    #[test]
    fn test_load_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[cluster]\nfsid = \"a7f64266-0894-4f1e-a635-d0aeaca0e993\"\n\n[purge]\nservice_pattern = \"ceph-*\"\n",
        )
        .unwrap();
        let cfg = load(&path).unwrap();
        assert_eq!(
            cfg.cluster.fsid.as_deref(),
            Some("a7f64266-0894-4f1e-a635-d0aeaca0e993")
        );
        assert_eq!(cfg.purge.service_pattern, "ceph-*");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[cluster\nname = ").unwrap();
        assert!(matches!(load(&path), Err(Error::Config { .. })));
    }

    #[test]
    fn test_empty_authtool_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[tools]\nauthtool = \"\"\n").unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("tools.authtool"));
    }
}
