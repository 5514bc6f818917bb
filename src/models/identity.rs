use crate::error::{Error, Result};

/// Which cluster, and which node within it, an operation targets.
///
/// Both names end up as file-name components (`<cluster>.conf`,
/// `<cluster>-<host>.keyring`), so the accessors only hand out values that
/// cannot leave the directory they are joined onto.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterIdentity {
    pub cluster_name: Option<String>,
    pub host_name: Option<String>,
}

impl ClusterIdentity {
    pub fn new(cluster_name: &str, host_name: Option<&str>) -> Self {
        Self {
            cluster_name: Some(cluster_name.to_string()),
            host_name: host_name.map(str::to_string),
        }
    }

    pub fn cluster_name(&self) -> Result<&str> {
        checked("cluster name", self.cluster_name.as_deref())
    }

    pub fn host_name(&self) -> Result<&str> {
        checked("host name", self.host_name.as_deref())
    }
}

fn checked<'a>(what: &'static str, value: Option<&'a str>) -> Result<&'a str> {
    let value = value
        .filter(|v| !v.trim().is_empty())
        .ok_or(Error::MissingIdentity(what))?;
    validate_component(what, value)?;
    Ok(value)
}

/// Reject anything that is not a plain file-name fragment.
pub fn validate_component(what: &'static str, value: &str) -> Result<()> {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');
    if !plain || value.contains("..") || value.starts_with('.') {
        return Err(Error::InvalidIdentity {
            what,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_strings_count_as_missing() {
        let id = ClusterIdentity {
            cluster_name: Some(String::new()),
            host_name: Some("  ".to_string()),
        };
        assert!(matches!(id.cluster_name(), Err(Error::MissingIdentity(_))));
        assert!(matches!(id.host_name(), Err(Error::MissingIdentity(_))));
    }

    #[test]
    fn test_new() {
        let id = ClusterIdentity::new("ceph", Some("node1"));
        assert_eq!(id.cluster_name().unwrap(), "ceph");
        assert_eq!(id.host_name().unwrap(), "node1");
    }

    #[test]
    fn test_accepts_plain_names() {
        for name in ["ceph", "backup-2", "site_a.prod", "CEPH01"] {
            assert!(validate_component("cluster name", name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_rejects_traversal_and_separators() {
        for bad in [
            "../../../victim",
            "..",
            "a/b",
            "/etc",
            "a\\b",
            "ceph\0x",
            "two words",
            ".hidden",
            "x..y",
        ] {
            let id = ClusterIdentity::new(bad, Some(bad));
            assert!(
                matches!(id.cluster_name(), Err(Error::InvalidIdentity { .. })),
                "cluster {:?}",
                bad
            );
            assert!(
                matches!(id.host_name(), Err(Error::InvalidIdentity { .. })),
                "host {:?}",
                bad
            );
        }
    }
}
