//! Lexical path checks used before destructive filesystem operations.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by resolving `.` and `..` components without filesystem access.
pub fn normalize(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                components.pop();
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Check if `path` is strictly below `root` after normalization.
pub fn is_strictly_within(path: &Path, root: &Path) -> bool {
    let normalized = normalize(path);
    let root_normalized = normalize(root);
    normalized != root_normalized && normalized.starts_with(&root_normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_dotdot() {
        assert_eq!(
            normalize(Path::new("/var/lib/ceph/osd/../mon")),
            PathBuf::from("/var/lib/ceph/mon")
        );
    }

    #[test]
    fn test_normalize_dot() {
        assert_eq!(normalize(Path::new("/etc/./ceph")), PathBuf::from("/etc/ceph"));
    }

    #[test]
    fn test_within_child() {
        assert!(is_strictly_within(
            Path::new("/var/lib/ceph/osd/ceph-0/keyring"),
            Path::new("/var/lib/ceph/osd")
        ));
    }

    #[test]
    fn test_within_rejects_traversal() {
        assert!(!is_strictly_within(
            Path::new("/var/lib/ceph/osd/../../../etc/passwd"),
            Path::new("/var/lib/ceph/osd")
        ));
    }

    #[test]
    fn test_within_rejects_root_itself() {
        assert!(!is_strictly_within(
            Path::new("/var/lib/ceph/osd/"),
            Path::new("/var/lib/ceph/osd")
        ));
    }
}
