use crate::error::{IoContext, Result};
use std::fs;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Create the parent directory of `path` if it does not exist.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            fs::create_dir_all(parent)
                .io_context(|| format!("create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let perm = fs::Permissions::from_mode(mode);
        fs::set_permissions(path, perm)
            .io_context(|| format!("set permissions {:o} on {}", mode, path.display()))?;
    }
    Ok(())
}

/// Regular file check that does not follow symlinks.
pub fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_parent_creates_nested() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a/b/c.keyring");
        ensure_parent(&target).unwrap();
        assert!(dir.path().join("a/b").is_dir());
        assert!(!target.exists());
    }

    #[test]
    fn test_is_regular_file_rejects_dirs_and_symlinks() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, "x").unwrap();
        assert!(is_regular_file(&file));
        assert!(!is_regular_file(dir.path()));
        #[cfg(unix)]
        {
            let link = dir.path().join("l");
            std::os::unix::fs::symlink(&file, &link).unwrap();
            assert!(!is_regular_file(&link));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_set_permissions() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("k");
        fs::write(&file, "x").unwrap();
        set_permissions(&file, 0o600).unwrap();
        let mode = fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
