//! Per-node run lock.
//!
//! The keyring "no overwrite" check is a plain existence test, so two
//! controllers working on the same node could race. Mutating commands hold
//! this lock for their whole run; a second invocation fails instead of
//! interleaving.

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

/// Exclusive flock(2) on the node lock file. Released on drop.
pub struct NodeLock {
    _file: File,
}

impl NodeLock {
    /// Take the lock without blocking.
    pub fn acquire(path: &Path) -> Result<Self> {
        match Self::try_acquire(path)? {
            Some(lock) => Ok(lock),
            None => bail!(
                "another ceph-nodecfg run holds {}; wait for it to finish",
                path.display()
            ),
        }
    }

    /// `Ok(None)` when another process holds the lock.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create lock directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("open lock file {}", path.display()))?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { _file: file })),
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            // fs2 on Linux may report EAGAIN as Other
            Err(ref e) if e.raw_os_error() == Some(11) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("lock {}", path.display())),
        }
    }
}
