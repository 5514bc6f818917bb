//! Domain errors for keyring and teardown operations.
//!
//! Secrets never appear in error messages. `GenerationFailed` carries the
//! tool's output streams, which the generation tool does not echo keys into.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A cluster or host name required to resolve a path is absent.
    #[error("missing cluster identity: {0} not set")]
    MissingIdentity(&'static str),

    /// A cluster or host name that cannot be used as a path component.
    #[error("invalid {what} '{value}': only [A-Za-z0-9._-] allowed and no '..'")]
    InvalidIdentity { what: &'static str, value: String },

    /// Role string outside the closed role set.
    #[error("invalid role '{0}' (expected one of: admin, mon, osd, mds, rgw)")]
    InvalidRole(String),

    #[error("keyring not found: {}", .0.display())]
    NotFound(PathBuf),

    /// External generation tool exited non-zero.
    #[error("failed executing '{command}': rc={exit_code}, stdout={stdout}, stderr={stderr}")]
    GenerationFailed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// Any other external command exited non-zero.
    #[error("failed executing '{command}': rc={exit_code}, stdout={stdout}, stderr={stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("keyring secret is invalid: secret is empty")]
    InvalidSecret,

    #[error("keyring could not be deleted: {}", path.display())]
    RemovalFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unmount of an OSD data volume exited non-zero.
    #[error("failed to unmount '{}': rc={exit_code}, stdout={stdout}, stderr={stderr}", mount_point.display())]
    UnmountFailed {
        mount_point: PathBuf,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("malformed keyring: {0}")]
    Malformed(String),

    /// Block-device discovery could not produce a snapshot.
    #[error("device discovery failed: {0}")]
    Discovery(String),

    #[error("invalid configuration {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attach a human-readable context to an `io::Error`.
pub(crate) trait IoContext<T> {
    fn io_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|source| Error::Io {
            context: f(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_failed_message_carries_streams() {
        let err = Error::GenerationFailed {
            command: "ceph-authtool -n mon.".to_string(),
            exit_code: 3,
            stdout: "out".to_string(),
            stderr: "bad caps".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("rc=3"));
        assert!(msg.contains("bad caps"));
    }

    #[test]
    fn test_io_context_wraps_source() {
        let res: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = res.io_context(|| "write /x".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "write /x");
        assert!(std::error::Error::source(&err).is_some());
    }
}
