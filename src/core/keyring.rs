//! Per-role keyring lifecycle.
//!
//! [`KeyringManager::bind`] fixes a role and resolves its canonical path up
//! front, so a missing cluster or host name fails before anything touches
//! the disk. The returned [`BoundKeyring`] never overwrites an existing
//! keyring: every create/write call on an occupied path is a successful
//! no-op, and [`BoundKeyring::remove`] is the only way to free the path.

use crate::constants;
use crate::core::keyring_store;
use crate::core::paths::NodePaths;
use crate::error::{Error, IoContext, Result};
use crate::models::identity::ClusterIdentity;
use crate::models::role::Role;
use crate::util::command::{render, CommandRunner};
use crate::util::fs as node_fs;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct KeyringManager<'a> {
    paths: &'a NodePaths,
    runner: &'a dyn CommandRunner,
    authtool: String,
}

impl<'a> KeyringManager<'a> {
    pub fn new(paths: &'a NodePaths, runner: &'a dyn CommandRunner, authtool: &str) -> Self {
        Self {
            paths,
            runner,
            authtool: authtool.to_string(),
        }
    }

    pub fn bind(&self, role: Role, identity: &ClusterIdentity) -> Result<BoundKeyring<'_>> {
        let path = role.keyring_path(self.paths, identity)?;
        Ok(BoundKeyring {
            role,
            path,
            runner: self.runner,
            authtool: &self.authtool,
        })
    }

    /// Bind by role name. Unknown names fail with `InvalidRole` before
    /// any path is resolved.
    pub fn bind_name(&self, name: &str, identity: &ClusterIdentity) -> Result<BoundKeyring<'_>> {
        let role: Role = name.parse()?;
        self.bind(role, identity)
    }
}

/// A role whose keyring path has been resolved.
pub struct BoundKeyring<'m> {
    role: Role,
    path: PathBuf,
    runner: &'m dyn CommandRunner,
    authtool: &'m str,
}

impl<'m> BoundKeyring<'m> {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn principal(&self) -> &'static str {
        self.role.principal()
    }

    pub fn capabilities(&self) -> &'static [(&'static str, &'static str)] {
        self.role.capabilities()
    }

    pub fn present(&self) -> bool {
        self.path.is_file()
    }

    pub fn read(&self) -> Result<String> {
        keyring_store::read(&self.path)
    }

    /// Generate a keyring and install it at the canonical path.
    ///
    /// If a keyring is already present its content is returned unchanged and
    /// the generation tool is not run. With `secret` the tool imports it
    /// verbatim; otherwise it generates a new one. Generation happens in a
    /// scratch directory that is removed on every exit path.
    pub fn create(&self, secret: Option<&str>) -> Result<String> {
        if self.present() {
            debug!("{} keyring already present at {}", self.role, self.path.display());
            return self.read();
        }
        let workspace = tempfile::Builder::new()
            .prefix("ceph-keyring-")
            .tempdir()
            .io_context(|| "create keyring workspace".to_string())?;
        let staged = workspace.path().join("keyring");
        self.generate(&staged, secret)?;
        let content = keyring_store::read(&staged)?;
        if !self.install(&content)? {
            debug!(
                "{} keyring appeared at {} meanwhile, keeping it",
                self.role,
                self.path.display()
            );
            return self.read();
        }
        info!("created {} keyring at {}", self.role, self.path.display());
        Ok(content)
    }

    /// Persist caller-supplied keyring text. No-op if a keyring is present.
    pub fn write_content(&self, content: &str) -> Result<bool> {
        if self.present() {
            debug!("{} keyring already present, not writing", self.role);
            return Ok(true);
        }
        keyring_store::write(&self.path, content)?;
        node_fs::set_permissions(&self.path, constants::KEYRING_FILE_MODE)?;
        info!("wrote {} keyring to {}", self.role, self.path.display());
        Ok(true)
    }

    /// Build a keyring around a known secret directly at the canonical path.
    /// No-op if a keyring is present.
    pub fn write_secret(&self, secret: Option<&str>) -> Result<bool> {
        if self.present() {
            debug!("{} keyring already present, not writing", self.role);
            return Ok(true);
        }
        let secret = secret
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(Error::InvalidSecret)?;
        node_fs::ensure_parent(&self.path)?;
        self.generate(&self.path, Some(secret))?;
        info!("wrote {} keyring to {}", self.role, self.path.display());
        Ok(true)
    }

    /// Delete the keyring. Absent keyrings are left alone.
    pub fn remove(&self) -> Result<bool> {
        if !self.present() {
            return Ok(true);
        }
        info!("removing {}", self.path.display());
        fs::remove_file(&self.path).map_err(|source| Error::RemovalFailed {
            path: self.path.clone(),
            source,
        })?;
        Ok(true)
    }

    /// Generation tool argument vector for writing a keyring to `output`.
    pub fn generation_args(&self, output: &Path, secret: Option<&str>) -> Vec<String> {
        let mut args = vec![
            self.authtool.to_string(),
            "-n".to_string(),
            self.principal().to_string(),
            "--create-keyring".to_string(),
            output.display().to_string(),
        ];
        match secret.map(str::trim).filter(|s| !s.is_empty()) {
            Some(secret) => {
                args.push("--add-key".to_string());
                args.push(secret.to_string());
            }
            None => args.push("--gen-key".to_string()),
        }
        for (subsystem, permission) in self.capabilities() {
            args.push("--cap".to_string());
            args.push(subsystem.to_string());
            args.push(permission.to_string());
        }
        args
    }

    fn generate(&self, output: &Path, secret: Option<&str>) -> Result<()> {
        let args = self.generation_args(output, secret);
        let out = self.runner.run(&args)?;
        if out.success() {
            return Ok(());
        }
        Err(Error::GenerationFailed {
            command: redact(&args),
            exit_code: out.exit_code,
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }

    /// Move generated content into place without leaving a partial file at
    /// the canonical path. Returns `false` if a keyring already occupies the
    /// path; it is never replaced.
    fn install(&self, content: &str) -> Result<bool> {
        node_fs::ensure_parent(&self.path)?;
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix(".keyring-")
            .tempfile_in(parent)
            .io_context(|| format!("create temp keyring in {}", parent.display()))?;
        tmp.write_all(content.as_bytes())
            .io_context(|| "write temp keyring".to_string())?;
        tmp.flush().io_context(|| "flush temp keyring".to_string())?;
        node_fs::set_permissions(tmp.path(), constants::KEYRING_FILE_MODE)?;
        match tmp.persist_noclobber(&self.path) {
            Ok(_) => Ok(true),
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(Error::Io {
                context: format!("persist keyring {}", self.path.display()),
                source: err.error,
            }),
        }
    }
}

/// Render an argument vector with any `--add-key` value masked.
fn redact(args: &[String]) -> String {
    let mut masked = args.to_vec();
    if let Some(pos) = masked.iter().position(|a| a == "--add-key") {
        if let Some(value) = masked.get_mut(pos + 1) {
            *value = "<redacted>".to_string();
        }
    }
    render(&masked)
}
