//! CLI routing and command dispatch.

use crate::constants;
use crate::core::audit_log::{self, AuditEvent};
use crate::core::file_lock::NodeLock;
use crate::core::keyring::KeyringManager;
use crate::core::paths::NodePaths;
use crate::core::{cluster_conf, config_file};
use crate::models::config::NodeConfig;
use crate::models::identity::ClusterIdentity;
use crate::util::command::SystemRunner;
use crate::util::{hostname, privilege};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;

pub mod audit;
pub mod doctor;
pub mod keyring;
pub mod purge;

/// Shared context passed to all command handlers.
pub struct CliContext {
    pub paths: NodePaths,
    pub config: NodeConfig,
    pub config_path: PathBuf,
    /// Set when the config file exists but could not be used.
    pub config_warning: Option<String>,
    pub non_interactive: bool,
    pub cluster: Option<String>,
    pub fsid: Option<String>,
    pub host: Option<String>,
    pub runner: SystemRunner,
}

impl CliContext {
    /// Cluster name from `--cluster`, then config, then an fsid lookup,
    /// then `ceph`.
    pub fn cluster_name(&self) -> Result<String> {
        if let Some(name) = self.cluster.clone().or_else(|| self.config.cluster.name.clone()) {
            return Ok(name);
        }
        if let Some(fsid) = self.fsid() {
            return match cluster_conf::cluster_for_fsid(&self.paths, &fsid)? {
                Some(name) => Ok(name),
                None => bail!(
                    "no cluster config under {} has fsid {}",
                    self.paths.etc_ceph.display(),
                    fsid
                ),
            };
        }
        Ok(constants::DEFAULT_CLUSTER_NAME.to_string())
    }

    pub fn fsid(&self) -> Option<String> {
        self.fsid.clone().or_else(|| self.config.cluster.fsid.clone())
    }

    pub fn host_name(&self) -> Option<String> {
        self.host.clone().or_else(hostname::short_hostname)
    }

    pub fn identity(&self) -> Result<ClusterIdentity> {
        Ok(ClusterIdentity {
            cluster_name: Some(self.cluster_name()?),
            host_name: self.host_name(),
        })
    }

    pub fn keyrings(&self) -> KeyringManager<'_> {
        KeyringManager::new(&self.paths, &self.runner, &self.config.tools.authtool)
    }

    /// Append to the audit trail. Failures are reported, not fatal.
    pub fn audit(&self, event: AuditEvent) {
        if let Err(e) = audit_log::record(&self.paths.audit_log, event) {
            warn!("audit log failed: {:#}", e);
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ceph-nodecfg", version, about = "Ceph node keyring management and teardown")]
pub struct Cli {
    /// Re-root every node path (for chroots and tests)
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Cluster name (overrides config)
    #[arg(long, global = true)]
    pub cluster: Option<String>,

    /// Cluster fsid, used to look up the cluster name
    #[arg(long, global = true)]
    pub fsid: Option<String>,

    /// Short host name (defaults to this machine's)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Run in non-interactive mode (no prompts, suitable for automation)
    #[arg(long, global = true, env = "CEPH_NODECFG_NON_INTERACTIVE")]
    pub non_interactive: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch the command. Checks that fail without an error (absent
    /// keyring, broken audit chain, failed diagnostics) return
    /// `ExitCode::FAILURE`.
    pub fn run(self) -> Result<ExitCode> {
        let paths = NodePaths::resolve(self.root);
        let config_path = paths.config_file(self.config.as_deref());

        // Best-effort: read-only commands like `doctor` still run on a bad config.
        let mut config_warning = None;
        let config = match config_file::load(&config_path) {
            Ok(config) => config,
            Err(e) if self.command.requires_root() => return Err(e.into()),
            Err(e) => {
                config_warning = Some(e.to_string());
                NodeConfig::default()
            }
        };

        let ctx = CliContext {
            paths,
            config,
            config_path,
            config_warning,
            non_interactive: self.non_interactive,
            cluster: self.cluster,
            fsid: self.fsid,
            host: self.host,
            runner: SystemRunner,
        };

        // Mutating commands need root and exclusive use of the node
        let _lock = if self.command.requires_root() {
            privilege::require_root(self.command.name())?;
            Some(NodeLock::acquire(&ctx.paths.lock_file)?)
        } else {
            None
        };

        match self.command {
            Commands::Keyring { command } => keyring::run(&ctx, command),
            Commands::Purge(args) => purge::run(&ctx, args).map(|()| ExitCode::SUCCESS),
            Commands::Audit { command } => audit::run(&ctx, command),
            Commands::Doctor(args) => doctor::run(&ctx, args),
        }
    }
}

pub(crate) fn exit_status(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Context rooted at `root` for cluster `ceph` on host `node1`.
#[cfg(test)]
pub(crate) fn test_context(root: &std::path::Path) -> CliContext {
    CliContext {
        paths: NodePaths::from_root(root.to_path_buf()),
        config: NodeConfig::default(),
        config_path: root.join("config.toml"),
        config_warning: None,
        non_interactive: true,
        cluster: None,
        fsid: None,
        host: Some("node1".to_string()),
        runner: SystemRunner,
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and manage role keyrings
    Keyring {
        #[command(subcommand)]
        command: keyring::KeyringCommand,
    },
    /// Tear this node down: stop services, revoke keyrings, unmount OSDs, remove state
    Purge(purge::PurgeArgs),
    /// View the audit trail
    Audit {
        #[command(subcommand)]
        command: audit::AuditCommand,
    },
    /// Diagnose installation and configuration (safe, read-only)
    Doctor(doctor::DoctorArgs),
}

impl Commands {
    /// Whether this command requires root privileges.
    pub fn requires_root(&self) -> bool {
        match self {
            Commands::Keyring { command } => command.is_mutating(),
            Commands::Purge(_) => true,
            Commands::Audit { .. } | Commands::Doctor(_) => false,
        }
    }

    /// Command name for error messages.
    pub fn name(&self) -> &str {
        match self {
            Commands::Keyring { command } => command.name(),
            Commands::Purge(_) => "purge",
            Commands::Audit { .. } => "audit",
            Commands::Doctor(_) => "doctor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_mutating_commands_require_root() {
        let cli = Cli::try_parse_from(["ceph-nodecfg", "keyring", "create", "osd"]).unwrap();
        assert!(cli.command.requires_root());
        let cli = Cli::try_parse_from(["ceph-nodecfg", "keyring", "path", "osd"]).unwrap();
        assert!(!cli.command.requires_root());
        let cli = Cli::try_parse_from(["ceph-nodecfg", "purge", "--yes"]).unwrap();
        assert!(cli.command.requires_root());
        assert_eq!(cli.command.name(), "purge");
    }

    #[test]
    fn test_cluster_name_precedence() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut ctx = test_context(dir.path());
        assert_eq!(ctx.cluster_name().unwrap(), "ceph");

        ctx.config.cluster.name = Some("fromconfig".to_string());
        assert_eq!(ctx.cluster_name().unwrap(), "fromconfig");

        ctx.cluster = Some("fromflag".to_string());
        assert_eq!(ctx.cluster_name().unwrap(), "fromflag");
    }

    #[test]
    fn test_cluster_name_from_fsid() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut ctx = test_context(dir.path());
        std::fs::create_dir_all(&ctx.paths.etc_ceph).unwrap();
        std::fs::write(
            ctx.paths.cluster_conf("backup"),
            "[global]\nfsid = 1234\n",
        )
        .unwrap();
        ctx.fsid = Some("1234".to_string());
        assert_eq!(ctx.cluster_name().unwrap(), "backup");

        ctx.fsid = Some("9999".to_string());
        assert!(ctx.cluster_name().is_err());
    }
}
