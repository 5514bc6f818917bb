//! Node teardown (purge).
//!
//! A purge is a fixed sequence of [`Phase`]s. Each phase declares its own
//! [`FailurePolicy`]: most phases log a failure and let the run continue so a
//! half-provisioned node still gets cleaned as far as possible. Volume
//! unmount is the exception. If an OSD volume cannot be unmounted the run
//! stops, because the removal phases after it would delete files backing a
//! live mount.
//!
//! Ordering: unmount precedes file removal, and file removal precedes
//! directory removal, which only ever deletes empty directories.

use crate::core::cluster_conf;
use crate::core::discovery::Discovery;
use crate::core::keyring::KeyringManager;
use crate::core::paths::NodePaths;
use crate::error::{Error, IoContext, Result};
use crate::models::config::NodeConfig;
use crate::models::identity::ClusterIdentity;
use crate::models::role::Role;
use crate::util::command::CommandRunner;
use crate::util::fs as node_fs;
use crate::util::path::is_strictly_within;
use crate::util::{hostname, systemd};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    ServiceShutdown,
    IdentityDiscovery,
    ConfigLoad,
    CredentialRevocation,
    VolumeUnmount,
    FileRemoval,
    DirectoryRemoval,
    ConfigRemoval,
}

/// What a failing phase does to the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and run the next phase.
    Continue,
    /// Stop the run and return the error.
    Abort,
}

impl Phase {
    pub const SEQUENCE: [Phase; 8] = [
        Phase::ServiceShutdown,
        Phase::IdentityDiscovery,
        Phase::ConfigLoad,
        Phase::CredentialRevocation,
        Phase::VolumeUnmount,
        Phase::FileRemoval,
        Phase::DirectoryRemoval,
        Phase::ConfigRemoval,
    ];

    pub fn failure_policy(self) -> FailurePolicy {
        match self {
            Phase::VolumeUnmount => FailurePolicy::Abort,
            Phase::ServiceShutdown
            | Phase::IdentityDiscovery
            | Phase::ConfigLoad
            | Phase::CredentialRevocation
            | Phase::FileRemoval
            | Phase::DirectoryRemoval
            | Phase::ConfigRemoval => FailurePolicy::Continue,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::ServiceShutdown => "service-shutdown",
            Phase::IdentityDiscovery => "identity-discovery",
            Phase::ConfigLoad => "config-load",
            Phase::CredentialRevocation => "credential-revocation",
            Phase::VolumeUnmount => "volume-unmount",
            Phase::FileRemoval => "file-removal",
            Phase::DirectoryRemoval => "directory-removal",
            Phase::ConfigRemoval => "config-removal",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "kebab-case")]
pub enum PhaseOutcome {
    Completed,
    /// Nothing to do, e.g. cluster name unknown.
    Skipped(String),
    /// The phase ran to the end but some items failed.
    Degraded(Vec<String>),
    /// The phase failed as a whole.
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub outcome: PhaseOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PurgeReport {
    pub cluster_name: Option<String>,
    pub host_name: Option<String>,
    pub fsid: Option<String>,
    pub mon_members: Vec<String>,
    pub phases: Vec<PhaseRecord>,
    pub removed_keyrings: Vec<Role>,
    pub unmounted: Vec<PathBuf>,
    pub removed_files: Vec<PathBuf>,
    pub removed_dirs: Vec<PathBuf>,
    /// Directories left in place because they were not empty or not removable.
    pub kept_dirs: Vec<PathBuf>,
}

impl PurgeReport {
    pub fn outcome(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases
            .iter()
            .find(|r| r.phase == phase)
            .map(|r| &r.outcome)
    }
}

/// What the caller knows about the node before the run.
#[derive(Debug, Clone, Default)]
pub struct PurgeTarget {
    pub cluster_name: Option<String>,
    pub fsid: Option<String>,
    pub host_name: Option<String>,
}

/// Result of one removal pass over a state root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalSummary {
    pub removed: Vec<PathBuf>,
    pub kept: Vec<PathBuf>,
    pub errors: Vec<String>,
}

pub struct Purger<'a> {
    paths: &'a NodePaths,
    runner: &'a dyn CommandRunner,
    config: &'a NodeConfig,
}

/// Mutable state threaded through one run.
#[derive(Default)]
struct RunState {
    identity: ClusterIdentity,
    report: PurgeReport,
}

impl<'a> Purger<'a> {
    pub fn new(
        paths: &'a NodePaths,
        runner: &'a dyn CommandRunner,
        config: &'a NodeConfig,
    ) -> Self {
        Self {
            paths,
            runner,
            config,
        }
    }

    /// Run every phase in order. Returns the first error of an aborting
    /// phase; failures of other phases are recorded in the report.
    pub fn run(&self, target: &PurgeTarget, discovery: &dyn Discovery) -> Result<PurgeReport> {
        let mut state = RunState::default();
        for phase in Phase::SEQUENCE {
            info!("purge phase {}", phase);
            let outcome = match self.run_phase(phase, target, discovery, &mut state) {
                Ok(outcome) => outcome,
                Err(e) => match phase.failure_policy() {
                    FailurePolicy::Continue => {
                        error!("phase {} failed, continuing: {}", phase, e);
                        PhaseOutcome::Failed(e.to_string())
                    }
                    FailurePolicy::Abort => {
                        error!("phase {} failed, aborting purge: {}", phase, e);
                        return Err(e);
                    }
                },
            };
            if let PhaseOutcome::Degraded(problems) = &outcome {
                warn!("phase {} finished with {} problem(s)", phase, problems.len());
            }
            state.report.phases.push(PhaseRecord { phase, outcome });
        }
        Ok(state.report)
    }

    fn run_phase(
        &self,
        phase: Phase,
        target: &PurgeTarget,
        discovery: &dyn Discovery,
        state: &mut RunState,
    ) -> Result<PhaseOutcome> {
        match phase {
            Phase::ServiceShutdown => self.shutdown_services(),
            Phase::IdentityDiscovery => self.discover_identity(target, state),
            Phase::ConfigLoad => self.load_config(state),
            Phase::CredentialRevocation => self.revoke_credentials(state),
            Phase::VolumeUnmount => self.unmount_volumes(discovery, state),
            Phase::FileRemoval => Ok(self.remove_state_files(state)),
            Phase::DirectoryRemoval => Ok(self.remove_state_dirs(state)),
            Phase::ConfigRemoval => self.remove_cluster_conf(state),
        }
    }

    fn shutdown_services(&self) -> Result<PhaseOutcome> {
        systemd::stop_units(
            self.runner,
            &self.config.tools.systemctl,
            &self.config.purge.service_pattern,
        )?;
        Ok(PhaseOutcome::Completed)
    }

    fn discover_identity(
        &self,
        target: &PurgeTarget,
        state: &mut RunState,
    ) -> Result<PhaseOutcome> {
        state.identity.host_name = target.host_name.clone().or_else(hostname::short_hostname);
        state.report.host_name = state.identity.host_name.clone();

        let cluster = match (&target.cluster_name, &target.fsid) {
            (Some(name), _) => Some(name.clone()),
            (None, Some(fsid)) => cluster_conf::cluster_for_fsid(self.paths, fsid)?,
            (None, None) => Some(crate::constants::DEFAULT_CLUSTER_NAME.to_string()),
        };
        state.identity.cluster_name = cluster.clone();
        state.report.cluster_name = cluster;
        // later phases skip whenever the name is missing or unusable
        match state.identity.cluster_name() {
            Ok(name) => {
                debug!("cluster name {}", name);
                Ok(PhaseOutcome::Completed)
            }
            Err(Error::MissingIdentity(_)) => {
                error!("cluster name not found");
                Ok(PhaseOutcome::Degraded(vec!["cluster name not found".to_string()]))
            }
            Err(e) => {
                error!("{}", e);
                Ok(PhaseOutcome::Degraded(vec![e.to_string()]))
            }
        }
    }

    fn load_config(&self, state: &mut RunState) -> Result<PhaseOutcome> {
        let Ok(cluster) = state.identity.cluster_name() else {
            return Ok(PhaseOutcome::Skipped("cluster name unknown".to_string()));
        };
        let config = cluster_conf::load(&self.paths.cluster_conf(cluster))?;
        debug!(
            "cluster {} fsid={:?} mon members={:?}",
            cluster,
            config.fsid(),
            config.mon_initial_members()
        );
        state.report.fsid = config.fsid().map(str::to_string);
        state.report.mon_members = config.mon_initial_members();
        Ok(PhaseOutcome::Completed)
    }

    fn revoke_credentials(&self, state: &mut RunState) -> Result<PhaseOutcome> {
        if state.identity.cluster_name().is_err() {
            return Ok(PhaseOutcome::Skipped("cluster name unknown".to_string()));
        }
        let manager = KeyringManager::new(self.paths, self.runner, &self.config.tools.authtool);
        let mut problems = Vec::new();
        for role in Role::REVOCATION_ORDER {
            let keyring = match manager.bind(role, &state.identity) {
                Ok(k) => k,
                Err(e) => {
                    warn!("skipping '{}' keyring: {}", role, e);
                    problems.push(format!("{}: {}", role, e));
                    continue;
                }
            };
            if !keyring.present() {
                info!("already removed '{}' keyring", role);
                continue;
            }
            info!("removing '{}' keyring", role);
            match keyring.remove() {
                Ok(_) => state.report.removed_keyrings.push(role),
                Err(e) => {
                    error!("{}", e);
                    problems.push(format!("{}: {}", role, e));
                }
            }
        }
        Ok(degraded_if(problems))
    }

    fn unmount_volumes(
        &self,
        discovery: &dyn Discovery,
        state: &mut RunState,
    ) -> Result<PhaseOutcome> {
        let devices = discovery.discover()?;
        let mounts = devices.osd_mounts();
        debug!(
            "{} of {} OSD data partitions mounted",
            mounts.len(),
            devices.partitions_osd.len()
        );
        for (partition, mount_point) in mounts {
            let argv = vec![
                self.config.tools.umount.clone(),
                mount_point.display().to_string(),
            ];
            let output = self.runner.run(&argv)?;
            if !output.success() {
                return Err(Error::UnmountFailed {
                    mount_point: mount_point.to_path_buf(),
                    exit_code: output.exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                });
            }
            info!("unmounted {} from {}", partition, mount_point.display());
            state.report.unmounted.push(mount_point.to_path_buf());
        }
        Ok(PhaseOutcome::Completed)
    }

    fn remove_state_files(&self, state: &mut RunState) -> PhaseOutcome {
        let mut problems = Vec::new();
        for root in self.paths.role_state_dirs() {
            let summary = remove_files(&root);
            state.report.removed_files.extend(summary.removed);
            problems.extend(summary.errors);
        }
        degraded_if(problems)
    }

    fn remove_state_dirs(&self, state: &mut RunState) -> PhaseOutcome {
        let mut problems = Vec::new();
        for root in self.paths.role_state_dirs() {
            let summary = remove_empty_dirs(&root);
            state.report.removed_dirs.extend(summary.removed);
            state.report.kept_dirs.extend(summary.kept);
            problems.extend(summary.errors);
        }
        degraded_if(problems)
    }

    fn remove_cluster_conf(&self, state: &mut RunState) -> Result<PhaseOutcome> {
        let Ok(cluster) = state.identity.cluster_name() else {
            return Ok(PhaseOutcome::Skipped("cluster name unknown".to_string()));
        };
        let path = self.paths.cluster_conf(cluster);
        if !node_fs::is_regular_file(&path) {
            debug!("no file found: {}", path.display());
            return Ok(PhaseOutcome::Skipped(format!("{} absent", path.display())));
        }
        debug!("removing file: {}", path.display());
        fs::remove_file(&path).io_context(|| format!("remove {}", path.display()))?;
        Ok(PhaseOutcome::Completed)
    }
}

fn degraded_if(problems: Vec<String>) -> PhaseOutcome {
    if problems.is_empty() {
        PhaseOutcome::Completed
    } else {
        PhaseOutcome::Degraded(problems)
    }
}

/// Entries below `root`, enumerated top-down: a directory's own entries
/// come before anything inside its subdirectories. Symlinks are listed as
/// files and never followed. Unreadable directories are skipped.
#[derive(Debug, Default)]
struct Walk {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

fn walk(root: &Path) -> Walk {
    let mut out = Walk::default();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                if dir != root || e.kind() != std::io::ErrorKind::NotFound {
                    debug!("cannot list {}: {}", dir.display(), e);
                }
                continue;
            }
        };
        let mut children: Vec<(PathBuf, bool)> = entries
            .flatten()
            .map(|entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                (entry.path(), is_dir)
            })
            .collect();
        children.sort();
        let mut subdirs = Vec::new();
        for (path, is_dir) in children {
            if is_dir {
                out.dirs.push(path.clone());
                subdirs.push(path);
            } else {
                out.files.push(path);
            }
        }
        // pop() takes from the back; keep lexical order on descent
        pending.extend(subdirs.into_iter().rev());
    }
    out
}

/// Delete every non-directory entry below `root`. Failures are logged and
/// collected; the pass always visits every entry.
pub fn remove_files(root: &Path) -> RemovalSummary {
    let mut summary = RemovalSummary::default();
    for file in walk(root).files {
        if !is_strictly_within(&file, root) {
            continue;
        }
        debug!("removing file: {}", file.display());
        match fs::remove_file(&file) {
            Ok(()) => summary.removed.push(file),
            Err(e) => {
                warn!("cannot remove {}: {}", file.display(), e);
                summary.errors.push(format!("{}: {}", file.display(), e));
                summary.kept.push(file);
            }
        }
    }
    summary
}

/// Remove directories below `root` that are empty at the time of the attempt.
///
/// Directories are enumerated top-down and attempted deepest first, so a
/// chain of directories emptied by [`remove_files`] disappears in one pass.
/// Non-empty directories are left in place. `root` itself is kept.
pub fn remove_empty_dirs(root: &Path) -> RemovalSummary {
    let mut summary = RemovalSummary::default();
    for dir in walk(root).dirs.into_iter().rev() {
        if !is_strictly_within(&dir, root) {
            continue;
        }
        match fs::read_dir(&dir).map(|mut entries| entries.next().is_none()) {
            Ok(true) => {}
            Ok(false) => {
                debug!("dir not empty: {}", dir.display());
                summary.kept.push(dir);
                continue;
            }
            Err(e) => {
                warn!("cannot inspect {}: {}", dir.display(), e);
                summary.errors.push(format!("{}: {}", dir.display(), e));
                summary.kept.push(dir);
                continue;
            }
        }
        info!("removing dir: {}", dir.display());
        match fs::remove_dir(&dir) {
            Ok(()) => summary.removed.push(dir),
            Err(e) => {
                warn!("cannot remove {}: {}", dir.display(), e);
                summary.errors.push(format!("{}: {}", dir.display(), e));
                summary.kept.push(dir);
            }
        }
    }
    summary
}
