//! Read-only diagnostics for node readiness.

use crate::cli::{exit_status, CliContext};
use crate::core::cluster_conf;
use crate::models::role::Role;
use crate::util::privilege;
use anyhow::Result;
use clap::Args;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Skip the per-role keyring checks
    #[arg(long)]
    pub no_keyrings: bool,
}

#[derive(Default)]
struct Tally {
    ok: u32,
    warn: u32,
    fail: u32,
}

impl Tally {
    fn pass(&mut self, msg: String) {
        println!("  [PASS] {}", msg);
        self.ok += 1;
    }

    fn warn(&mut self, msg: String) {
        println!("  [WARN] {}", msg);
        self.warn += 1;
    }

    fn fail(&mut self, msg: String) {
        println!("  [FAIL] {}", msg);
        self.fail += 1;
    }

    /// Warnings alone do not fail the run.
    fn passed(&self) -> bool {
        self.fail == 0
    }
}

pub fn run(ctx: &CliContext, args: DoctorArgs) -> Result<ExitCode> {
    let paths = &ctx.paths;
    let tools = &ctx.config.tools;
    let mut tally = Tally::default();

    println!("Doctor: {}", paths);

    match &ctx.config_warning {
        Some(w) => tally.fail(format!("config unusable: {}", w)),
        None if ctx.config_path.exists() => {
            tally.pass(format!("config parsed: {}", ctx.config_path.display()))
        }
        None => tally.pass(format!(
            "no config at {}, using defaults",
            ctx.config_path.display()
        )),
    }

    if privilege::is_root() {
        tally.pass("running as root".to_string());
    } else {
        tally.warn("not root: keyring and purge commands will refuse to run".to_string());
    }

    for (label, program, required) in [
        ("keyring tool", &tools.authtool, true),
        ("systemctl", &tools.systemctl, false),
        ("umount", &tools.umount, false),
        ("lsblk", &tools.lsblk, false),
    ] {
        match find_program(program) {
            Some(found) => tally.pass(format!("{} available: {}", label, found.display())),
            None if required => tally.fail(format!("{} not found: {}", label, program)),
            None => tally.warn(format!("{} not found: {} (purge needs it)", label, program)),
        }
    }

    for dir in [&paths.etc_ceph, &paths.lib_ceph] {
        if dir.is_dir() {
            tally.pass(format!("state root exists: {}", dir.display()));
        } else {
            tally.warn(format!("state root missing: {}", dir.display()));
        }
    }

    let identity = match ctx.identity() {
        Ok(identity) => Some(identity),
        Err(e) => {
            tally.fail(format!("cluster identity: {:#}", e));
            None
        }
    };

    if let Some(cluster) = identity.as_ref().and_then(|id| id.cluster_name().ok()) {
        match cluster_conf::fsid_for_cluster(paths, cluster) {
            Ok(fsid) => tally.pass(format!("cluster {} fsid {}", cluster, fsid)),
            Err(e) => tally.warn(format!("cluster {}: {}", cluster, e)),
        }
        if let Ok(conf) = cluster_conf::load(&paths.cluster_conf(cluster)) {
            let hosts = conf.mon_hosts();
            if hosts.is_empty() {
                tally.warn(format!("cluster {}: no mon host configured", cluster));
            } else {
                println!("  [INFO] mon hosts: {}", hosts.join(", "));
            }
        }
    }

    if !args.no_keyrings {
        match identity {
            Some(identity) => {
                let manager = ctx.keyrings();
                for role in Role::ALL {
                    match manager.bind(role, &identity) {
                        Ok(keyring) if keyring.present() => {
                            check_keyring_mode(&mut tally, role, keyring.path())
                        }
                        Ok(keyring) => println!(
                            "  [INFO] {} keyring absent: {}",
                            role,
                            keyring.path().display()
                        ),
                        Err(e) => tally.warn(format!("{} keyring: {}", role, e)),
                    }
                }
            }
            None => println!("  [INFO] keyring checks skipped"),
        }
    }

    println!();
    println!(
        "Doctor summary: {} pass, {} warn, {} fail",
        tally.ok, tally.warn, tally.fail
    );
    Ok(exit_status(tally.passed()))
}

fn check_keyring_mode(tally: &mut Tally, role: Role, path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = fs::metadata(path) {
            let mode = meta.permissions().mode() & 0o777;
            if mode & 0o077 != 0 {
                tally.warn(format!(
                    "{} keyring readable by others: {} ({:04o})",
                    role,
                    path.display(),
                    mode
                ));
                return;
            }
        }
    }
    tally.pass(format!("{} keyring present: {}", role, path.display()));
}

/// Resolve `program` the way the shell would: paths as given, bare names on PATH.
fn find_program(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable_file(&path).then_some(path);
    }
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable_file(candidate))
}

fn is_executable_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = fs::metadata(path) {
            return (meta.permissions().mode() & 0o111) != 0;
        }
        false
    }
    #[cfg(not(unix))]
    {
        true
    }
}
