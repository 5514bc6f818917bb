//! External process execution.
//!
//! Every external program this crate drives (the keyring generation tool,
//! service control, unmount, block-device listing) goes through a
//! [`CommandRunner`]. Non-zero exits are returned, never raised; callers
//! inspect `exit_code` and decide.

use crate::error::{Error, Result};
use std::process::Command;
use tracing::info;

/// Captured result of one process run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub trait CommandRunner {
    /// Run `argv[0]` with the remaining arguments and wait for it to exit.
    ///
    /// Only a failure to spawn the process is an error.
    fn run(&self, argv: &[String]) -> Result<CommandOutput>;
}

/// Runs commands on the local host with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        let (program, args) = argv.split_first().ok_or_else(|| Error::Io {
            context: "run command: empty argument vector".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
        })?;
        info!("executing {}", render(argv));
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| Error::Io {
                context: format!("run {}", program),
                source,
            })?;
        Ok(CommandOutput {
            // killed by signal
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Space-join an argument vector, single-quoting arguments with whitespace.
pub fn render(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote(arg: &str) -> String {
    if arg.chars().any(char::is_whitespace) {
        format!("'{}'", arg)
    } else {
        arg.to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_quotes_whitespace() {
        let rendered = render(&argv(&["ceph-authtool", "--cap", "mon", "allow *"]));
        assert_eq!(rendered, "ceph-authtool --cap mon 'allow *'");
    }

    #[test]
    fn test_render_plain() {
        assert_eq!(render(&argv(&["umount", "/mnt/x"])), "umount /mnt/x");
    }

    #[test]
    fn test_system_runner_captures_exit_code() {
        let out = SystemRunner
            .run(&argv(&["sh", "-c", "echo hi; echo err >&2; exit 4"]))
            .unwrap();
        assert_eq!(out.exit_code, 4);
        assert_eq!(out.stdout, "hi\n");
        assert_eq!(out.stderr, "err\n");
        assert!(!out.success());
    }

    #[test]
    fn test_system_runner_missing_program_is_error() {
        let res = SystemRunner.run(&argv(&["/nonexistent/ceph-nodecfg-tool"]));
        assert!(matches!(res, Err(Error::Io { .. })));
    }

    #[test]
    fn test_system_runner_empty_argv_is_error() {
        assert!(SystemRunner.run(&[]).is_err());
    }
}
