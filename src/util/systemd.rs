//! Service control through `systemctl`.

use crate::error::{Error, Result};
use crate::util::command::{render, CommandRunner};

/// Stop every unit matching `pattern` (e.g. `ceph*`).
pub fn stop_units(runner: &dyn CommandRunner, systemctl: &str, pattern: &str) -> Result<()> {
    let argv = vec![
        systemctl.to_string(),
        "stop".to_string(),
        pattern.to_string(),
    ];
    let output = runner.run(&argv)?;
    if output.success() {
        return Ok(());
    }
    Err(Error::CommandFailed {
        command: render(&argv),
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}
