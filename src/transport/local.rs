//! YM-010: Local execution through `<shell> -c`.

use super::ExecOutput;
use crate::core::error::{Error, Result};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

fn command(script: &str, cwd: &Path, shell: &str) -> Command {
    let mut cmd = Command::new(shell);
    cmd.arg("-c").arg(script).current_dir(cwd).stdin(Stdio::inherit());
    cmd
}

fn spawn_error(shell: &str, source: std::io::Error) -> Error {
    Error::Spawn {
        shell: shell.to_string(),
        source,
    }
}

/// Killed-by-signal maps to `128 + signum`, as shells report it.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Run a command with inherited stdout/stderr and return its exit code.
pub fn exec_local(script: &str, cwd: &Path, shell: &str) -> Result<i32> {
    let status = command(script, cwd, shell)
        .status()
        .map_err(|e| spawn_error(shell, e))?;
    Ok(exit_code(status))
}

/// Run a command and capture its output as text.
pub fn exec_captured(script: &str, cwd: &Path, shell: &str) -> Result<ExecOutput> {
    let output = command(script, cwd, shell)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error(shell, e))?;

    Ok(ExecOutput {
        exit_code: exit_code(output.status),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
