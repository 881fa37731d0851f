//! YM-010: Process execution: the seam between the build driver and the OS.

pub mod local;

use crate::core::error::Result;
use std::path::Path;

/// Shell used when neither the cookbook nor the CLI names one.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Captured output of a command.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs shell command strings on behalf of the build driver.
pub trait CommandRunner {
    /// Run `command` through `shell -c` in `cwd` with inherited stdio.
    /// Returns the exit code.
    fn run(&self, command: &str, cwd: &Path, shell: &str) -> Result<i32>;

    /// Same as [`CommandRunner::run`] with stdout and stderr captured.
    fn check(&self, command: &str, cwd: &Path, shell: &str) -> Result<ExecOutput>;
}

/// Runs commands on this machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRunner;

impl CommandRunner for LocalRunner {
    fn run(&self, command: &str, cwd: &Path, shell: &str) -> Result<i32> {
        local::exec_local(command, cwd, shell)
    }

    fn check(&self, command: &str, cwd: &Path, shell: &str) -> Result<ExecOutput> {
        local::exec_captured(command, cwd, shell)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ym010_local_runner_delegates() {
        let dir = tempfile::tempdir().unwrap();
        let runner = LocalRunner;
        assert_eq!(runner.run("exit 3", dir.path(), DEFAULT_SHELL).unwrap(), 3);
        let out = runner.check("echo query-test", dir.path(), DEFAULT_SHELL).unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "query-test");
    }
}
