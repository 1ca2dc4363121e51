//! External command execution.
//!
//! All kubectl / ceph-objectstore-tool calls go through [`CommandRunner`]
//! so the pipelines can be driven by scripted output in tests. Every
//! invocation is recorded at debug level for the audit log.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{CephGraphError, Result};

/// Captured result of one external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }

    /// Turn a non-zero exit into [`CephGraphError::CommandFailed`].
    pub fn into_stdout(self, program: &str, args: &[&str]) -> Result<String> {
        if self.is_success() {
            return Ok(self.stdout);
        }
        Err(CephGraphError::CommandFailed {
            command: render_command(program, args),
            status: match self.status {
                Some(code) => format!("exit status {}", code),
                None => "signal".to_string(),
            },
            stderr: self.stderr.trim().to_string(),
        })
    }
}

pub trait CommandRunner {
    /// Run `program` with `args` and capture its output.
    ///
    /// Returns `Err` only if the process could not be spawned; a non-zero
    /// exit is reported through [`CommandOutput::status`].
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run and require a zero exit status, returning stdout.
    fn run_checked(&self, program: &str, args: &[&str]) -> Result<String> {
        self.run(program, args)?.into_stdout(program, args)
    }
}

/// Runs commands on the local machine via `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let rendered = render_command(program, args);
        tracing::debug!(command = %rendered, "running external command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;

        let result = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::debug!(
            command = %rendered,
            status = ?result.status,
            stdout = %result.stdout,
            stderr = %result.stderr,
            "external command finished"
        );
        Ok(result)
    }
}

pub fn render_command(program: &str, args: &[&str]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

/// Locate `program` on `PATH` (or accept it as-is if it is a path).
pub fn find_command(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|path| path.is_file())
}

/// Fail with an environment error when a required tool is missing.
pub fn require_command(program: &str) -> Result<PathBuf> {
    find_command(program).ok_or_else(|| CephGraphError::MissingCommand(program.to_string()))
}
