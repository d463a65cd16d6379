//! Blocking child processes.
//!
//! Everything that spawns goes through [`ProcessRunner`] so the hooks can be
//! exercised with a scripted runner instead of a real toolchain.

use std::fmt;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Program plus arguments for a child process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Exit status and captured streams of a finished child.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutcome {
    /// `None` when the child was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<Output> for ProcessOutcome {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Runs a command to completion in `cwd`.
///
/// An `Err` means the process could not be run at all; a process that ran and
/// failed is reported through [`ProcessOutcome::code`].
pub trait ProcessRunner {
    fn run(&self, command: &CommandLine, cwd: &Path) -> Result<ProcessOutcome>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, command: &CommandLine, cwd: &Path) -> Result<ProcessOutcome> {
        (**self).run(command, cwd)
    }
}

/// Spawns real processes with `std::process::Command`, stdin closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &CommandLine, cwd: &Path) -> Result<ProcessOutcome> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to spawn `{}`", command.program))?;
        Ok(output.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let cmd = CommandLine::new("python3").args(["-c", "import sys"]);
        assert_eq!(cmd.to_string(), "python3 -c \"import sys\"");
    }

    #[test]
    fn only_zero_is_success() {
        let ok = ProcessOutcome {
            code: Some(0),
            ..Default::default()
        };
        let failed = ProcessOutcome {
            code: Some(1),
            ..Default::default()
        };
        let killed = ProcessOutcome::default();

        assert!(ok.success());
        assert!(!failed.success());
        assert!(!killed.success());
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_streams() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cmd = CommandLine::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);

        let outcome = SystemRunner.run(&cmd, tmp.path()).expect("run sh");

        assert_eq!(outcome.code, Some(3));
        assert_eq!(outcome.stdout.trim(), "out");
        assert_eq!(outcome.stderr.trim(), "err");
    }

    #[test]
    fn missing_program_is_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cmd = CommandLine::new("stubhook-definitely-not-installed");

        let err = SystemRunner.run(&cmd, tmp.path()).unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }
}
