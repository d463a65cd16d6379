//! Typed failures callers may want to inspect after an `anyhow` round-trip.

use std::fmt;

use thiserror::Error;

use crate::process::ProcessOutcome;

/// Exit status of a child, rendered for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub Option<i32>);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// The stub generator did not exit cleanly.
#[derive(Debug, Error)]
#[error("stub generation failed: `{command}` ({status})\nstdout: {stdout}\nstderr: {stderr}")]
pub struct GenerationError {
    pub command: String,
    pub status: ExitCode,
    pub stdout: String,
    pub stderr: String,
}

impl GenerationError {
    pub fn from_outcome(command: impl Into<String>, outcome: ProcessOutcome) -> Self {
        Self {
            command: command.into(),
            status: ExitCode(outcome.code),
            stdout: outcome.stdout,
            stderr: outcome.stderr,
        }
    }
}

/// A wrapped PEP 517 hook run in a Python subprocess failed.
#[derive(Debug, Error)]
#[error("call to `{backend}.{hook}` failed ({status})\nstdout: {stdout}\nstderr: {stderr}")]
pub struct BackendError {
    pub backend: String,
    pub hook: &'static str,
    pub status: ExitCode,
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_shows_both_streams() {
        let err = GenerationError::from_outcome(
            "cargo run --bin stub_gen",
            ProcessOutcome {
                code: Some(101),
                stdout: "Compiling".into(),
                stderr: "error[E0432]: unresolved import".into(),
            },
        );

        let message = err.to_string();
        assert!(message.contains("exit code 101"));
        assert!(message.contains("Compiling"));
        assert!(message.contains("unresolved import"));
    }

    #[test]
    fn signal_has_no_code() {
        assert_eq!(ExitCode(None).to_string(), "terminated by signal");
    }
}
