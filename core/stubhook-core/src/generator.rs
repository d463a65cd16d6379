//! Stub generator invocation.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::process::{CommandLine, ProcessOutcome, ProcessRunner};

/// Binary in the extension crate that writes the `.pyi` file.
pub const STUB_GEN_BIN: &str = "stub_gen";
/// Cargo feature that compiles the Python bindings the generator inspects.
pub const STUB_GEN_FEATURE: &str = "python";

/// `cargo run --bin stub_gen --features python`
pub fn stub_command() -> CommandLine {
    CommandLine::new("cargo").args(["run", "--bin", STUB_GEN_BIN, "--features", STUB_GEN_FEATURE])
}

/// Run the generator in `root` and wait for it.
///
/// Anything but a zero exit becomes a [`GenerationError`] holding both
/// captured streams.
pub fn generate(
    runner: &impl ProcessRunner,
    command: &CommandLine,
    root: &Path,
) -> Result<ProcessOutcome> {
    info!("generating Python stub files");
    debug!(command = %command, cwd = %root.display(), "spawning stub generator");

    let outcome = runner.run(command, root)?;
    if !outcome.success() {
        return Err(GenerationError::from_outcome(command.to_string(), outcome).into());
    }

    info!(stdout = %outcome.stdout.trim_end(), "stub generation output");
    if !outcome.stderr.trim().is_empty() {
        warn!(stderr = %outcome.stderr.trim_end(), "stub generator wrote to stderr");
    }

    Ok(outcome)
}
