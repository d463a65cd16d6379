//! stubhook CLI

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use stubhook_core::backend::{ScriptBackend, DEFAULT_BACKEND, DEFAULT_PYTHON};
use stubhook_core::context::BuildContext;
use stubhook_core::generator::stub_command;
use stubhook_core::hooks::{prepare_stubs, BuildHooks, ConfigSettings, ConfigValue, Preparation};
use stubhook_core::layout::ProjectLayout;
use stubhook_core::process::SystemRunner;

/// CLI entrypoint for stubhook.
#[derive(Debug, Parser)]
#[command(
    name = "stubhook",
    about = "Regenerate Python type stubs, then build with a PEP 517 backend"
)]
pub struct Cli {
    /// Project root containing Cargo.toml (defaults to the current directory)
    #[arg(long = "project-dir", global = true, value_hint = ValueHint::DirPath)]
    project_dir: Option<PathBuf>,

    /// More logging (-v debug, -vv trace); RUST_LOG wins when set
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a wheel
    Wheel(WheelArgs),
    /// Build a source distribution
    Sdist(SdistArgs),
    /// Build an editable wheel
    Editable(WheelArgs),
    /// Regenerate and install stubs without building anything
    Stubs,
    /// Report whether this tree is a full checkout or a stripped sdist
    Context(ContextArgs),
}

#[derive(Debug, Args)]
struct BackendArgs {
    /// PEP 517 backend to delegate to (`module` or `module:object`)
    #[arg(long = "backend", default_value = DEFAULT_BACKEND)]
    backend: String,

    /// Python interpreter that hosts the backend
    #[arg(long = "python", default_value = DEFAULT_PYTHON, value_hint = ValueHint::CommandName)]
    python: String,

    /// Backend config setting as KEY=VALUE (repeat a key to pass a list)
    #[arg(
        short = 'C',
        long = "config-setting",
        value_name = "KEY=VALUE",
        allow_hyphen_values = true
    )]
    config_settings: Vec<String>,
}

#[derive(Debug, Args)]
struct WheelArgs {
    /// Directory the wheel is written to
    #[arg(value_hint = ValueHint::DirPath)]
    output_dir: PathBuf,

    /// Metadata directory from an earlier prepare_metadata_* call
    #[arg(long = "metadata-directory", value_hint = ValueHint::DirPath)]
    metadata_directory: Option<PathBuf>,

    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(Debug, Args)]
struct SdistArgs {
    /// Directory the sdist is written to
    #[arg(value_hint = ValueHint::DirPath)]
    output_dir: PathBuf,

    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(Debug, Args)]
struct ContextArgs {
    /// Emit a JSON object
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,
}

/// Parse CLI args and execute the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let layout = match &cli.project_dir {
        Some(dir) => ProjectLayout::new(absolutize(dir)?),
        None => ProjectLayout::current_dir()?,
    };
    debug!(root = %layout.root().display(), "project layout resolved");

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match cli.command {
        Command::Wheel(args) => {
            let settings = parse_config_settings(&args.backend.config_settings)?;
            let output_dir = absolutize(&args.output_dir)?;
            let metadata_dir = args
                .metadata_directory
                .as_deref()
                .map(absolutize)
                .transpose()?;
            let name = hooks_for(&args.backend, layout).build_wheel(
                &output_dir,
                settings.as_ref(),
                metadata_dir.as_deref(),
            )?;
            info!(artifact = %output_dir.join(&name).display(), "build finished");
            writeln!(handle, "{name}")?;
        }
        Command::Sdist(args) => {
            let settings = parse_config_settings(&args.backend.config_settings)?;
            let output_dir = absolutize(&args.output_dir)?;
            let name =
                hooks_for(&args.backend, layout).build_sdist(&output_dir, settings.as_ref())?;
            info!(artifact = %output_dir.join(&name).display(), "build finished");
            writeln!(handle, "{name}")?;
        }
        Command::Editable(args) => {
            let settings = parse_config_settings(&args.backend.config_settings)?;
            let output_dir = absolutize(&args.output_dir)?;
            let metadata_dir = args
                .metadata_directory
                .as_deref()
                .map(absolutize)
                .transpose()?;
            let name = hooks_for(&args.backend, layout).build_editable(
                &output_dir,
                settings.as_ref(),
                metadata_dir.as_deref(),
            )?;
            info!(artifact = %output_dir.join(&name).display(), "build finished");
            writeln!(handle, "{name}")?;
        }
        Command::Stubs => {
            let preparation = prepare_stubs(&SystemRunner, &stub_command(), &layout)?;
            write_preparation(&preparation, &layout, &mut handle)?;
        }
        Command::Context(args) => {
            write_context(&ContextReport::detect(&layout), args.json, &mut handle)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn hooks_for(args: &BackendArgs, layout: ProjectLayout) -> BuildHooks<ScriptBackend> {
    let backend = ScriptBackend::new(args.backend.clone(), layout.root()).with_python(&args.python);
    BuildHooks::new(backend, layout)
}

/// The Python backend runs in the project root, so relative output paths
/// must be pinned to our own working directory first.
fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().context("reading current working directory")?;
    Ok(cwd.join(path))
}

fn parse_config_settings(raw: &[String]) -> Result<Option<ConfigSettings>> {
    if raw.is_empty() {
        return Ok(None);
    }

    let mut settings = ConfigSettings::new();
    for entry in raw {
        let (key, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
        if key.is_empty() {
            return Err(anyhow!("config setting has an empty key: {entry}"));
        }

        let value = value.to_string();
        match settings.remove(key) {
            None => {
                settings.insert(key.to_string(), ConfigValue::Single(value));
            }
            Some(ConfigValue::Single(first)) => {
                settings.insert(key.to_string(), ConfigValue::Multiple(vec![first, value]));
            }
            Some(ConfigValue::Multiple(mut values)) => {
                values.push(value);
                settings.insert(key.to_string(), ConfigValue::Multiple(values));
            }
        }
    }

    Ok(Some(settings))
}

#[derive(Debug, Serialize)]
struct ContextReport {
    root: PathBuf,
    manifest: PathBuf,
    context: BuildContext,
    requires_generation: bool,
}

impl ContextReport {
    fn detect(layout: &ProjectLayout) -> Self {
        let context = BuildContext::detect(layout);
        Self {
            root: layout.root().to_path_buf(),
            manifest: layout.manifest_path(),
            context,
            requires_generation: context.requires_generation(),
        }
    }
}

fn write_context(report: &ContextReport, json: bool, mut w: impl Write) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut w, report)?;
        writeln!(w)?;
        return Ok(());
    }

    match report.context {
        BuildContext::FullSource => writeln!(
            w,
            "full source checkout ({} present): stubs will be regenerated",
            report.manifest.display()
        )?,
        BuildContext::StrippedDistribution => writeln!(
            w,
            "stripped distribution ({} missing): stubs ship as packaged",
            report.manifest.display()
        )?,
    }
    Ok(())
}

fn write_preparation(
    preparation: &Preparation,
    layout: &ProjectLayout,
    mut w: impl Write,
) -> Result<()> {
    match preparation {
        Preparation::Skipped(_) => {
            writeln!(
                w,
                "skipped: no {} in this tree",
                layout.manifest_path().display()
            )?;
        }
        Preparation::Installed(report) => {
            match &report.stub {
                Some(stub) => writeln!(w, "stub: {}", stub.display())?,
                None => writeln!(
                    w,
                    "stub: not generated ({} missing)",
                    layout.stub_output_path().display()
                )?,
            }
            writeln!(w, "marker: {}", report.marker.display())?;
        }
    }
    Ok(())
}
