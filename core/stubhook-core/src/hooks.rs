//! Build hooks that refresh stubs, then delegate to a wrapped builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::context::BuildContext;
use crate::generator::{generate, stub_command};
use crate::install::{install_artifacts, InstallReport};
use crate::layout::ProjectLayout;
use crate::process::{CommandLine, ProcessRunner, SystemRunner};

/// Front-end supplied `config_settings`, passed through untouched.
pub type ConfigSettings = BTreeMap<String, ConfigValue>;

/// A `config_settings` value: PEP 517 allows a string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Single(String),
    Multiple(Vec<String>),
}

/// The three build operations this crate wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Wheel,
    Sdist,
    Editable,
}

impl Hook {
    /// PEP 517 function name.
    pub fn function_name(self) -> &'static str {
        match self {
            Hook::Wheel => "build_wheel",
            Hook::Sdist => "build_sdist",
            Hook::Editable => "build_editable",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Hook::Wheel => "wheel",
            Hook::Sdist => "sdist",
            Hook::Editable => "editable",
        })
    }
}

/// The standard builder being wrapped. Each method returns the basename of the
/// artifact it wrote into the given directory.
pub trait PackageBuilder {
    fn build_wheel(
        &self,
        wheel_directory: &Path,
        config_settings: Option<&ConfigSettings>,
        metadata_directory: Option<&Path>,
    ) -> Result<String>;

    fn build_sdist(
        &self,
        sdist_directory: &Path,
        config_settings: Option<&ConfigSettings>,
    ) -> Result<String>;

    fn build_editable(
        &self,
        wheel_directory: &Path,
        config_settings: Option<&ConfigSettings>,
        metadata_directory: Option<&Path>,
    ) -> Result<String>;
}

impl<B: PackageBuilder + ?Sized> PackageBuilder for &B {
    fn build_wheel(
        &self,
        wheel_directory: &Path,
        config_settings: Option<&ConfigSettings>,
        metadata_directory: Option<&Path>,
    ) -> Result<String> {
        (**self).build_wheel(wheel_directory, config_settings, metadata_directory)
    }

    fn build_sdist(
        &self,
        sdist_directory: &Path,
        config_settings: Option<&ConfigSettings>,
    ) -> Result<String> {
        (**self).build_sdist(sdist_directory, config_settings)
    }

    fn build_editable(
        &self,
        wheel_directory: &Path,
        config_settings: Option<&ConfigSettings>,
        metadata_directory: Option<&Path>,
    ) -> Result<String> {
        (**self).build_editable(wheel_directory, config_settings, metadata_directory)
    }
}

/// Outcome of the generation sequence that precedes every build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preparation {
    /// Not a full checkout; whatever stub is in the tree ships as is.
    Skipped(BuildContext),
    Installed(InstallReport),
}

/// Detect, then generate and install when the tree is a full checkout.
pub fn prepare_stubs(
    runner: &impl ProcessRunner,
    command: &CommandLine,
    layout: &ProjectLayout,
) -> Result<Preparation> {
    debug!(root = %layout.root().display(), "detecting build context");
    let context = BuildContext::detect(layout);
    if !context.requires_generation() {
        debug!(?context, "skipping stub generation");
        return Ok(Preparation::Skipped(context));
    }

    generate(runner, command, layout.root())?;
    let report = install_artifacts(layout)?;
    debug!("stubs installed");
    Ok(Preparation::Installed(report))
}

/// Wheel/sdist/editable hooks around a [`PackageBuilder`].
///
/// Nothing is cached: every hook call re-detects the build context. A
/// generation or filesystem failure returns before the builder is touched.
#[derive(Debug)]
pub struct BuildHooks<B, R = SystemRunner> {
    builder: B,
    runner: R,
    layout: ProjectLayout,
    command: CommandLine,
}

impl<B: PackageBuilder> BuildHooks<B> {
    pub fn new(builder: B, layout: ProjectLayout) -> Self {
        Self {
            builder,
            runner: SystemRunner,
            layout,
            command: stub_command(),
        }
    }
}

impl<B, R> BuildHooks<B, R> {
    /// Swap the process runner used for the stub generator.
    pub fn with_runner<T: ProcessRunner>(self, runner: T) -> BuildHooks<B, T> {
        BuildHooks {
            builder: self.builder,
            runner,
            layout: self.layout,
            command: self.command,
        }
    }

    pub fn with_command(mut self, command: CommandLine) -> Self {
        self.command = command;
        self
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }
}

impl<B: PackageBuilder, R: ProcessRunner> BuildHooks<B, R> {
    /// Run only the generation sequence.
    pub fn prepare(&self) -> Result<Preparation> {
        prepare_stubs(&self.runner, &self.command, &self.layout)
    }

    pub fn build_wheel(
        &self,
        wheel_directory: &Path,
        config_settings: Option<&ConfigSettings>,
        metadata_directory: Option<&Path>,
    ) -> Result<String> {
        let _span = info_span!("build_hook", hook = %Hook::Wheel).entered();
        self.prepare()?;
        debug!("delegating to wrapped builder");
        self.builder
            .build_wheel(wheel_directory, config_settings, metadata_directory)
    }

    pub fn build_sdist(
        &self,
        sdist_directory: &Path,
        config_settings: Option<&ConfigSettings>,
    ) -> Result<String> {
        let _span = info_span!("build_hook", hook = %Hook::Sdist).entered();
        self.prepare()?;
        debug!("delegating to wrapped builder");
        self.builder.build_sdist(sdist_directory, config_settings)
    }

    pub fn build_editable(
        &self,
        wheel_directory: &Path,
        config_settings: Option<&ConfigSettings>,
        metadata_directory: Option<&Path>,
    ) -> Result<String> {
        let _span = info_span!("build_hook", hook = %Hook::Editable).entered();
        self.prepare()?;
        debug!("delegating to wrapped builder");
        self.builder
            .build_editable(wheel_directory, config_settings, metadata_directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_value_is_untagged() {
        let mut settings = ConfigSettings::new();
        settings.insert("--build-option".into(), ConfigValue::Single("--quiet".into()));
        settings.insert(
            "--global-option".into(),
            ConfigValue::Multiple(vec!["-v".into(), "-q".into()]),
        );

        let json = serde_json::to_string(&settings).expect("json");
        assert_eq!(
            json,
            r#"{"--build-option":"--quiet","--global-option":["-v","-q"]}"#
        );
    }

    #[test]
    fn hook_names_follow_pep517() {
        assert_eq!(Hook::Wheel.function_name(), "build_wheel");
        assert_eq!(Hook::Sdist.function_name(), "build_sdist");
        assert_eq!(Hook::Editable.function_name(), "build_editable");
        assert_eq!(Hook::Editable.to_string(), "editable");
    }
}
