//! A [`PackageBuilder`] that drives a PEP 517 backend in a Python subprocess.
//!
//! The hook call is rendered into a short script run with `python -c`. Every
//! argument crosses the boundary as JSON, and the returned filename comes back
//! through a file named by `sys.argv[1]` so stray prints from the backend can't
//! corrupt it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use indoc::formatdoc;
use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info_span};

use crate::error::{BackendError, ExitCode};
use crate::hooks::{ConfigSettings, Hook, PackageBuilder};
use crate::process::{CommandLine, ProcessRunner, SystemRunner};

pub const DEFAULT_BACKEND: &str = "setuptools.build_meta";
pub const DEFAULT_PYTHON: &str = "python3";

#[derive(Debug, Clone)]
pub struct ScriptBackend<R = SystemRunner> {
    backend: String,
    python: String,
    source_tree: PathBuf,
    runner: R,
}

impl ScriptBackend {
    /// `backend` is either `module` or `module:object`, as in `pyproject.toml`.
    pub fn new(backend: impl Into<String>, source_tree: impl Into<PathBuf>) -> Self {
        Self {
            backend: backend.into(),
            python: DEFAULT_PYTHON.to_string(),
            source_tree: source_tree.into(),
            runner: SystemRunner,
        }
    }
}

impl<R> ScriptBackend<R> {
    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    pub fn with_runner<T: ProcessRunner>(self, runner: T) -> ScriptBackend<T> {
        ScriptBackend {
            backend: self.backend,
            python: self.python,
            source_tree: self.source_tree,
            runner,
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    fn backend_import(&self) -> String {
        if let Some((module, object)) = self.backend.split_once(':') {
            format!("from {module} import {object} as backend")
        } else {
            format!("import {} as backend", self.backend)
        }
    }
}

impl<R: ProcessRunner> ScriptBackend<R> {
    fn call(
        &self,
        hook: Hook,
        directory: &Path,
        config_settings: Option<&ConfigSettings>,
        metadata_directory: Option<Option<&Path>>,
    ) -> Result<String> {
        let _span = info_span!("run_python_script", hook = hook.function_name()).entered();

        let mut call_args = vec![py_json(&directory)?, py_json(&config_settings)?];
        if let Some(metadata_directory) = metadata_directory {
            call_args.push(py_json(&metadata_directory)?);
        }
        let call_args = call_args
            .iter()
            .map(|arg| format!("json.loads({arg})"))
            .collect::<Vec<_>>()
            .join(", ");

        let script = formatdoc! {r#"
            import json
            import sys

            {import}

            filename = backend.{function}({call_args})
            with open(sys.argv[1], "w") as fp:
                fp.write(filename)
            "#,
            import = self.backend_import(),
            function = hook.function_name(),
        };

        let scratch = TempDir::new().context("creating scratch directory for backend output")?;
        let outfile = scratch.path().join(format!("{}.txt", hook.function_name()));
        let outfile_arg = outfile
            .to_str()
            .ok_or_else(|| anyhow!("scratch path is not UTF-8: {}", outfile.display()))?;

        debug!(
            "Calling `{}.{}({})`",
            self.backend,
            hook.function_name(),
            call_args
        );
        let command = CommandLine::new(&self.python).args(["-c", script.as_str(), outfile_arg]);
        let outcome = self.runner.run(&command, &self.source_tree)?;
        if !outcome.success() {
            return Err(BackendError {
                backend: self.backend.clone(),
                hook: hook.function_name(),
                status: ExitCode(outcome.code),
                stdout: outcome.stdout,
                stderr: outcome.stderr,
            }
            .into());
        }

        let filename = fs::read_to_string(&outfile).with_context(|| {
            format!(
                "`{}.{}` did not report an artifact",
                self.backend,
                hook.function_name()
            )
        })?;
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(anyhow!(
                "`{}.{}` returned an empty filename",
                self.backend,
                hook.function_name()
            ));
        }
        Ok(filename.to_string())
    }
}

impl<R: ProcessRunner> PackageBuilder for ScriptBackend<R> {
    fn build_wheel(
        &self,
        wheel_directory: &Path,
        config_settings: Option<&ConfigSettings>,
        metadata_directory: Option<&Path>,
    ) -> Result<String> {
        self.call(
            Hook::Wheel,
            wheel_directory,
            config_settings,
            Some(metadata_directory),
        )
    }

    fn build_sdist(
        &self,
        sdist_directory: &Path,
        config_settings: Option<&ConfigSettings>,
    ) -> Result<String> {
        self.call(Hook::Sdist, sdist_directory, config_settings, None)
    }

    fn build_editable(
        &self,
        wheel_directory: &Path,
        config_settings: Option<&ConfigSettings>,
        metadata_directory: Option<&Path>,
    ) -> Result<String> {
        self.call(
            Hook::Editable,
            wheel_directory,
            config_settings,
            Some(metadata_directory),
        )
    }
}

/// Python string literal holding the JSON encoding of `value`.
///
/// A JSON string is also a valid Python string literal, so encoding twice
/// yields source text that `json.loads` turns back into `value`.
fn py_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value).context("encoding hook argument")?;
    Ok(serde_json::to_string(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::ConfigValue;
    use crate::process::ProcessOutcome;
    use std::cell::RefCell;

    /// Pretends to be Python: records the script and writes `reply` to argv[1].
    struct FakePython {
        reply: Option<&'static str>,
        code: i32,
        scripts: RefCell<Vec<String>>,
    }

    impl FakePython {
        fn replying(reply: &'static str) -> Self {
            Self {
                reply: Some(reply),
                code: 0,
                scripts: RefCell::new(Vec::new()),
            }
        }
    }

    impl ProcessRunner for FakePython {
        fn run(&self, command: &CommandLine, _cwd: &Path) -> Result<ProcessOutcome> {
            assert_eq!(command.args[0], "-c");
            self.scripts.borrow_mut().push(command.args[1].clone());
            if let Some(reply) = self.reply {
                fs::write(&command.args[2], reply)?;
            }
            Ok(ProcessOutcome {
                code: Some(self.code),
                stdout: String::new(),
                stderr: if self.code == 0 {
                    String::new()
                } else {
                    "ModuleNotFoundError: No module named 'setuptools'".into()
                },
            })
        }
    }

    #[test]
    fn wheel_call_passes_all_arguments() {
        let runner = FakePython::replying("pkg-1.0-py3-none-any.whl\n");
        let backend = ScriptBackend::new(DEFAULT_BACKEND, "/src").with_runner(&runner);
        let mut settings = ConfigSettings::new();
        settings.insert("key".into(), ConfigValue::Single("value".into()));

        let name = backend
            .build_wheel(Path::new("/out"), Some(&settings), Some(Path::new("/meta")))
            .expect("wheel");

        assert_eq!(name, "pkg-1.0-py3-none-any.whl");
        let scripts = runner.scripts.borrow();
        assert!(scripts[0].contains("import setuptools.build_meta as backend"));
        assert!(scripts[0].contains("backend.build_wheel(json.loads("));
        assert!(scripts[0].contains(r#"\"/meta\""#));
        assert!(scripts[0].contains(r#"{\"key\":\"value\"}"#));
    }

    #[test]
    fn sdist_call_has_two_arguments() {
        let runner = FakePython::replying("pkg-1.0.tar.gz");
        let backend = ScriptBackend::new("maturin", "/src").with_runner(&runner);

        let name = backend.build_sdist(Path::new("/out"), None).expect("sdist");

        assert_eq!(name, "pkg-1.0.tar.gz");
        let scripts = runner.scripts.borrow();
        assert!(scripts[0].contains(r#"backend.build_sdist(json.loads("\"/out\""), json.loads("null"))"#));
    }

    #[test]
    fn object_backend_uses_from_import() {
        let backend = ScriptBackend::new("setuptools.build_meta:__legacy__", "/src");
        assert_eq!(
            backend.backend_import(),
            "from setuptools.build_meta import __legacy__ as backend"
        );
    }

    #[test]
    fn failing_interpreter_is_backend_error() {
        let runner = FakePython {
            reply: None,
            code: 1,
            scripts: RefCell::new(Vec::new()),
        };
        let backend = ScriptBackend::new(DEFAULT_BACKEND, "/src").with_runner(&runner);

        let err = backend
            .build_editable(Path::new("/out"), None, None)
            .unwrap_err();
        let typed = err.downcast_ref::<BackendError>().expect("backend error");

        assert_eq!(typed.hook, "build_editable");
        assert!(typed.stderr.contains("No module named"));
    }

    #[test]
    fn empty_reply_is_rejected() {
        let runner = FakePython::replying("  \n");
        let backend = ScriptBackend::new(DEFAULT_BACKEND, "/src").with_runner(&runner);

        let err = backend.build_sdist(Path::new("/out"), None).unwrap_err();
        assert!(err.to_string().contains("empty filename"));
    }

    #[test]
    fn py_json_escapes_quotes() {
        assert_eq!(py_json("a\"b").expect("encode"), r#""\"a\\\"b\"""#);
    }
}
