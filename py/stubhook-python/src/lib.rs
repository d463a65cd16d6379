//! PEP 517 backend module for stubhook
//!
//! `build_wheel`, `build_sdist` and `build_editable` refresh the type stubs
//! before handing off to `setuptools.build_meta`. The remaining PEP 517 hooks
//! are forwarded as-is.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use pyo3::exceptions::{PyOSError, PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use stubhook_core::backend::DEFAULT_BACKEND;
use stubhook_core::hooks::{BuildHooks, ConfigSettings, ConfigValue, Hook, PackageBuilder};
use stubhook_core::layout::ProjectLayout;
use stubhook_core::{BackendError, GenerationError};
use tracing_subscriber::EnvFilter;

/// A Python backend object called in-process.
struct PyBackend<'py> {
    backend: Bound<'py, PyAny>,
}

impl PyBackend<'_> {
    fn call(
        &self,
        hook: Hook,
        directory: &Path,
        config_settings: Option<&ConfigSettings>,
        metadata_directory: Option<Option<&Path>>,
    ) -> Result<String> {
        let py = self.backend.py();
        let directory = path_arg(directory);
        let settings = settings_to_py(py, config_settings)?;

        let filename = match metadata_directory {
            Some(metadata) => self.backend.call_method1(
                hook.function_name(),
                (directory, settings, metadata.map(path_arg)),
            )?,
            None => self
                .backend
                .call_method1(hook.function_name(), (directory, settings))?,
        };
        Ok(filename.extract::<String>()?)
    }
}

impl PackageBuilder for PyBackend<'_> {
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

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn settings_to_py<'py>(
    py: Python<'py>,
    settings: Option<&ConfigSettings>,
) -> PyResult<Option<Bound<'py, PyDict>>> {
    let Some(settings) = settings else {
        return Ok(None);
    };

    let dict = PyDict::new(py);
    for (key, value) in settings {
        match value {
            ConfigValue::Single(v) => dict.set_item(key, v)?,
            ConfigValue::Multiple(vs) => dict.set_item(key, PyList::new(py, vs)?)?,
        }
    }
    Ok(Some(dict))
}

fn settings_from_py(dict: &Bound<'_, PyDict>) -> PyResult<ConfigSettings> {
    let mut settings = ConfigSettings::new();
    for (key, value) in dict.iter() {
        let key: String = key.extract()?;
        let value = if let Ok(single) = value.extract::<String>() {
            ConfigValue::Single(single)
        } else if let Ok(many) = value.extract::<Vec<String>>() {
            ConfigValue::Multiple(many)
        } else {
            return Err(PyTypeError::new_err(format!(
                "config_settings[{key:?}] must be a str or a list of str"
            )));
        };
        settings.insert(key, value);
    }
    Ok(settings)
}

fn wrapped_backend(py: Python<'_>) -> PyResult<Bound<'_, PyAny>> {
    Ok(py.import(DEFAULT_BACKEND)?.into_any())
}

fn run_hook(
    backend: Bound<'_, PyAny>,
    layout: ProjectLayout,
    hook: Hook,
    directory: &Path,
    config_settings: Option<&Bound<'_, PyDict>>,
    metadata_directory: Option<&Path>,
) -> PyResult<String> {
    let settings = config_settings.map(settings_from_py).transpose()?;
    let hooks = BuildHooks::new(PyBackend { backend }, layout);

    let result = match hook {
        Hook::Wheel => hooks.build_wheel(directory, settings.as_ref(), metadata_directory),
        Hook::Sdist => hooks.build_sdist(directory, settings.as_ref()),
        Hook::Editable => hooks.build_editable(directory, settings.as_ref(), metadata_directory),
    };
    result.map_err(to_py_err)
}

fn current_layout() -> PyResult<ProjectLayout> {
    ProjectLayout::current_dir().map_err(to_py_err)
}

#[pyfunction]
#[pyo3(signature = (wheel_directory, config_settings=None, metadata_directory=None))]
fn build_wheel(
    py: Python<'_>,
    wheel_directory: PathBuf,
    config_settings: Option<Bound<'_, PyDict>>,
    metadata_directory: Option<PathBuf>,
) -> PyResult<String> {
    run_hook(
        wrapped_backend(py)?,
        current_layout()?,
        Hook::Wheel,
        &wheel_directory,
        config_settings.as_ref(),
        metadata_directory.as_deref(),
    )
}

#[pyfunction]
#[pyo3(signature = (sdist_directory, config_settings=None))]
fn build_sdist(
    py: Python<'_>,
    sdist_directory: PathBuf,
    config_settings: Option<Bound<'_, PyDict>>,
) -> PyResult<String> {
    run_hook(
        wrapped_backend(py)?,
        current_layout()?,
        Hook::Sdist,
        &sdist_directory,
        config_settings.as_ref(),
        None,
    )
}

#[pyfunction]
#[pyo3(signature = (wheel_directory, config_settings=None, metadata_directory=None))]
fn build_editable(
    py: Python<'_>,
    wheel_directory: PathBuf,
    config_settings: Option<Bound<'_, PyDict>>,
    metadata_directory: Option<PathBuf>,
) -> PyResult<String> {
    run_hook(
        wrapped_backend(py)?,
        current_layout()?,
        Hook::Editable,
        &wheel_directory,
        config_settings.as_ref(),
        metadata_directory.as_deref(),
    )
}

#[pyfunction]
#[pyo3(signature = (config_settings=None))]
fn get_requires_for_build_wheel(
    py: Python<'_>,
    config_settings: Option<Bound<'_, PyAny>>,
) -> PyResult<Py<PyAny>> {
    Ok(wrapped_backend(py)?
        .call_method1("get_requires_for_build_wheel", (config_settings,))?
        .unbind())
}

#[pyfunction]
#[pyo3(signature = (config_settings=None))]
fn get_requires_for_build_sdist(
    py: Python<'_>,
    config_settings: Option<Bound<'_, PyAny>>,
) -> PyResult<Py<PyAny>> {
    Ok(wrapped_backend(py)?
        .call_method1("get_requires_for_build_sdist", (config_settings,))?
        .unbind())
}

#[pyfunction]
#[pyo3(signature = (config_settings=None))]
fn get_requires_for_build_editable(
    py: Python<'_>,
    config_settings: Option<Bound<'_, PyAny>>,
) -> PyResult<Py<PyAny>> {
    Ok(wrapped_backend(py)?
        .call_method1("get_requires_for_build_editable", (config_settings,))?
        .unbind())
}

#[pyfunction]
#[pyo3(signature = (metadata_directory, config_settings=None))]
fn prepare_metadata_for_build_wheel(
    py: Python<'_>,
    metadata_directory: Bound<'_, PyAny>,
    config_settings: Option<Bound<'_, PyAny>>,
) -> PyResult<Py<PyAny>> {
    Ok(wrapped_backend(py)?
        .call_method1(
            "prepare_metadata_for_build_wheel",
            (metadata_directory, config_settings),
        )?
        .unbind())
}

#[pyfunction]
#[pyo3(signature = (metadata_directory, config_settings=None))]
fn prepare_metadata_for_build_editable(
    py: Python<'_>,
    metadata_directory: Bound<'_, PyAny>,
    config_settings: Option<Bound<'_, PyAny>>,
) -> PyResult<Py<PyAny>> {
    Ok(wrapped_backend(py)?
        .call_method1(
            "prepare_metadata_for_build_editable",
            (metadata_directory, config_settings),
        )?
        .unbind())
}

/// Exceptions raised by the wrapped backend come back untouched.
fn to_py_err(err: anyhow::Error) -> PyErr {
    let err = match err.downcast::<PyErr>() {
        Ok(py_err) => return py_err,
        Err(err) => err,
    };

    let message = format!("{err:#}");
    if err.is::<GenerationError>() || err.is::<BackendError>() {
        PyRuntimeError::new_err(message)
    } else if err.chain().any(|cause| cause.is::<io::Error>()) {
        PyOSError::new_err(message)
    } else {
        PyValueError::new_err(message)
    }
}

#[pymodule]
#[pyo3(name = "_stubhook_python")]
fn stubhook_python(_py: Python<'_>, m: &Bound<PyModule>) -> PyResult<()> {
    // Install a stderr subscriber unless the host already did.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    m.add_function(wrap_pyfunction!(build_wheel, m)?)?;
    m.add_function(wrap_pyfunction!(build_sdist, m)?)?;
    m.add_function(wrap_pyfunction!(build_editable, m)?)?;
    m.add_function(wrap_pyfunction!(get_requires_for_build_wheel, m)?)?;
    m.add_function(wrap_pyfunction!(get_requires_for_build_sdist, m)?)?;
    m.add_function(wrap_pyfunction!(get_requires_for_build_editable, m)?)?;
    m.add_function(wrap_pyfunction!(prepare_metadata_for_build_wheel, m)?)?;
    m.add_function(wrap_pyfunction!(prepare_metadata_for_build_editable, m)?)?;
    Ok(())
}
