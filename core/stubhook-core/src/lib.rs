//! stubhook-core: build hooks that keep type stubs honest
//!
//! A native Python extension ships a `.pyi` stub next to its compiled module.
//! The stub is produced by a generator binary living in the same Cargo project,
//! so it can only be refreshed from a full source checkout. This crate wraps a
//! standard package builder and, right before each wheel, sdist or editable
//! build, regenerates and installs that stub when it can.
//!
//! ## The sequence
//!
//! **Detect**: is `Cargo.toml` at the project root? If not, we are building
//! from a stripped source distribution and the stub is already in place.
//!
//! **Generate**: run `cargo run --bin stub_gen --features python` and wait.
//! A non-zero exit aborts the build with the captured output attached.
//!
//! **Install**: copy the generated stub into the package directory and drop
//! an empty `py.typed` marker beside it.
//!
//! **Delegate**: hand the original arguments to the wrapped builder and return
//! whatever filename it reports.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use stubhook_core::backend::ScriptBackend;
//! use stubhook_core::hooks::BuildHooks;
//! use stubhook_core::layout::ProjectLayout;
//!
//! let layout = ProjectLayout::current_dir()?;
//! let backend = ScriptBackend::new("setuptools.build_meta", layout.root());
//! let hooks = BuildHooks::new(backend, layout);
//!
//! let wheel = hooks.build_wheel(Path::new("dist"), None, None)?;
//! println!("built {wheel}");
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Pieces
//!
//! - [`context`]: decide between a full checkout and a stripped distribution
//! - [`process`]: blocking child processes behind the [`process::ProcessRunner`] seam
//! - [`generator`]: the stub generator invocation
//! - [`install`]: stub copy and compliance marker
//! - [`hooks`]: the three delegating build hooks
//! - [`backend`]: a [`hooks::PackageBuilder`] that drives any PEP 517 backend through Python

pub mod backend;
pub mod context;
pub mod error;
pub mod generator;
pub mod hooks;
pub mod install;
pub mod layout;
pub mod process;

pub use error::{BackendError, GenerationError};
