//! Project paths used by the build hooks.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File whose presence marks a full source checkout.
pub const MANIFEST_MARKER: &str = "Cargo.toml";
/// Where the stub generator writes its output, relative to the project root.
pub const STUB_OUTPUT: &str = "pymboot.pyi";
/// Python package directory that receives the stub.
pub const PACKAGE_DIR: &str = "pymboot";
/// Stub file name inside the package directory.
pub const PACKAGE_STUB: &str = "__init__.pyi";
/// PEP 561 marker file name inside the package directory.
pub const TYPED_MARKER: &str = "py.typed";

/// Paths the hooks read and write, all resolved against `root`.
///
/// Everything except `root` is stored relative so a layout can be serialized
/// and reused for a different checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLayout {
    root: PathBuf,
    manifest_marker: PathBuf,
    stub_output: PathBuf,
    package_dir: PathBuf,
    package_stub: PathBuf,
    typed_marker: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifest_marker: PathBuf::from(MANIFEST_MARKER),
            stub_output: PathBuf::from(STUB_OUTPUT),
            package_dir: PathBuf::from(PACKAGE_DIR),
            package_stub: PathBuf::from(PACKAGE_STUB),
            typed_marker: PathBuf::from(TYPED_MARKER),
        }
    }

    /// Layout rooted at the process working directory.
    pub fn current_dir() -> Result<Self> {
        let root = env::current_dir().context("reading current working directory")?;
        Ok(Self::new(root))
    }

    pub fn with_manifest_marker(mut self, marker: impl Into<PathBuf>) -> Self {
        self.manifest_marker = marker.into();
        self
    }

    pub fn with_stub_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.stub_output = output.into();
        self
    }

    pub fn with_package_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.package_dir = dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest_marker)
    }

    pub fn stub_output_path(&self) -> PathBuf {
        self.root.join(&self.stub_output)
    }

    pub fn package_path(&self) -> PathBuf {
        self.root.join(&self.package_dir)
    }

    pub fn package_stub_path(&self) -> PathBuf {
        self.package_path().join(&self.package_stub)
    }

    pub fn typed_marker_path(&self) -> PathBuf {
        self.package_path().join(&self.typed_marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_hang_off_root() {
        let layout = ProjectLayout::new("/src/pymboot");

        assert_eq!(layout.manifest_path(), PathBuf::from("/src/pymboot/Cargo.toml"));
        assert_eq!(layout.stub_output_path(), PathBuf::from("/src/pymboot/pymboot.pyi"));
        assert_eq!(
            layout.package_stub_path(),
            PathBuf::from("/src/pymboot/pymboot/__init__.pyi")
        );
        assert_eq!(
            layout.typed_marker_path(),
            PathBuf::from("/src/pymboot/pymboot/py.typed")
        );
    }

    #[test]
    fn overrides_keep_root() {
        let layout = ProjectLayout::new("/work")
            .with_package_dir("pkg")
            .with_stub_output("out/pkg.pyi");

        assert_eq!(layout.stub_output_path(), PathBuf::from("/work/out/pkg.pyi"));
        assert_eq!(layout.package_stub_path(), PathBuf::from("/work/pkg/__init__.pyi"));
    }

    #[test]
    fn survives_json() {
        let layout = ProjectLayout::new("/work").with_manifest_marker("Cargo.lock");
        let json = serde_json::to_string(&layout).expect("serialize");
        let back: ProjectLayout = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, layout);
    }
}
