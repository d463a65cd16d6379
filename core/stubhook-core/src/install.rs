//! Stub installation into the package tree.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::layout::ProjectLayout;

/// What [`install_artifacts`] left in the package directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// In-package stub path, or `None` when the generator produced nothing.
    pub stub: Option<PathBuf>,
    pub marker: PathBuf,
}

/// Copy the generated stub into the package and write the `py.typed` marker.
///
/// A missing generator output is logged and tolerated; the marker is written
/// regardless. Filesystem failures propagate.
pub fn install_artifacts(layout: &ProjectLayout) -> Result<InstallReport> {
    let package = layout.package_path();
    fs::create_dir_all(&package)
        .with_context(|| format!("creating package directory {}", package.display()))?;

    let source = layout.stub_output_path();
    let stub = if source.is_file() {
        let dest = layout.package_stub_path();
        fs::copy(&source, &dest).with_context(|| {
            format!("copying {} to {}", source.display(), dest.display())
        })?;
        info!(from = %source.display(), to = %dest.display(), "copied stub");
        Some(dest)
    } else {
        warn!(path = %source.display(), "stub file was not generated");
        None
    };

    let marker = layout.typed_marker_path();
    write_typed_marker(&marker)?;
    info!(path = %marker.display(), "created py.typed marker");

    Ok(InstallReport { stub, marker })
}

/// Create or truncate `path` to an empty file.
pub fn write_typed_marker(path: &Path) -> Result<()> {
    File::create(path).with_context(|| format!("writing marker {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn copies_stub_and_writes_marker() {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("pymboot.pyi"), "def ping() -> None: ...\n").expect("stub");
        let layout = ProjectLayout::new(tmp.path());

        let report = install_artifacts(&layout).expect("install");

        let stub = report.stub.expect("stub copied");
        assert_eq!(stub, tmp.path().join("pymboot/__init__.pyi"));
        assert_eq!(
            fs::read_to_string(stub).expect("read"),
            "def ping() -> None: ...\n"
        );
        assert_eq!(fs::metadata(&report.marker).expect("marker").len(), 0);
    }

    #[test]
    fn missing_stub_still_writes_marker() {
        let tmp = tempdir().expect("tempdir");
        let layout = ProjectLayout::new(tmp.path());

        let report = install_artifacts(&layout).expect("install");

        assert!(report.stub.is_none());
        assert!(!layout.package_stub_path().exists());
        assert!(report.marker.is_file());
    }

    #[test]
    fn overwrites_previous_stub() {
        let tmp = tempdir().expect("tempdir");
        let layout = ProjectLayout::new(tmp.path());
        fs::create_dir_all(layout.package_path()).expect("mkdir");
        fs::write(layout.package_stub_path(), "stale").expect("old stub");
        fs::write(layout.stub_output_path(), "fresh").expect("new stub");

        install_artifacts(&layout).expect("install");

        assert_eq!(
            fs::read_to_string(layout.package_stub_path()).expect("read"),
            "fresh"
        );
    }

    #[test]
    fn marker_twice_stays_empty() {
        let tmp = tempdir().expect("tempdir");
        let marker = tmp.path().join("py.typed");

        write_typed_marker(&marker).expect("first");
        write_typed_marker(&marker).expect("second");

        assert_eq!(fs::read(&marker).expect("read"), b"");
    }

    #[test]
    fn marker_resets_foreign_content() {
        let tmp = tempdir().expect("tempdir");
        let marker = tmp.path().join("py.typed");
        fs::write(&marker, "partial\n").expect("seed");

        write_typed_marker(&marker).expect("write");

        assert_eq!(fs::metadata(&marker).expect("meta").len(), 0);
    }

    #[test]
    fn package_path_blocked_by_file_fails() {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("pymboot"), "not a directory").expect("blocker");
        let layout = ProjectLayout::new(tmp.path());

        let err = install_artifacts(&layout).unwrap_err();
        assert!(format!("{err:#}").contains("creating package directory"));
    }
}
