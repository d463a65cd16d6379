//! Build context detection.

use serde::Serialize;

use crate::layout::ProjectLayout;

/// What kind of tree a build hook was invoked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildContext {
    /// Live checkout with the Cargo manifest and the native toolchain.
    FullSource,
    /// Unpacked source distribution; stubs were generated when it was made.
    StrippedDistribution,
}

impl BuildContext {
    /// Inspect the filesystem. Never fails: a missing manifest is an answer.
    pub fn detect(layout: &ProjectLayout) -> Self {
        if layout.manifest_path().exists() {
            BuildContext::FullSource
        } else {
            BuildContext::StrippedDistribution
        }
    }

    pub fn requires_generation(self) -> bool {
        matches!(self, BuildContext::FullSource)
    }
}

/// Shorthand for `BuildContext::detect(layout).requires_generation()`.
pub fn requires_generation(layout: &ProjectLayout) -> bool {
    BuildContext::detect(layout).requires_generation()
}
