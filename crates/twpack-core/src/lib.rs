//! Core library for twpack.
//!
//! This crate provides the build-and-release pipeline: deriving plugin
//! versions, keeping the manifest in sync, running build stages in dependency
//! order and bundling the compiled plugin into an importable artifact.

mod bundle;
mod error;
mod files;
mod manifest;
mod pipeline;
mod project;
mod stages;
mod version;

pub use bundle::{Bundler, artifact_file_name};
pub use error::{CoreError, CoreResult};
pub use files::{
    FileResult, FileUpdateError, read_package_version, update_package_version, write_atomic,
};
pub use manifest::{Manifest, ManifestStore};
pub use pipeline::{Pipeline, RunReport, StageDeps};
pub use project::{Project, check_namespace};
pub use stages::{
    BUMP_STAGE, BUNDLE_STAGE, BumpStage, BundleStage, CLEAN_STAGE, COPY_STAGE, CleanStage,
    CommandStage, CopyStage,
};
pub use version::{build_counter, derive_version, parse_version};
