//! Build stage trait.

use super::Plugin;
use crate::{BuildContext, PluginResult};

/// A named step of the build pipeline.
///
/// Stages are either file-transform passes (they write into the output tree)
/// or side-effecting actions such as the version bump. Ordering between
/// stages is declared when they are registered with the runner, not here.
pub trait Stage: Plugin {
    /// Runs the stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage fails; the pipeline aborts on the first
    /// failing stage.
    fn run(&self, ctx: &BuildContext) -> PluginResult<()>;

    /// Whether the stage only runs in production builds.
    fn production_only(&self) -> bool {
        false
    }
}
