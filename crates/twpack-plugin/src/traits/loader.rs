//! Host plugin loader trait.

use std::path::Path;

use super::Plugin;
use crate::{PluginResult, TiddlerRecord};

/// Placeholder option handed to the host on boot.
///
/// The host prints its help text instead of booting when invoked without any
/// option, so the session is always given at least this one.
pub const HOST_PLACEHOLDER_ARG: &str = "--version";

/// Loads a compiled plugin folder into the host's canonical record form.
///
/// The loader runs outside the host's normal entry point, so it is booted
/// explicitly before any folder is loaded.
pub trait PluginLoader: Plugin {
    /// Starts the host session with the given invocation options.
    ///
    /// # Errors
    ///
    /// Returns an error if the invocation is empty or the host fails to start.
    fn boot(&mut self, invocation: &[String]) -> PluginResult<()>;

    /// Loads the plugin folder and serializes it into one tiddler record.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not booted, or if the folder is
    /// missing or malformed.
    fn load_plugin(&self, folder: &Path) -> PluginResult<TiddlerRecord>;
}
