//! Plugin traits.

pub mod loader;
pub mod stage;

/// Base trait for all plugins.
pub trait Plugin: Send + Sync {
    /// Returns the plugin name.
    fn name(&self) -> &str;

    /// Returns the plugin version.
    fn version(&self) -> &'static str;

    /// Returns a short description of the plugin.
    fn description(&self) -> &'static str {
        ""
    }
}
