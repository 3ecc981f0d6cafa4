//! Plugin system for twpack.
//!
//! This crate provides the traits the build pipeline is assembled from:
//! - [`Plugin`]: Base trait for all plugins
//! - [`Stage`]: A named step of the build pipeline
//! - [`PluginLoader`]: Turns a compiled plugin folder into its host record

mod context;
mod error;
mod record;
mod traits;

pub use context::{BuildContext, MAINLINE_MODE, mode_label};
pub use error::{PluginError, PluginResult};
pub use record::{TiddlerRecord, to_host_json};
pub use traits::Plugin;
pub use traits::loader::{HOST_PLACEHOLDER_ARG, PluginLoader};
pub use traits::stage::Stage;
