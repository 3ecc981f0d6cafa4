//! Built-in build stages.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, info};
use twpack_plugin::{BuildContext, Plugin, PluginError, PluginResult, Stage};
use walkdir::WalkDir;

use crate::{Bundler, ManifestStore};

/// Name of the cleanup stage.
pub const CLEAN_STAGE: &str = "clean";
/// Name of the version bump stage.
pub const BUMP_STAGE: &str = "bump";
/// Name of the verbatim copy stage.
pub const COPY_STAGE: &str = "copy";
/// Name of the bundle stage.
pub const BUNDLE_STAGE: &str = "bundle";

/// Removes the generated directories.
pub struct CleanStage {
    dirs: Vec<PathBuf>,
}

impl CleanStage {
    /// Creates a stage removing `dirs`.
    #[must_use]
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }
}

impl Plugin for CleanStage {
    fn name(&self) -> &str {
        CLEAN_STAGE
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &'static str {
        "Removes output, bundle, docs and maps directories"
    }
}

impl Stage for CleanStage {
    fn run(&self, ctx: &BuildContext) -> PluginResult<()> {
        for dir in &self.dirs {
            let dir = ctx.resolve(dir);
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
                info!(dir = %dir.display(), "removed");
            }
        }
        Ok(())
    }
}

/// Derives the next version and persists it through the manifest store.
pub struct BumpStage {
    store: ManifestStore,
    auto_increment: bool,
}

impl BumpStage {
    /// Creates a bump stage writing through `store`.
    #[must_use]
    pub fn new(store: ManifestStore, auto_increment: bool) -> Self {
        Self {
            store,
            auto_increment,
        }
    }
}

impl Plugin for BumpStage {
    fn name(&self) -> &str {
        BUMP_STAGE
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &'static str {
        "Updates the plugin version in the manifest and package descriptor"
    }
}

impl Stage for BumpStage {
    fn run(&self, ctx: &BuildContext) -> PluginResult<()> {
        self.store
            .bump(ctx.mode_label(), self.auto_increment, Utc::now())?;
        Ok(())
    }
}

/// Copies the plugin sources verbatim into the output tree.
///
/// Files whose extension is handed to an external compiler are skipped.
pub struct CopyStage {
    source: PathBuf,
    destination: PathBuf,
    exclude_extensions: Vec<String>,
}

impl CopyStage {
    /// Creates a copy stage from `source` to `destination`.
    #[must_use]
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        exclude_extensions: Vec<String>,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            exclude_extensions,
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.exclude_extensions
                    .iter()
                    .any(|excluded| excluded.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
    }
}

impl Plugin for CopyStage {
    fn name(&self) -> &str {
        COPY_STAGE
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &'static str {
        "Copies non-code plugin files into the output tree"
    }
}

impl Stage for CopyStage {
    fn run(&self, ctx: &BuildContext) -> PluginResult<()> {
        let source = ctx.resolve(&self.source);
        let destination = ctx.resolve(&self.destination);

        if !source.is_dir() {
            return Err(PluginError::ExecutionFailed(format!(
                "plugin source folder not found: {}",
                source.display()
            )));
        }

        let mut copied = 0_usize;
        for entry in WalkDir::new(&source).sort_by_file_name() {
            let entry = entry.map_err(|e| PluginError::Io(e.into()))?;
            if !entry.file_type().is_file() || self.is_excluded(entry.path()) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&source)
                .map_err(|e| PluginError::ExecutionFailed(e.to_string()))?;
            let target = destination.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            debug!(file = %relative.display(), "copied");
            copied += 1;
        }

        info!(files = copied, destination = %destination.display(), "copied plugin files");
        Ok(())
    }
}

/// Runs external command lines through the platform shell.
///
/// Used for the transpiler, linter and documentation generator.
pub struct CommandStage {
    name: String,
    commands: Vec<String>,
    production_only: bool,
}

impl CommandStage {
    /// Creates a command stage.
    #[must_use]
    pub fn new(name: impl Into<String>, commands: Vec<String>) -> Self {
        Self {
            name: name.into(),
            commands,
            production_only: false,
        }
    }

    /// Restricts the stage to production builds.
    #[must_use]
    pub fn with_production_only(mut self, production_only: bool) -> Self {
        self.production_only = production_only;
        self
    }

    /// Returns the command lines.
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

fn shell(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.args(["/C", command_line]);
        command
    } else {
        let mut command = Command::new("sh");
        command.args(["-c", command_line]);
        command
    }
}

impl Plugin for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &'static str {
        "Runs external commands"
    }
}

impl Stage for CommandStage {
    fn run(&self, ctx: &BuildContext) -> PluginResult<()> {
        for command_line in &self.commands {
            debug!(stage = %self.name, command = %command_line, cwd = %ctx.root.display(), "running command");

            let output = shell(command_line)
                .current_dir(&ctx.root)
                .env("TWPACK_PRODUCTION", if ctx.production { "1" } else { "0" })
                .env("TWPACK_MODE", ctx.mode_label().unwrap_or_default())
                .output()
                .map_err(|e| {
                    PluginError::ExecutionFailed(format!("failed to execute '{command_line}': {e}"))
                })?;

            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                debug!(stage = %self.name, "{}", stdout.trim_end());
            }

            if !output.status.success() {
                let code = output
                    .status
                    .code()
                    .map_or_else(|| "a signal".to_string(), |code| format!("code {code}"));
                return Err(PluginError::ExecutionFailed(format!(
                    "'{command_line}' exited with {code}: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
        }
        Ok(())
    }

    fn production_only(&self) -> bool {
        self.production_only
    }
}

/// Bundles the output tree using the manifest as persisted on disk.
///
/// The manifest is read when the stage runs, so a bump earlier in the same run
/// is reflected in the artifact name.
pub struct BundleStage {
    bundler: Mutex<Bundler>,
    store: ManifestStore,
}

impl BundleStage {
    /// Creates a bundle stage.
    #[must_use]
    pub fn new(bundler: Bundler, store: ManifestStore) -> Self {
        Self {
            bundler: Mutex::new(bundler),
            store,
        }
    }
}

impl Plugin for BundleStage {
    fn name(&self) -> &str {
        BUNDLE_STAGE
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &'static str {
        "Packages the output tree into an importable JSON artifact"
    }
}

impl Stage for BundleStage {
    fn run(&self, _ctx: &BuildContext) -> PluginResult<()> {
        let manifest = self.store.load()?;
        let mut bundler = self
            .bundler
            .lock()
            .map_err(|_| PluginError::ExecutionFailed("bundler lock poisoned".to_string()))?;
        bundler.bundle(&manifest)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use twpack_plugin::{PluginLoader, TiddlerRecord};

    use crate::Manifest;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_clean_removes_dirs() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("dist/alice/hello/readme.tid"), "x");
        write(&dir.path().join("bundle/hello_1.0.0.json"), "[]");

        let stage = CleanStage::new(vec!["dist".into(), "bundle".into(), "docs".into()]);
        stage.run(&BuildContext::new(dir.path())).unwrap();

        assert!(!dir.path().join("dist").exists());
        assert!(!dir.path().join("bundle").exists());
    }

    #[test]
    fn test_copy_skips_code_files() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src/alice/hello");
        write(&source.join("plugin.info"), "{}");
        write(&source.join("readme.tid"), "title: readme");
        write(&source.join("widgets/hello.js"), "exports.x = 1;");
        write(&source.join("widgets/hello.js.meta"), "title: $:/x");
        write(&source.join("styles/main.CSS"), "body {}");

        let stage = CopyStage::new("src/alice/hello", "dist/alice/hello", vec!["js".into()]);
        stage.run(&BuildContext::new(dir.path())).unwrap();

        let output = dir.path().join("dist/alice/hello");
        assert!(output.join("plugin.info").exists());
        assert!(output.join("readme.tid").exists());
        assert!(output.join("widgets/hello.js.meta").exists());
        assert!(output.join("styles/main.CSS").exists());
        assert!(!output.join("widgets/hello.js").exists());
    }

    #[test]
    fn test_copy_extension_match_ignores_dot_and_case() {
        let stage = CopyStage::new("a", "b", vec![".TS".into()]);
        assert!(stage.is_excluded(Path::new("x/widget.ts")));
        assert!(!stage.is_excluded(Path::new("x/widget.tsx")));
        assert!(!stage.is_excluded(Path::new("Makefile")));
    }

    #[test]
    fn test_copy_missing_source() {
        let dir = TempDir::new().unwrap();
        let stage = CopyStage::new("src/alice/hello", "dist/alice/hello", vec![]);
        let err = stage.run(&BuildContext::new(dir.path())).unwrap_err();
        assert!(err.to_string().contains("plugin source folder not found"));
    }

    #[test]
    fn test_bump_stage_uses_context_mode() {
        let dir = TempDir::new().unwrap();
        let manifest_path = dir.path().join("plugin.info");
        write(
            &manifest_path,
            r#"{"title": "$:/plugins/alice/hello", "version": "1.2.5+3"}"#,
        );

        let stage = BumpStage::new(ManifestStore::new(&manifest_path), true);
        let ctx = BuildContext::new(dir.path()).mode(Some("develop".to_string()));
        stage.run(&ctx).unwrap();

        let manifest = Manifest::load(&manifest_path).unwrap();
        assert_eq!(manifest.version(), "1.2.5-develop+4");
        assert!(manifest.released().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_stage_runs_in_root() {
        let dir = TempDir::new().unwrap();
        let stage = CommandStage::new(
            "compile",
            vec![
                "mkdir -p dist".to_string(),
                "echo \"$TWPACK_MODE\" > dist/mode.txt".to_string(),
            ],
        );
        let ctx = BuildContext::new(dir.path()).mode(Some("testing".to_string()));

        stage.run(&ctx).unwrap();

        let mode = fs::read_to_string(dir.path().join("dist/mode.txt")).unwrap();
        assert_eq!(mode.trim(), "testing");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_stage_exports_mainline_as_empty_mode() {
        let dir = TempDir::new().unwrap();
        let stage = CommandStage::new(
            "compile",
            vec!["printf '%s' \"$TWPACK_MODE\" > mode.txt".to_string()],
        );
        let ctx = BuildContext::new(dir.path()).mode(Some("master".to_string()));

        stage.run(&ctx).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("mode.txt")).unwrap(), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_stage_failure_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let stage = CommandStage::new(
            "lint",
            vec!["echo 'bad syntax' >&2; exit 3".to_string(), "touch never".to_string()],
        );

        let err = stage.run(&BuildContext::new(dir.path())).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("exited with code 3"));
        assert!(message.contains("bad syntax"));
        assert!(!dir.path().join("never").exists());
    }

    #[test]
    fn test_command_stage_production_only() {
        let stage = CommandStage::new("docs", vec!["jsdoc".to_string()]).with_production_only(true);
        assert!(stage.production_only());
        assert_eq!(stage.name(), "docs");
        assert_eq!(stage.commands(), ["jsdoc".to_string()]);
    }

    struct TitleLoader;

    impl Plugin for TitleLoader {
        fn name(&self) -> &str {
            "title"
        }
        fn version(&self) -> &'static str {
            "1.0.0"
        }
    }

    impl PluginLoader for TitleLoader {
        fn boot(&mut self, _invocation: &[String]) -> PluginResult<()> {
            Ok(())
        }

        fn load_plugin(&self, folder: &Path) -> PluginResult<TiddlerRecord> {
            if !folder.is_dir() {
                return Err(PluginError::load_failed(folder, "missing"));
            }
            let mut record = TiddlerRecord::new();
            record.insert("title", "$:/plugins/alice/hello");
            Ok(record)
        }
    }

    #[test]
    fn test_bundle_stage_reads_persisted_manifest() {
        let dir = TempDir::new().unwrap();
        let manifest_path = dir.path().join("plugin.info");
        write(
            &manifest_path,
            r#"{"title": "$:/plugins/alice/hello", "version": "0.1.0+7"}"#,
        );
        fs::create_dir_all(dir.path().join("dist/alice/hello")).unwrap();

        let bundler = Bundler::new(
            Box::new(TitleLoader),
            dir.path().join("dist"),
            dir.path().join("bundle"),
        );
        let stage = BundleStage::new(bundler, ManifestStore::new(&manifest_path));
        stage.run(&BuildContext::new(dir.path())).unwrap();

        assert!(dir.path().join("bundle/hello_0.1.0+7.json").exists());
    }

    #[test]
    fn test_bundle_stage_missing_manifest() {
        let dir = TempDir::new().unwrap();
        let bundler = Bundler::new(Box::new(TitleLoader), dir.path(), dir.path());
        let stage = BundleStage::new(bundler, ManifestStore::new(dir.path().join("plugin.info")));

        let err = stage.run(&BuildContext::new(dir.path())).unwrap_err();

        assert!(err.to_string().starts_with("manifest not found"));
    }
}
