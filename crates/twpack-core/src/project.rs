//! Project assembly.
//!
//! A [`Project`] ties a configuration to a plugin tree on disk and builds the
//! stage pipeline for it.

use std::path::{Path, PathBuf};

use tracing::debug;
use twpack_config::{Config, PluginConfig};
use twpack_plugin::{BuildContext, PluginLoader};

use crate::stages::{BUMP_STAGE, CLEAN_STAGE, COPY_STAGE};
use crate::{
    BumpStage, BundleStage, Bundler, CleanStage, CommandStage, CopyStage, CoreError, CoreResult,
    Manifest, ManifestStore, Pipeline, StageDeps,
};

/// Checks that the manifest belongs to the configured plugin.
///
/// # Errors
///
/// Returns [`CoreError::ConfigMismatch`] if the manifest title is not
/// `$:/plugins/<author>/<name>`.
pub fn check_namespace(plugin: &PluginConfig, manifest: &Manifest) -> CoreResult<()> {
    let expected = plugin.title();
    if manifest.title() == expected {
        Ok(())
    } else {
        Err(CoreError::ConfigMismatch {
            expected,
            found: manifest.title().to_string(),
        })
    }
}

/// A configured plugin project.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config: Config,
    manifest: Manifest,
}

impl Project {
    /// Opens the project rooted at `root`, reading its manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read or does not match the
    /// configured plugin.
    pub fn open(root: impl Into<PathBuf>, config: Config) -> CoreResult<Self> {
        let root = root.into();
        let manifest = Manifest::load(&manifest_path(&root, &config))?;
        Self::from_parts(root, config, manifest)
    }

    /// Assembles a project from an already loaded manifest.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigMismatch`] if the manifest does not match
    /// the configured plugin.
    pub fn from_parts(
        root: impl Into<PathBuf>,
        config: Config,
        manifest: Manifest,
    ) -> CoreResult<Self> {
        check_namespace(&config.plugin, &manifest)?;
        Ok(Self {
            root: root.into(),
            config,
            manifest,
        })
    }

    /// Returns the project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the manifest as read when the project was opened.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Returns a development build context rooted at the project.
    #[must_use]
    pub fn context(&self) -> BuildContext {
        BuildContext::new(&self.root)
    }

    /// Returns the plugin source folder.
    #[must_use]
    pub fn source_dir(&self) -> PathBuf {
        self.root
            .join(&self.config.paths.source)
            .join(self.config.plugin.namespace())
    }

    /// Returns the compiled plugin folder.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.root
            .join(&self.config.paths.output)
            .join(self.config.plugin.namespace())
    }

    /// Returns the store for the manifest and its package descriptor.
    #[must_use]
    pub fn manifest_store(&self) -> ManifestStore {
        let store = ManifestStore::new(manifest_path(&self.root, &self.config));
        if self.config.version.package.is_empty() {
            store
        } else {
            store.with_package(self.root.join(&self.config.version.package))
        }
    }

    /// Builds the stage pipeline, bundling through `loader`.
    #[must_use]
    pub fn pipeline(&self, loader: Box<dyn PluginLoader>) -> Pipeline {
        let paths = &self.config.paths;
        let mut pipeline = Pipeline::new();

        pipeline.add_stage(
            Box::new(CleanStage::new(
                [&paths.output, &paths.bundle, &paths.docs, &paths.maps]
                    .into_iter()
                    .map(|dir| self.root.join(dir))
                    .collect(),
            )),
            StageDeps::new().runs_first(),
        );

        pipeline.add_stage(
            Box::new(BumpStage::new(
                self.manifest_store(),
                self.config.version.auto_increment,
            )),
            StageDeps::new(),
        );

        pipeline.add_stage(
            Box::new(CopyStage::new(
                self.source_dir(),
                self.output_dir(),
                self.config.copy.exclude_extensions.clone(),
            )),
            StageDeps::new().after([BUMP_STAGE]),
        );

        let mut bundle_deps = vec![COPY_STAGE.to_string()];
        for (name, stage) in &self.config.stages {
            pipeline.add_stage(
                Box::new(
                    CommandStage::new(name.clone(), stage.run.clone())
                        .with_production_only(stage.production_only),
                ),
                StageDeps::new()
                    .depends_on(stage.depends_on.iter().cloned())
                    .after(stage.after.iter().cloned()),
            );
            if stage.output {
                bundle_deps.push(name.clone());
            }
        }

        let bundler = Bundler::new(
            loader,
            self.root.join(&paths.output),
            self.root.join(&paths.bundle),
        )
        .notify(self.config.bundle.notify);
        pipeline.add_stage(
            Box::new(BundleStage::new(bundler, self.manifest_store())),
            StageDeps::new().depends_on(bundle_deps).after([BUMP_STAGE]),
        );

        debug!(stages = ?pipeline.stage_names(), "assembled pipeline");
        pipeline
    }

    /// Returns the targets of a run: the requested stages, `bump` when none
    /// are given, and `clean` first when asked for.
    #[must_use]
    pub fn targets(requested: &[String], clean: bool) -> Vec<String> {
        let mut targets = Vec::with_capacity(requested.len() + 1);
        if clean {
            targets.push(CLEAN_STAGE.to_string());
        }
        if requested.is_empty() {
            targets.push(BUMP_STAGE.to_string());
        } else {
            targets.extend(requested.iter().cloned());
        }
        targets
    }
}

fn manifest_path(root: &Path, config: &Config) -> PathBuf {
    root.join(&config.paths.source)
        .join(config.plugin.namespace())
        .join(&config.version.manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use twpack_config::CommandStageConfig;
    use twpack_plugin::{Plugin, PluginResult, TiddlerRecord};

    struct NullLoader;

    impl Plugin for NullLoader {
        fn name(&self) -> &str {
            "null"
        }
        fn version(&self) -> &'static str {
            "1.0.0"
        }
    }

    impl PluginLoader for NullLoader {
        fn boot(&mut self, _invocation: &[String]) -> PluginResult<()> {
            Ok(())
        }

        fn load_plugin(&self, _folder: &Path) -> PluginResult<TiddlerRecord> {
            let mut record = TiddlerRecord::new();
            record.insert("title", "$:/plugins/alice/hello");
            Ok(record)
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.plugin.author = "alice".to_string();
        config.plugin.name = "hello".to_string();
        config
    }

    fn command(run: &str) -> CommandStageConfig {
        CommandStageConfig {
            run: vec![run.to_string()],
            output: true,
            ..CommandStageConfig::default()
        }
    }

    #[test]
    fn test_check_namespace_match() {
        let manifest = Manifest::new("$:/plugins/alice/hello", "1.0.0");
        assert!(check_namespace(&config().plugin, &manifest).is_ok());
    }

    #[test]
    fn test_mismatch_fails_before_any_io() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::new("$:/plugins/bob/hello", "1.0.0");

        let err = Project::from_parts(dir.path(), config(), manifest).unwrap_err();

        match err {
            CoreError::ConfigMismatch { expected, found } => {
                assert_eq!(expected, "$:/plugins/alice/hello");
                assert_eq!(found, "$:/plugins/bob/hello");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_open_reads_manifest() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src/alice/hello");
        fs::create_dir_all(&source).unwrap();
        fs::write(
            source.join("plugin.info"),
            r#"{"title": "$:/plugins/alice/hello", "version": "0.3.0"}"#,
        )
        .unwrap();

        let project = Project::open(dir.path(), config()).unwrap();

        assert_eq!(project.manifest().version(), "0.3.0");
        assert_eq!(project.source_dir(), source);
        assert_eq!(project.output_dir(), dir.path().join("dist/alice/hello"));
        assert_eq!(project.root(), dir.path());
        assert_eq!(project.context().root, dir.path());
    }

    #[test]
    fn test_open_missing_manifest() {
        let dir = TempDir::new().unwrap();
        let err = Project::open(dir.path(), config()).unwrap_err();
        assert!(matches!(err, CoreError::ManifestNotFound(_)));
    }

    #[test]
    fn test_manifest_store_without_package() {
        let mut config = config();
        config.version.package = String::new();
        let manifest = Manifest::new("$:/plugins/alice/hello", "1.0.0");
        let project = Project::from_parts("/work", config, manifest).unwrap();

        let store = project.manifest_store();

        assert_eq!(
            store.manifest_path(),
            Path::new("/work/src/alice/hello/plugin.info")
        );
        assert!(store.package_path().is_none());
        assert_eq!(project.config().plugin.name, "hello");
    }

    #[test]
    fn test_pipeline_wiring() {
        let mut config = config();
        config.stages.insert("compile".to_string(), command("babel"));
        config.stages.insert(
            "lint".to_string(),
            CommandStageConfig {
                output: false,
                ..command("eslint")
            },
        );
        let manifest = Manifest::new("$:/plugins/alice/hello", "1.0.0");
        let project = Project::from_parts("/work", config, manifest).unwrap();

        let pipeline = project.pipeline(Box::new(NullLoader));

        assert_eq!(
            pipeline.stage_names(),
            vec!["clean", "bump", "copy", "compile", "lint", "bundle"]
        );
        let bundle = pipeline.deps("bundle").unwrap();
        assert_eq!(bundle.depends_on, vec!["copy", "compile"]);
        assert_eq!(bundle.after, vec!["bump"]);
        assert!(pipeline.deps("clean").unwrap().runs_first);

        let phases = pipeline
            .plan(&Project::targets(&["bump".to_string(), "bundle".to_string()], true))
            .unwrap();
        assert_eq!(
            phases,
            vec![
                vec!["clean"],
                vec!["bump", "compile"],
                vec!["copy"],
                vec!["bundle"]
            ]
        );
    }

    #[test]
    fn test_reserved_names_match_builtin_stages() {
        assert_eq!(
            twpack_config::BUILTIN_STAGES,
            [CLEAN_STAGE, BUMP_STAGE, COPY_STAGE, crate::BUNDLE_STAGE]
        );
    }

    #[test]
    fn test_default_targets() {
        assert_eq!(Project::targets(&[], false), vec!["bump"]);
        assert_eq!(Project::targets(&[], true), vec!["clean", "bump"]);
        assert_eq!(
            Project::targets(&["copy".to_string()], false),
            vec!["copy"]
        );
    }

    #[test]
    fn test_full_run_bumps_then_bundles() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src/alice/hello");
        fs::create_dir_all(&source).unwrap();
        fs::write(
            source.join("plugin.info"),
            r#"{"title": "$:/plugins/alice/hello", "version": "1.2.5+3"}"#,
        )
        .unwrap();
        fs::write(source.join("readme.tid"), "title: readme\n\nHi").unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"name": "hello", "version": "1.2.5+3"}"#,
        )
        .unwrap();

        let mut config = config();
        config.bundle.notify = false;
        let project = Project::open(dir.path(), config).unwrap();
        let pipeline = project.pipeline(Box::new(NullLoader));
        let ctx = project.context().mode(Some("develop".to_string()));

        let report = pipeline
            .run(&["bump".to_string(), "bundle".to_string()], &ctx)
            .unwrap();

        assert_eq!(report.completed, vec!["bump", "copy", "bundle"]);
        assert!(dir.path().join("dist/alice/hello/readme.tid").exists());
        assert!(
            dir.path()
                .join("bundle/hello_1.2.5-develop+4.json")
                .exists()
        );
        assert_eq!(
            crate::read_package_version(&dir.path().join("package.json")).unwrap(),
            "1.2.5-develop+4"
        );
    }
}
