//! Settings processing pipeline
//!
//! Settings are produced by a core processor wrapped in an ordered list of
//! middleware. `before` hooks run outermost first; `after` hooks run
//! innermost first, mirroring nested decorators.
//!
//! | Middleware | Top-level | Nested |
//! |------------|-----------|--------|
//! | [`ProgressMiddleware`] | yes | yes |
//! | [`IncludedBuildRegistration`] | yes | yes |
//! | [`CommandLineIncludedBuilds`] | yes | no |

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::location::SettingsLocation;
use super::properties::PropertiesLoader;
use super::script::{ScriptEvaluator, ScriptSource};
use super::settings::{IncludedBuild, Settings, SettingsError, SettingsState};
use super::start::StartParameter;
use crate::build::{BuildProgressEvent, ProgressListener, ServiceScope};
use crate::domain::{ProjectPath, ProjectSnapshot};
use crate::scope::ClassLoaderScope;

/// Whether a build is the root of a build tree or included into one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    TopLevel,
    Nested,
}

/// Inputs of one settings processing run
#[derive(Debug, Clone, Copy)]
pub struct SettingsRequest<'a> {
    pub location: &'a SettingsLocation,
    pub start_parameter: &'a StartParameter,
    /// Parent of the settings scope
    pub base_scope: &'a Arc<ClassLoaderScope>,
    pub build_path: &'a ProjectPath,
}

pub trait SettingsMiddleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn before(&self, _request: &SettingsRequest<'_>) -> Result<()> {
        Ok(())
    }

    fn after(&self, _request: &SettingsRequest<'_>, _state: &mut SettingsState) -> Result<()> {
        Ok(())
    }
}

/// Loads properties, evaluates the settings script and locks the settings
/// scope
pub struct ScriptEvaluatingProcessor {
    properties: Arc<dyn PropertiesLoader>,
    evaluator: Arc<dyn ScriptEvaluator>,
}

impl ScriptEvaluatingProcessor {
    pub fn new(properties: Arc<dyn PropertiesLoader>, evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        Self { properties, evaluator }
    }

    pub fn process(&self, request: &SettingsRequest<'_>) -> Result<SettingsState> {
        let location = request.location;
        let start = request.start_parameter;

        let properties = self.properties.load_properties(&location.settings_dir, start)?;
        let scope = request.base_scope.create_child("settings");
        let mut settings = Settings::new(location, start.clone(), properties, Arc::clone(&scope))?;

        if !start.use_empty_settings {
            if let Some(file) = &location.settings_file {
                let script = ScriptSource::from_file(file)?;
                self.evaluator
                    .evaluate(&script, &mut settings, &scope)
                    .with_context(|| format!("Failed to evaluate {}", script.display_name()))?;
            }
        }
        scope.lock();

        let services = ServiceScope::new(format!("settings of build '{}'", request.build_path));
        Ok(SettingsState::new(settings, services))
    }
}

/// Ordered middleware around a [`ScriptEvaluatingProcessor`]
pub struct SettingsPipeline {
    middleware: Vec<Arc<dyn SettingsMiddleware>>,
    core: ScriptEvaluatingProcessor,
}

impl SettingsPipeline {
    pub fn new(core: ScriptEvaluatingProcessor) -> Self {
        Self {
            middleware: Vec::new(),
            core,
        }
    }

    /// Adds middleware inside everything added so far
    pub fn with(mut self, middleware: Arc<dyn SettingsMiddleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// The standard pipeline for a kind of build
    pub fn for_kind(kind: BuildKind, core: ScriptEvaluatingProcessor, progress: Arc<dyn ProgressListener>) -> Self {
        let pipeline = Self::new(core)
            .with(Arc::new(ProgressMiddleware::new(progress)))
            .with(Arc::new(IncludedBuildRegistration));
        match kind {
            BuildKind::TopLevel => pipeline.with(Arc::new(CommandLineIncludedBuilds)),
            BuildKind::Nested => pipeline,
        }
    }

    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    pub fn process(&self, request: &SettingsRequest<'_>) -> Result<SettingsState> {
        for middleware in &self.middleware {
            middleware
                .before(request)
                .with_context(|| format!("Settings middleware '{}' failed", middleware.name()))?;
        }

        let mut state = self.core.process(request)?;

        for middleware in self.middleware.iter().rev() {
            if let Err(e) = middleware.after(request, &mut state) {
                if let Err(close) = state.close() {
                    warn!(error = %close, "Failed to close settings after middleware failure");
                }
                return Err(e);
            }
        }

        Ok(state)
    }
}

/// Reports settings evaluation to the progress listener
pub struct ProgressMiddleware {
    listener: Arc<dyn ProgressListener>,
}

impl ProgressMiddleware {
    pub fn new(listener: Arc<dyn ProgressListener>) -> Self {
        Self { listener }
    }
}

impl SettingsMiddleware for ProgressMiddleware {
    fn name(&self) -> &'static str {
        "progress"
    }

    fn before(&self, request: &SettingsRequest<'_>) -> Result<()> {
        self.listener.on_event(&BuildProgressEvent::SettingsEvaluationStarted {
            build_path: request.build_path.clone(),
            settings_dir: request.location.settings_dir.clone(),
            settings_file: request.location.settings_file.clone(),
        });
        Ok(())
    }

    fn after(&self, request: &SettingsRequest<'_>, state: &mut SettingsState) -> Result<()> {
        let settings = state.settings();
        let root_project = ProjectSnapshot::from_registry(settings.registry(), request.build_path)
            .ok_or(SettingsError::NoRootProject)?;
        self.listener.on_event(&BuildProgressEvent::SettingsEvaluated {
            build_path: request.build_path.clone(),
            settings_dir: settings.settings_dir().to_path_buf(),
            root_project,
            included_builds: state.included_builds().iter().map(|b| b.root_dir.clone()).collect(),
        });
        Ok(())
    }
}

/// Adds `--include-build` directories of the top-level build
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandLineIncludedBuilds;

impl SettingsMiddleware for CommandLineIncludedBuilds {
    fn name(&self) -> &'static str {
        "command-line-included-builds"
    }

    fn after(&self, request: &SettingsRequest<'_>, state: &mut SettingsState) -> Result<()> {
        for dir in &request.start_parameter.included_builds {
            debug!(dir = %dir.display(), "Including build from command line");
            state.settings_mut().include_build(dir);
        }
        Ok(())
    }
}

/// Validates requested included builds and registers them by name
#[derive(Debug, Default, Clone, Copy)]
pub struct IncludedBuildRegistration;

impl SettingsMiddleware for IncludedBuildRegistration {
    fn name(&self) -> &'static str {
        "included-build-registration"
    }

    fn after(&self, request: &SettingsRequest<'_>, state: &mut SettingsState) -> Result<()> {
        let builds = register_included_builds(state.settings(), request.build_path)?;
        state.set_included_builds(builds);
        Ok(())
    }
}

fn register_included_builds(settings: &Settings, build_path: &ProjectPath) -> Result<Vec<IncludedBuild>, SettingsError> {
    let mut names: HashMap<String, PathBuf> = HashMap::new();
    let mut builds = Vec::new();

    for dir in settings.included_builds() {
        if !dir.exists() {
            return Err(SettingsError::MissingIncludedBuild(dir.clone()));
        }
        if !dir.is_dir() {
            return Err(SettingsError::IncludedBuildNotDirectory(dir.clone()));
        }
        if dir == settings.settings_dir() {
            return Err(SettingsError::IncludesItself(dir.clone()));
        }

        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("included")
            .replace(':', "_");
        if let Some(existing) = names.get(&name) {
            return Err(SettingsError::DuplicateIncludedBuild {
                name,
                dir: dir.clone(),
                existing: existing.clone(),
            });
        }
        names.insert(name.clone(), dir.clone());

        builds.push(IncludedBuild {
            build_path: build_path.child(&name)?,
            name,
            root_dir: dir.clone(),
        });
    }

    Ok(builds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ClassLoaderScopeRegistry;
    use crate::settings::{TomlPropertiesLoader, TomlSettingsScript};
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recording(Mutex<Vec<BuildProgressEvent>>);

    impl ProgressListener for Recording {
        fn on_event(&self, event: &BuildProgressEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    struct Tracing {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_after: bool,
    }

    impl SettingsMiddleware for Tracing {
        fn name(&self) -> &'static str {
            self.name
        }

        fn before(&self, _request: &SettingsRequest<'_>) -> Result<()> {
            self.log.lock().unwrap().push(format!("before {}", self.name));
            Ok(())
        }

        fn after(&self, _request: &SettingsRequest<'_>, _state: &mut SettingsState) -> Result<()> {
            self.log.lock().unwrap().push(format!("after {}", self.name));
            if self.fail_after {
                anyhow::bail!("{} failed", self.name);
            }
            Ok(())
        }
    }

    fn core() -> ScriptEvaluatingProcessor {
        ScriptEvaluatingProcessor::new(Arc::new(TomlPropertiesLoader::new(None)), Arc::new(TomlSettingsScript))
    }

    fn project(settings: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("settings.toml"), settings).unwrap();
        dir
    }

    fn run(pipeline: &SettingsPipeline, dir: &Path, start: &StartParameter) -> Result<SettingsState> {
        let scopes = ClassLoaderScopeRegistry::empty();
        let location = SettingsLocation::new(dir, Some(dir.join("settings.toml")));
        pipeline.process(&SettingsRequest {
            location: &location,
            start_parameter: start,
            base_scope: scopes.core_and_plugins_scope(),
            build_path: &ProjectPath::root(),
        })
    }

    #[test]
    fn hooks_run_as_nested_decorators() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = SettingsPipeline::new(core())
            .with(Arc::new(Tracing { name: "outer", log: Arc::clone(&log), fail_after: false }))
            .with(Arc::new(Tracing { name: "inner", log: Arc::clone(&log), fail_after: false }));

        let dir = project("include = [\"a\"]\n");
        let state = run(&pipeline, dir.path(), &StartParameter::new(dir.path())).unwrap();

        assert!(state.settings().find_project(":a").is_some());
        assert!(state.settings().class_loader_scope().is_locked());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before outer", "before inner", "after inner", "after outer"]
        );
        state.close().unwrap();
    }

    #[test]
    fn failing_after_hook_stops_pipeline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = SettingsPipeline::new(core())
            .with(Arc::new(Tracing { name: "outer", log: Arc::clone(&log), fail_after: false }))
            .with(Arc::new(Tracing { name: "inner", log: Arc::clone(&log), fail_after: true }));

        let dir = project("");
        let err = run(&pipeline, dir.path(), &StartParameter::new(dir.path())).unwrap_err();
        assert_eq!(err.to_string(), "inner failed");
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("after inner"));
    }

    #[test]
    fn top_level_and_nested_compositions() {
        let listener: Arc<dyn ProgressListener> = Arc::new(Recording::default());
        let top = SettingsPipeline::for_kind(BuildKind::TopLevel, core(), Arc::clone(&listener));
        let nested = SettingsPipeline::for_kind(BuildKind::Nested, core(), listener);

        assert_eq!(
            top.middleware_names(),
            vec!["progress", "included-build-registration", "command-line-included-builds"]
        );
        assert_eq!(nested.middleware_names(), vec!["progress", "included-build-registration"]);
    }

    #[test]
    fn command_line_builds_are_registered() {
        let tree = TempDir::new().unwrap();
        let root = tree.path().join("app");
        let lib = tree.path().join("lib");
        let tools = tree.path().join("tools");
        for dir in [&root, &lib, &tools] {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(root.join("settings.toml"), "include_build = [\"../lib\"]\n").unwrap();

        let recording = Arc::new(Recording::default());
        let pipeline = SettingsPipeline::for_kind(BuildKind::TopLevel, core(), recording.clone());
        let start = StartParameter::new(&root).with_included_build(Path::new("../tools"));
        let state = run(&pipeline, &root, &start).unwrap();

        let names: Vec<(&str, String)> = state
            .included_builds()
            .iter()
            .map(|b| (b.name.as_str(), b.build_path.to_string()))
            .collect();
        assert_eq!(names, vec![("lib", ":lib".to_string()), ("tools", ":tools".to_string())]);

        let events = recording.0.lock().unwrap();
        assert!(matches!(events[0], BuildProgressEvent::SettingsEvaluationStarted { .. }));
        match &events[1] {
            BuildProgressEvent::SettingsEvaluated { included_builds, .. } => {
                assert_eq!(included_builds.len(), 2)
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn nested_pipeline_ignores_command_line_builds() {
        let tree = TempDir::new().unwrap();
        let root = tree.path().join("app");
        let tools = tree.path().join("tools");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&tools).unwrap();
        fs::write(root.join("settings.toml"), "").unwrap();

        let pipeline = SettingsPipeline::for_kind(BuildKind::Nested, core(), Arc::new(Recording::default()));
        let start = StartParameter::new(&root).with_included_build(Path::new("../tools"));
        let state = run(&pipeline, &root, &start).unwrap();
        assert!(state.included_builds().is_empty());
    }

    #[test]
    fn missing_and_duplicate_builds_are_rejected() {
        let tree = TempDir::new().unwrap();
        let root = tree.path().join("app");
        fs::create_dir_all(root.join("x/lib")).unwrap();
        fs::create_dir_all(root.join("y/lib")).unwrap();

        fs::write(root.join("settings.toml"), "include_build = [\"missing\"]\n").unwrap();
        let pipeline = SettingsPipeline::for_kind(BuildKind::Nested, core(), Arc::new(Recording::default()));
        let err = run(&pipeline, &root, &StartParameter::new(&root)).unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        fs::write(root.join("settings.toml"), "include_build = [\"x/lib\", \"y/lib\"]\n").unwrap();
        let err = run(&pipeline, &root, &StartParameter::new(&root)).unwrap_err();
        assert!(err.to_string().contains("build name 'lib'"));
    }
}
