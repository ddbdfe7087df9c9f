//! Build trees
//!
//! A build tree is a root build plus the builds it includes. Every build has
//! its own controller; they share only the [`BuildTreeContext`].

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::cache::{ConfigurationCache, DisabledConfigurationCache, SqliteConfigurationCache};
use super::controller::{
    BuildCollaborators, BuildFinishedListener, BuildLifecycleController, BuildWorkExecutor,
    LoggingBuildFinishedListener,
};
use super::loader::{BuildLoader, DefaultProjectFactory, ProjectFactory};
use super::model::BuildModel;
use super::prepare::{DefaultProjectsPreparer, DefaultSettingsPreparer};
use super::progress::ProgressListener;
use super::services::ServiceScope;
use super::tasks::{DefaultTaskSelector, DryRunExecutor};
use crate::domain::{CancellationToken, ProjectPath};
use crate::scope::ClassLoaderScopeRegistry;
use crate::settings::{
    BuildKind, DirectoryBuildSrc, IncludedBuild, PropertiesLoader, ScriptEvaluatingProcessor,
    SettingsLoader, SettingsLocationFinder, SettingsPipeline, StartParameter, TomlSettingsScript,
    UpwardSettingsFinder,
};

/// The client that requested the build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientMetadata {
    pub name: String,
    pub version: String,
}

impl ClientMetadata {
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// State shared read-only by every build of a tree
#[derive(Clone)]
pub struct BuildTreeContext {
    cancellation: Arc<CancellationToken>,
    client: ClientMetadata,
    progress: Arc<dyn ProgressListener>,
    scopes: Arc<ClassLoaderScopeRegistry>,
}

impl BuildTreeContext {
    pub fn new(scopes: Arc<ClassLoaderScopeRegistry>, progress: Arc<dyn ProgressListener>) -> Self {
        Self {
            cancellation: Arc::new(CancellationToken::new()),
            client: ClientMetadata::current(),
            progress,
            scopes,
        }
    }

    pub fn with_client(mut self, client: ClientMetadata) -> Self {
        self.client = client;
        self
    }

    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    pub fn client(&self) -> &ClientMetadata {
        &self.client
    }

    pub fn progress(&self) -> &Arc<dyn ProgressListener> {
        &self.progress
    }

    pub fn scopes(&self) -> &Arc<ClassLoaderScopeRegistry> {
        &self.scopes
    }
}

impl fmt::Debug for BuildTreeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildTreeContext")
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

/// Creates controllers for the root build and its included builds
pub struct BuildControllerFactory {
    tree: BuildTreeContext,
    properties: Arc<dyn PropertiesLoader>,
    project_factory: Arc<dyn ProjectFactory>,
    executor: Arc<dyn BuildWorkExecutor>,
    finished: Arc<dyn BuildFinishedListener>,
}

impl BuildControllerFactory {
    pub fn new(tree: BuildTreeContext, properties: Arc<dyn PropertiesLoader>) -> Self {
        let executor = Arc::new(DryRunExecutor::new(Arc::clone(tree.cancellation())));
        Self {
            tree,
            properties,
            project_factory: Arc::new(DefaultProjectFactory),
            executor,
            finished: Arc::new(LoggingBuildFinishedListener),
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn BuildWorkExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_project_factory(mut self, factory: Arc<dyn ProjectFactory>) -> Self {
        self.project_factory = factory;
        self
    }

    pub fn with_finished_listener(mut self, listener: Arc<dyn BuildFinishedListener>) -> Self {
        self.finished = listener;
        self
    }

    pub fn tree(&self) -> &BuildTreeContext {
        &self.tree
    }

    /// Controller for the root build of the tree
    pub fn root_build(&self, start: StartParameter) -> BuildLifecycleController {
        self.create(ProjectPath::root(), start, BuildKind::TopLevel)
    }

    /// Controller for a build included by `parent`
    pub fn nested_build(&self, included: &IncludedBuild, parent: &StartParameter) -> BuildLifecycleController {
        let start = parent.for_nested_build(&included.root_dir);
        self.create(included.build_path.clone(), start, BuildKind::Nested)
    }

    fn create(&self, build_path: ProjectPath, start: StartParameter, kind: BuildKind) -> BuildLifecycleController {
        debug!(build = %build_path, kind = ?kind, dir = %start.current_dir.display(), "Creating build controller");

        let finder: Arc<dyn SettingsLocationFinder> = Arc::new(UpwardSettingsFinder);
        let progress = Arc::clone(self.tree.progress());
        let scopes = Arc::clone(self.tree.scopes());

        let core = ScriptEvaluatingProcessor::new(Arc::clone(&self.properties), Arc::new(TomlSettingsScript));
        let settings_loader = SettingsLoader::new(
            Arc::clone(&finder),
            Arc::new(DirectoryBuildSrc),
            SettingsPipeline::for_kind(kind, core, Arc::clone(&progress)),
        );
        let build_loader = BuildLoader::new(Arc::clone(&self.project_factory));

        let cache: Arc<dyn ConfigurationCache> = match kind {
            BuildKind::TopLevel => Arc::new(SqliteConfigurationCache::new(
                finder,
                Arc::clone(&self.properties),
                build_loader.clone(),
                Arc::clone(&scopes),
            )),
            BuildKind::Nested => Arc::new(DisabledConfigurationCache),
        };

        let collaborators = BuildCollaborators {
            settings: Arc::new(DefaultSettingsPreparer::new(settings_loader, scopes)),
            projects: Arc::new(DefaultProjectsPreparer::new(build_loader, Arc::clone(&progress))),
            task_graph: Arc::new(DefaultTaskSelector),
            executor: Arc::clone(&self.executor),
            cache,
            finished: Arc::clone(&self.finished),
            progress,
        };

        let services = ServiceScope::new(format!("build '{}'", build_path));
        BuildLifecycleController::new(BuildModel::new(build_path, start), collaborators, services)
    }
}

impl fmt::Debug for BuildControllerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildControllerFactory")
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}
