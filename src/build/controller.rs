//! Build lifecycle controller
//!
//! Drives one build through its stages:
//!
//! ```text
//! Created → LoadSettings → Configure → TaskGraph → RunTasks → Finished
//! ```
//!
//! Every request names the stage it needs; stages already reached are not
//! run again. Each transition is one collaborator call and the stage only
//! advances when that call succeeds. The first failure is captured and
//! returned, unchanged, from every later request until the build is
//! finished.
//!
//! With a configuration cache entry available, a fresh controller asked for
//! anything beyond settings loads the cached configuration and jumps
//! straight to `TaskGraph`.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use thiserror::Error;
use tracing::{debug, info};

use super::cache::ConfigurationCache;
use super::model::BuildModel;
use super::progress::{BuildProgressEvent, ProgressListener};
use super::services::{ServiceError, ServiceScope};
use crate::domain::Stage;
use crate::settings::Settings;

/// Loads the settings of a build into its model
pub trait SettingsPreparer: Send + Sync {
    fn prepare_settings(&self, model: &mut BuildModel) -> Result<()>;
}

/// Creates the project tree from loaded settings
pub trait ProjectsPreparer: Send + Sync {
    fn prepare_projects(&self, model: &mut BuildModel) -> Result<()>;
}

/// Calculates the task graph of a configured build
pub trait TaskExecutionPreparer: Send + Sync {
    fn prepare_for_task_execution(&self, model: &mut BuildModel) -> Result<()>;
}

/// Runs the scheduled work of a build
pub trait BuildWorkExecutor: Send + Sync {
    fn execute(&self, model: &BuildModel) -> Result<()>;
}

/// Notified once when a build finishes
pub trait BuildFinishedListener: Send + Sync {
    fn build_finished(&self, model: &BuildModel, result: &BuildResult) -> Result<()>;
}

/// Logs the outcome of every build
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingBuildFinishedListener;

impl BuildFinishedListener for LoggingBuildFinishedListener {
    fn build_finished(&self, model: &BuildModel, result: &BuildResult) -> Result<()> {
        match &result.failure {
            Some(failure) => debug!(build = %model.build_path(), action = result.action, failure = %failure, "BUILD FAILED"),
            None => debug!(build = %model.build_path(), action = result.action, "BUILD SUCCESSFUL"),
        }
        Ok(())
    }
}

/// Collaborators of one build
#[derive(Clone)]
pub struct BuildCollaborators {
    pub settings: Arc<dyn SettingsPreparer>,
    pub projects: Arc<dyn ProjectsPreparer>,
    pub task_graph: Arc<dyn TaskExecutionPreparer>,
    pub executor: Arc<dyn BuildWorkExecutor>,
    pub cache: Arc<dyn ConfigurationCache>,
    pub finished: Arc<dyn BuildFinishedListener>,
    pub progress: Arc<dyn ProgressListener>,
}

/// A captured build failure
///
/// Clones share the same underlying error, so a failure reported twice can
/// be recognized as the same one with [`Failure::same_as`].
#[derive(Clone)]
pub struct Failure(Arc<anyhow::Error>);

impl Failure {
    pub fn new(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }

    pub fn same_as(&self, other: &Failure) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failure({:?})", self.0)
    }
}

impl std::error::Error for Failure {}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{failure}")]
    StageFailed { stage: Stage, failure: Failure },

    #[error("{failure}")]
    AlreadyFailed { failure: Failure },

    #[error("Cannot use build '{0}' after it has finished")]
    Finished(String),

    #[error("{0}")]
    IllegalState(String),
}

impl LifecycleError {
    /// The captured failure, for errors caused by a failed stage
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            LifecycleError::StageFailed { failure, .. } | LifecycleError::AlreadyFailed { failure } => {
                Some(failure)
            }
            _ => None,
        }
    }
}

/// Outcome reported when a build finishes
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// `Build` when tasks were requested to run, `Configure` otherwise
    pub action: &'static str,
    pub failure: Option<Failure>,
}

pub struct BuildLifecycleController {
    model: BuildModel,
    collaborators: BuildCollaborators,
    services: ServiceScope,
    stage: Stage,
    final_stage: Option<Stage>,
    stage_failure: Option<Failure>,
    cache_checked: bool,
    loaded_from_cache: bool,
}

impl BuildLifecycleController {
    pub fn new(model: BuildModel, collaborators: BuildCollaborators, services: ServiceScope) -> Self {
        Self {
            model,
            collaborators,
            services,
            stage: Stage::Created,
            final_stage: None,
            stage_failure: None,
            cache_checked: false,
            loaded_from_cache: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn model(&self) -> &BuildModel {
        &self.model
    }

    /// The failure captured by a failed stage, if any
    pub fn stage_failure(&self) -> Option<&Failure> {
        self.stage_failure.as_ref()
    }

    /// True when the configuration came from the configuration cache
    pub fn loaded_from_cache(&self) -> bool {
        self.loaded_from_cache
    }

    pub fn services_mut(&mut self) -> &mut ServiceScope {
        &mut self.services
    }

    pub fn loaded_settings(&mut self) -> Result<&Settings, LifecycleError> {
        self.do_build_stages(Stage::LoadSettings)?;
        self.model
            .settings()
            .ok_or_else(|| LifecycleError::IllegalState("Settings have not been loaded".to_string()))
    }

    pub fn configured_build(&mut self) -> Result<&BuildModel, LifecycleError> {
        self.do_build_stages(Stage::Configure)?;
        Ok(&self.model)
    }

    pub fn schedule_requested_tasks(&mut self) -> Result<(), LifecycleError> {
        self.do_build_stages(Stage::TaskGraph)
    }

    /// Adds tasks to the request and schedules everything requested
    ///
    /// New names after the task graph was calculated send the build back to
    /// `Configure` so the graph is calculated again.
    pub fn schedule_tasks<I, S>(&mut self, names: I) -> Result<(), LifecycleError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.check_usable()?;
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let requested = self.model.requested_tasks();
        if self.stage > Stage::TaskGraph && names.iter().any(|name| !requested.contains(name)) {
            return Err(LifecycleError::IllegalState(format!(
                "Cannot schedule tasks for build '{}' after they have run",
                self.model.build_path()
            )));
        }
        if self.model.request_tasks(names) && self.stage >= Stage::TaskGraph {
            debug!(build = %self.model.build_path(), "Recalculating task graph for new tasks");
            self.stage = Stage::Configure;
        }
        self.do_build_stages(Stage::TaskGraph)
    }

    pub fn execute_tasks(&mut self) -> Result<(), LifecycleError> {
        self.do_build_stages(Stage::RunTasks)
    }

    /// Finishes the build, returning None when it had already finished
    ///
    /// Reports `failure` when given, else the captured stage failure.
    /// Listener errors go to `collector`.
    pub fn finish_build(
        &mut self,
        failure: Option<anyhow::Error>,
        collector: &mut dyn FnMut(anyhow::Error),
    ) -> Option<BuildResult> {
        if self.stage == Stage::Finished {
            return None;
        }

        let result = BuildResult {
            action: if self.final_stage == Some(Stage::RunTasks) {
                "Build"
            } else {
                "Configure"
            },
            failure: failure.map(Failure::new).or_else(|| self.stage_failure.clone()),
        };

        if let Err(e) = self.collaborators.finished.build_finished(&self.model, &result) {
            collector(e);
        }
        self.collaborators.progress.on_event(&BuildProgressEvent::BuildFinished {
            build_path: self.model.build_path().clone(),
            action: result.action.to_string(),
            failure: result.failure.as_ref().map(ToString::to_string),
        });

        self.stage = Stage::Finished;
        Some(result)
    }

    /// Releases the settings and build services
    ///
    /// `on_complete` always runs, even when releasing fails; release errors
    /// are returned afterwards.
    pub fn stop<F: FnOnce()>(mut self, on_complete: F) -> Result<(), ServiceError> {
        let settings = match self.model.take_settings() {
            Some(state) => state.close(),
            None => Ok(()),
        };
        let services = self.services.close();
        on_complete();
        settings.and(services)
    }

    fn check_usable(&self) -> Result<(), LifecycleError> {
        if self.stage == Stage::Finished {
            return Err(LifecycleError::Finished(self.model.build_path().to_string()));
        }
        if let Some(failure) = &self.stage_failure {
            return Err(LifecycleError::AlreadyFailed {
                failure: failure.clone(),
            });
        }
        Ok(())
    }

    fn do_build_stages(&mut self, up_to: Stage) -> Result<(), LifecycleError> {
        self.check_usable()?;
        self.final_stage = Some(self.final_stage.map_or(up_to, |stage| stage.max(up_to)));
        if self.stage >= up_to {
            return Ok(());
        }

        match self.advance(up_to) {
            Ok(()) => Ok(()),
            Err((stage, error)) => {
                let failure = Failure::new(error);
                self.collaborators.progress.on_event(&BuildProgressEvent::StageFailed {
                    build_path: self.model.build_path().clone(),
                    stage,
                    error: failure.to_string(),
                });
                self.stage_failure = Some(failure.clone());
                Err(LifecycleError::StageFailed { stage, failure })
            }
        }
    }

    fn advance(&mut self, up_to: Stage) -> Result<(), (Stage, anyhow::Error)> {
        if up_to > Stage::LoadSettings && self.stage == Stage::Created && !self.cache_checked {
            self.cache_checked = true;
            if self.collaborators.cache.can_load(&self.model) {
                self.load_from_cache().map_err(|e| (Stage::TaskGraph, e))?;
            }
        }

        while self.stage < up_to {
            let next = self
                .stage
                .next()
                .ok_or_else(|| (up_to, anyhow!("No stage follows {}", self.stage)))?;
            self.run_stage(next).map_err(|e| (next, e))?;
            self.stage = next;
        }
        Ok(())
    }

    fn load_from_cache(&mut self) -> Result<()> {
        let started = Instant::now();
        self.collaborators.cache.load(&mut self.model)?;
        self.collaborators.progress.on_event(&BuildProgressEvent::ConfigurationCacheHit {
            build_path: self.model.build_path().clone(),
        });
        info!(
            build = %self.model.build_path(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Configuration loaded from cache"
        );
        self.loaded_from_cache = true;
        self.stage = Stage::TaskGraph;
        Ok(())
    }

    fn run_stage(&mut self, stage: Stage) -> Result<()> {
        let started = Instant::now();
        let build_path = self.model.build_path().clone();
        self.collaborators.progress.on_event(&BuildProgressEvent::StageStarted {
            build_path: build_path.clone(),
            stage,
        });

        let collaborators = &self.collaborators;
        match stage {
            Stage::LoadSettings => collaborators.settings.prepare_settings(&mut self.model)?,
            Stage::Configure => {
                collaborators.cache.prepare_for_configuration(&mut self.model)?;
                collaborators.projects.prepare_projects(&mut self.model)?;
            }
            Stage::TaskGraph => {
                collaborators.task_graph.prepare_for_task_execution(&mut self.model)?;
                if !self.loaded_from_cache {
                    collaborators.cache.save(&self.model)?;
                }
            }
            Stage::RunTasks => collaborators.executor.execute(&self.model)?,
            Stage::Created | Stage::Finished => {
                return Err(anyhow!("Stage {} cannot be run", stage));
            }
        }

        self.collaborators.progress.on_event(&BuildProgressEvent::StageFinished {
            build_path,
            stage,
            duration_ms: started.elapsed().as_millis() as u64,
        });
        Ok(())
    }
}

impl fmt::Debug for BuildLifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildLifecycleController")
            .field("build_path", self.model.build_path())
            .field("stage", &self.stage)
            .field("failed", &self.stage_failure.is_some())
            .field("loaded_from_cache", &self.loaded_from_cache)
            .finish()
    }
}
