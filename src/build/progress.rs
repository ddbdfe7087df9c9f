//! Build progress reporting
//!
//! Events are emitted at the start and end of every lifecycle stage, around
//! settings evaluation and after the project tree is loaded. Listeners are
//! shared by every build of a build tree.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{ProjectPath, ProjectSnapshot, Stage};

/// Progress events emitted while initializing and running a build
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BuildProgressEvent {
    StageStarted {
        build_path: ProjectPath,
        stage: Stage,
    },
    StageFinished {
        build_path: ProjectPath,
        stage: Stage,
        duration_ms: u64,
    },
    StageFailed {
        build_path: ProjectPath,
        stage: Stage,
        error: String,
    },
    SettingsEvaluationStarted {
        build_path: ProjectPath,
        settings_dir: PathBuf,
        settings_file: Option<PathBuf>,
    },
    SettingsEvaluated {
        build_path: ProjectPath,
        settings_dir: PathBuf,
        root_project: ProjectSnapshot,
        included_builds: Vec<PathBuf>,
    },
    ProjectsLoaded {
        build_path: ProjectPath,
        root_project: ProjectSnapshot,
    },
    ConfigurationCacheHit {
        build_path: ProjectPath,
    },
    BuildFinished {
        build_path: ProjectPath,
        action: String,
        failure: Option<String>,
    },
}

pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &BuildProgressEvent);
}

/// Listener that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpListener;

impl ProgressListener for NoOpListener {
    fn on_event(&self, _event: &BuildProgressEvent) {}
}

/// Listener that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ProgressListener for LoggingListener {
    fn on_event(&self, event: &BuildProgressEvent) {
        match event {
            BuildProgressEvent::StageStarted { build_path, stage } => {
                debug!(build = %build_path, stage = %stage, "Stage started");
            }
            BuildProgressEvent::StageFinished {
                build_path,
                stage,
                duration_ms,
            } => {
                debug!(build = %build_path, stage = %stage, duration_ms, "Stage finished");
            }
            BuildProgressEvent::StageFailed {
                build_path,
                stage,
                error,
            } => {
                warn!(build = %build_path, stage = %stage, error = %error, "Stage failed");
            }
            BuildProgressEvent::SettingsEvaluationStarted {
                build_path,
                settings_dir,
                settings_file,
            } => {
                debug!(
                    build = %build_path,
                    dir = %settings_dir.display(),
                    file = ?settings_file,
                    "Evaluating settings"
                );
            }
            BuildProgressEvent::SettingsEvaluated {
                build_path,
                root_project,
                included_builds,
                ..
            } => {
                info!(
                    build = %build_path,
                    root = %root_project.name,
                    projects = root_project.count(),
                    included_builds = included_builds.len(),
                    "Settings evaluated"
                );
            }
            BuildProgressEvent::ProjectsLoaded {
                build_path,
                root_project,
            } => {
                info!(build = %build_path, projects = root_project.count(), "Projects loaded");
            }
            BuildProgressEvent::ConfigurationCacheHit { build_path } => {
                info!(build = %build_path, "Reusing configuration cache");
            }
            BuildProgressEvent::BuildFinished {
                build_path,
                action,
                failure,
            } => match failure {
                Some(failure) => warn!(build = %build_path, action = %action, failure = %failure, "Build failed"),
                None => info!(build = %build_path, action = %action, "Build finished"),
            },
        }
    }
}
