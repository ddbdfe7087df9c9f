//! Task selection and execution
//!
//! Task names select tasks the way a user types them:
//!
//! | Name | Selects |
//! |------|---------|
//! | `build` | `build` in the default project and every project below it |
//! | `:build` | `build` in the root project only |
//! | `:a:b:build` | `build` in project `:a:b` only |
//! | `b:build` | `build` in project `b` below the default project only |

use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tracing::info;

use super::controller::{BuildWorkExecutor, TaskExecutionPreparer};
use super::model::{BuildModel, TaskGraph};
use crate::domain::{CancellationToken, PathError, ProjectPath};

#[derive(Debug, Error, PartialEq)]
pub enum TaskSelectionError {
    #[error("Task name must not be empty")]
    EmptyName,

    #[error("Project '{project}' not found in {build}.")]
    UnknownProject { project: String, build: String },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("Projects have not been configured")]
    NotConfigured,
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Build cancelled before task '{0}'")]
    Cancelled(String),

    #[error("Task graph has not been calculated")]
    NoTaskGraph,
}

/// Path of task `name` in `project`, e.g. `:a:build` or `:build`
pub fn task_path(project: &ProjectPath, name: &str) -> String {
    if project.is_root() {
        format!(":{}", name)
    } else {
        format!("{}:{}", project, name)
    }
}

/// Resolves requested task names against the configured projects
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTaskSelector;

impl DefaultTaskSelector {
    pub fn select(&self, model: &BuildModel) -> Result<TaskGraph, TaskSelectionError> {
        let projects = model.projects().ok_or(TaskSelectionError::NotConfigured)?;
        let mut graph = TaskGraph::new();

        for requested in model.requested_tasks() {
            let requested = requested.trim();
            if requested.is_empty() {
                return Err(TaskSelectionError::EmptyName);
            }

            match requested.rsplit_once(':') {
                Some((project, name)) => {
                    if name.is_empty() {
                        return Err(TaskSelectionError::EmptyName);
                    }
                    let path = if project.is_empty() {
                        ProjectPath::root()
                    } else {
                        projects.default_project().path().resolve(project)?
                    };
                    if !projects.contains(&path) {
                        return Err(TaskSelectionError::UnknownProject {
                            project: path.to_string(),
                            build: format!("build '{}'", model.build_path()),
                        });
                    }
                    graph.add(task_path(&path, name));
                }
                None => {
                    let default = projects.default_project().path();
                    for project in projects.subtree(default) {
                        graph.add(task_path(project.path(), requested));
                    }
                }
            }
        }

        Ok(graph)
    }
}

impl TaskExecutionPreparer for DefaultTaskSelector {
    fn prepare_for_task_execution(&self, model: &mut BuildModel) -> Result<()> {
        let graph = self.select(model)?;
        info!(build = %model.build_path(), tasks = graph.len(), "Calculated task graph");
        model.set_task_graph(graph);
        Ok(())
    }
}

/// Logs scheduled tasks instead of running them
#[derive(Debug, Clone)]
pub struct DryRunExecutor {
    cancellation: Arc<CancellationToken>,
}

impl DryRunExecutor {
    pub fn new(cancellation: Arc<CancellationToken>) -> Self {
        Self { cancellation }
    }
}

impl BuildWorkExecutor for DryRunExecutor {
    fn execute(&self, model: &BuildModel) -> Result<()> {
        let graph = model.task_graph().ok_or(ExecutionError::NoTaskGraph)?;
        for task in graph.tasks() {
            if self.cancellation.is_cancelled() {
                return Err(ExecutionError::Cancelled(task.clone()).into());
            }
            info!(build = %model.build_path(), task = %task, "SKIPPED (dry run)");
        }
        Ok(())
    }
}
