//! The mutable model of one build
//!
//! Collaborators fill the model in stage order: settings, then projects, then
//! the task graph. Everything set here is exposed to task execution once the
//! build is configured.

use serde::{Deserialize, Serialize};

use super::project::ProjectTree;
use crate::domain::ProjectPath;
use crate::settings::{Settings, SettingsState, StartParameter};

/// Ordered, duplicate-free task paths scheduled for execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskGraph {
    tasks: Vec<String>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task unless it is already scheduled; returns true if added
    pub fn add(&mut self, task_path: impl Into<String>) -> bool {
        let task_path = task_path.into();
        if self.tasks.contains(&task_path) {
            return false;
        }
        self.tasks.push(task_path);
        true
    }

    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for TaskGraph {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut graph = Self::new();
        for task in iter {
            graph.add(task);
        }
        graph
    }
}

#[derive(Debug)]
pub struct BuildModel {
    build_path: ProjectPath,
    start_parameter: StartParameter,
    requested_tasks: Vec<String>,
    settings: Option<SettingsState>,
    projects: Option<ProjectTree>,
    task_graph: Option<TaskGraph>,
}

impl BuildModel {
    pub fn new(build_path: ProjectPath, start_parameter: StartParameter) -> Self {
        Self {
            build_path,
            requested_tasks: start_parameter.task_names.clone(),
            start_parameter,
            settings: None,
            projects: None,
            task_graph: None,
        }
    }

    /// Path of this build in the build tree; `:` for the root build
    pub fn build_path(&self) -> &ProjectPath {
        &self.build_path
    }

    pub fn is_root_build(&self) -> bool {
        self.build_path.is_root()
    }

    pub fn start_parameter(&self) -> &StartParameter {
        &self.start_parameter
    }

    /// Task names to schedule, command line tasks first
    pub fn requested_tasks(&self) -> &[String] {
        &self.requested_tasks
    }

    /// Adds task names, returning true when any of them is new
    pub fn request_tasks<I, S>(&mut self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = false;
        for name in names {
            let name = name.into();
            if !self.requested_tasks.contains(&name) {
                self.requested_tasks.push(name);
                added = true;
            }
        }
        added
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref().map(SettingsState::settings)
    }

    pub fn settings_state(&self) -> Option<&SettingsState> {
        self.settings.as_ref()
    }

    pub fn set_settings(&mut self, state: SettingsState) {
        self.settings = Some(state);
    }

    pub fn take_settings(&mut self) -> Option<SettingsState> {
        self.settings.take()
    }

    pub fn projects(&self) -> Option<&ProjectTree> {
        self.projects.as_ref()
    }

    pub fn set_projects(&mut self, projects: ProjectTree) {
        self.projects = Some(projects);
    }

    pub fn default_project(&self) -> Option<&ProjectPath> {
        self.projects.as_ref().map(|p| p.default_project().path())
    }

    pub fn task_graph(&self) -> Option<&TaskGraph> {
        self.task_graph.as_ref()
    }

    pub fn set_task_graph(&mut self, graph: TaskGraph) {
        self.task_graph = Some(graph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn task_graph_deduplicates_in_order() {
        let graph: TaskGraph = [":a:build", ":build", ":a:build"].into_iter().collect();
        assert_eq!(graph.tasks(), &[":a:build".to_string(), ":build".to_string()]);
    }

    #[test]
    fn request_tasks_reports_new_names() {
        let start = StartParameter::new(Path::new("/w")).with_tasks(["build"]);
        let mut model = BuildModel::new(ProjectPath::root(), start);
        assert!(!model.request_tasks(["build"]));
        assert!(model.request_tasks(["build", "test"]));
        assert_eq!(model.requested_tasks(), &["build".to_string(), "test".to_string()]);
        assert!(model.is_root_build());
    }
}
