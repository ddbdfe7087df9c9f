//! Live projects of a configured build
//!
//! Projects form a tree mirroring the descriptors they were created from.
//! The tree is stored as a petgraph graph with parent → child edges.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use thiserror::Error;

use crate::domain::{ProjectPath, ProjectSnapshot};
use crate::scope::ClassLoaderScope;

#[derive(Debug, Error, PartialEq)]
pub enum ProjectTreeError {
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectPath),

    #[error("Project already exists: {0}")]
    DuplicateProject(ProjectPath),

    #[error("Project {child} is not a child of {parent}")]
    NotAChild { parent: ProjectPath, child: ProjectPath },
}

/// A configured project
#[derive(Clone)]
pub struct Project {
    name: String,
    path: ProjectPath,
    identity_path: ProjectPath,
    project_dir: PathBuf,
    build_file: PathBuf,
    scope: Arc<ClassLoaderScope>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        path: ProjectPath,
        build_path: &ProjectPath,
        project_dir: impl Into<PathBuf>,
        build_file: impl Into<PathBuf>,
        scope: Arc<ClassLoaderScope>,
    ) -> Self {
        Self {
            name: name.into(),
            identity_path: build_path.append(&path),
            path,
            project_dir: project_dir.into(),
            build_file: build_file.into(),
            scope,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path within its own build
    pub fn path(&self) -> &ProjectPath {
        &self.path
    }

    /// Path within the build tree, prefixed with the build path
    pub fn identity_path(&self) -> &ProjectPath {
        &self.identity_path
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn build_file(&self) -> &Path {
        &self.build_file
    }

    /// Scope the project's build logic runs in
    pub fn class_loader_scope(&self) -> &Arc<ClassLoaderScope> {
        &self.scope
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("path", &self.path)
            .field("identity_path", &self.identity_path)
            .field("project_dir", &self.project_dir)
            .field("scope", self.scope.id())
            .finish()
    }
}

/// Projects of one build, rooted at the root project
#[derive(Debug)]
pub struct ProjectTree {
    graph: DiGraph<Project, ()>,
    node_map: HashMap<ProjectPath, NodeIndex>,
    root: NodeIndex,
    default_project: ProjectPath,
}

impl ProjectTree {
    /// Creates a tree holding only `root`, which is also the default project
    pub fn new(root: Project) -> Self {
        let mut graph = DiGraph::new();
        let path = root.path.clone();
        let idx = graph.add_node(root);
        Self {
            graph,
            node_map: HashMap::from([(path.clone(), idx)]),
            root: idx,
            default_project: path,
        }
    }

    /// Adds a project below its parent, which must already be in the tree
    pub fn add_child(&mut self, project: Project) -> Result<(), ProjectTreeError> {
        if self.node_map.contains_key(&project.path) {
            return Err(ProjectTreeError::DuplicateProject(project.path));
        }
        let parent_path = project
            .path
            .parent()
            .ok_or_else(|| ProjectTreeError::DuplicateProject(project.path.clone()))?;
        let parent = *self
            .node_map
            .get(&parent_path)
            .ok_or(ProjectTreeError::ProjectNotFound(parent_path))?;

        let path = project.path.clone();
        let idx = self.graph.add_node(project);
        self.graph.add_edge(parent, idx, ());
        self.node_map.insert(path, idx);
        Ok(())
    }

    pub fn root(&self) -> &Project {
        &self.graph[self.root]
    }

    pub fn get(&self, path: &ProjectPath) -> Option<&Project> {
        self.node_map.get(path).map(|idx| &self.graph[*idx])
    }

    pub fn contains(&self, path: &ProjectPath) -> bool {
        self.node_map.contains_key(path)
    }

    pub fn default_project(&self) -> &Project {
        self.get(&self.default_project).unwrap_or_else(|| self.root())
    }

    pub fn set_default_project(&mut self, path: ProjectPath) -> Result<(), ProjectTreeError> {
        if !self.contains(&path) {
            return Err(ProjectTreeError::ProjectNotFound(path));
        }
        self.default_project = path;
        Ok(())
    }

    /// Direct children in the order they were added
    pub fn children(&self, path: &ProjectPath) -> Vec<&Project> {
        let Some(idx) = self.node_map.get(path) else {
            return Vec::new();
        };
        let mut children: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(*idx, Direction::Outgoing)
            .collect();
        children.sort();
        children.into_iter().map(|child| &self.graph[child]).collect()
    }

    pub fn parent(&self, path: &ProjectPath) -> Option<&Project> {
        let idx = self.node_map.get(path)?;
        self.graph
            .neighbors_directed(*idx, Direction::Incoming)
            .next()
            .map(|parent| &self.graph[parent])
    }

    /// `path` and all of its descendants, parents before children
    pub fn subtree(&self, path: &ProjectPath) -> Vec<&Project> {
        let Some(start) = self.node_map.get(path) else {
            return Vec::new();
        };
        let mut projects = Vec::new();
        let mut dfs = Dfs::new(&self.graph, *start);
        while let Some(idx) = dfs.next(&self.graph) {
            projects.push(&self.graph[idx]);
        }
        projects
    }

    /// All projects, parents before children
    pub fn projects(&self) -> Vec<&Project> {
        self.subtree(&self.root().path)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn snapshot(&self) -> ProjectSnapshot {
        self.snapshot_of(self.root())
    }

    fn snapshot_of(&self, project: &Project) -> ProjectSnapshot {
        ProjectSnapshot {
            name: project.name.clone(),
            path: project.path.clone(),
            identity_path: project.identity_path.clone(),
            project_dir: project.project_dir.clone(),
            build_file: project.build_file.clone(),
            children: self
                .children(&project.path)
                .into_iter()
                .map(|child| self.snapshot_of(child))
                .collect(),
        }
    }
}
