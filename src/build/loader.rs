//! Project tree construction from settings

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use super::project::{Project, ProjectTree};
use crate::domain::{DescriptorId, ProjectDescriptor, ProjectPath};
use crate::scope::ClassLoaderScope;
use crate::settings::{Settings, SettingsError};

/// Creates a live project for a descriptor
///
/// `scope` is created before the call and belongs to the new project.
pub trait ProjectFactory: Send + Sync {
    fn create_project(
        &self,
        descriptor: &ProjectDescriptor,
        parent: Option<&Project>,
        scope: Arc<ClassLoaderScope>,
        build_path: &ProjectPath,
    ) -> Result<Project>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProjectFactory;

impl ProjectFactory for DefaultProjectFactory {
    fn create_project(
        &self,
        descriptor: &ProjectDescriptor,
        _parent: Option<&Project>,
        scope: Arc<ClassLoaderScope>,
        build_path: &ProjectPath,
    ) -> Result<Project> {
        Ok(Project::new(
            descriptor.name(),
            descriptor.path().clone(),
            build_path,
            descriptor.project_dir(),
            descriptor.build_file(),
            scope,
        ))
    }
}

/// Builds the project tree of a build, parents before children
#[derive(Clone)]
pub struct BuildLoader {
    factory: Arc<dyn ProjectFactory>,
}

impl BuildLoader {
    pub fn new(factory: Arc<dyn ProjectFactory>) -> Self {
        Self { factory }
    }

    /// Creates one project per registered descriptor
    ///
    /// Each project scope is a child of its parent project's scope; the root
    /// project's scope is a child of `base_scope`.
    pub fn load(
        &self,
        settings: &Settings,
        base_scope: &Arc<ClassLoaderScope>,
        build_path: &ProjectPath,
    ) -> Result<ProjectTree> {
        let registry = settings.registry();
        let root = settings.root_project()?;

        let root_scope = base_scope.create_child(&scope_name(root));
        let root_project = self.create(root, None, root_scope, build_path)?;
        let mut tree = ProjectTree::new(root_project);

        let mut stack: Vec<(DescriptorId, Arc<ClassLoaderScope>)> = registry
            .children(root.id())
            .into_iter()
            .rev()
            .map(|child| (child.id(), Arc::clone(tree.root().class_loader_scope())))
            .collect();

        while let Some((id, parent_scope)) = stack.pop() {
            let descriptor = registry
                .get(id)
                .ok_or_else(|| SettingsError::ProjectNotFound(format!("{:?}", id)))?;
            let scope = parent_scope.create_child(&scope_name(descriptor));

            let project = {
                let parent = descriptor.path().parent().and_then(|p| tree.get(&p));
                self.create(descriptor, parent, Arc::clone(&scope), build_path)?
            };
            tree.add_child(project)?;

            for child in registry.children(id).into_iter().rev() {
                stack.push((child.id(), Arc::clone(&scope)));
            }
        }

        let default = settings
            .default_project()
            .cloned()
            .unwrap_or_else(ProjectPath::root);
        tree.set_default_project(default)?;

        debug!(build = %build_path, projects = tree.len(), "Loaded projects");
        Ok(tree)
    }

    fn create(
        &self,
        descriptor: &ProjectDescriptor,
        parent: Option<&Project>,
        scope: Arc<ClassLoaderScope>,
        build_path: &ProjectPath,
    ) -> Result<Project> {
        self.factory
            .create_project(descriptor, parent, scope, build_path)
            .with_context(|| format!("Could not create project '{}'", descriptor.path()))
    }
}

fn scope_name(descriptor: &ProjectDescriptor) -> String {
    format!("project({})", descriptor.path())
}
