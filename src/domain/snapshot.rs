//! Serializable project tree snapshots
//!
//! Snapshots describe a project tree for progress listeners and the
//! configuration cache without holding on to descriptors or scopes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::descriptor::{ProjectDescriptor, ProjectDescriptorRegistry};
use super::path::ProjectPath;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub name: String,
    pub path: ProjectPath,
    /// Path of the project within the whole build tree
    pub identity_path: ProjectPath,
    pub project_dir: PathBuf,
    pub build_file: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ProjectSnapshot>,
}

impl ProjectSnapshot {
    /// Snapshot of the registered descriptor tree, or None without a root
    pub fn from_registry(registry: &ProjectDescriptorRegistry, build_path: &ProjectPath) -> Option<Self> {
        registry
            .root()
            .map(|root| Self::from_descriptor(registry, root, build_path))
    }

    fn from_descriptor(
        registry: &ProjectDescriptorRegistry,
        descriptor: &ProjectDescriptor,
        build_path: &ProjectPath,
    ) -> Self {
        Self {
            name: descriptor.name().to_string(),
            path: descriptor.path().clone(),
            identity_path: build_path.append(descriptor.path()),
            project_dir: descriptor.project_dir().to_path_buf(),
            build_file: descriptor.build_file(),
            children: registry
                .children(descriptor.id())
                .into_iter()
                .map(|child| Self::from_descriptor(registry, child, build_path))
                .collect(),
        }
    }

    /// Number of projects in this snapshot, including itself
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(ProjectSnapshot::count).sum::<usize>()
    }

    /// All paths in pre-order
    pub fn paths(&self) -> Vec<ProjectPath> {
        let mut paths = vec![self.path.clone()];
        for child in &self.children {
            paths.extend(child.paths());
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_BUILD_FILE_NAME;
    use std::path::Path;

    #[test]
    fn snapshot_mirrors_registry() {
        let mut registry = ProjectDescriptorRegistry::new();
        let root = registry
            .create_descriptor(None, "proj", Path::new("/proj"), DEFAULT_BUILD_FILE_NAME)
            .unwrap();
        let a = registry
            .create_descriptor(Some(root), "a", Path::new("/proj/a"), DEFAULT_BUILD_FILE_NAME)
            .unwrap();
        registry
            .create_descriptor(Some(a), "b", Path::new("/proj/a/b"), "b.toml")
            .unwrap();

        let build_path: ProjectPath = ":included".parse().unwrap();
        let snapshot = ProjectSnapshot::from_registry(&registry, &build_path).unwrap();

        assert_eq!(snapshot.count(), 3);
        assert_eq!(snapshot.identity_path.to_string(), ":included");
        let b = &snapshot.children[0].children[0];
        assert_eq!(b.identity_path.to_string(), ":included:a:b");
        assert_eq!(b.build_file, PathBuf::from("/proj/a/b/b.toml"));
        assert_eq!(
            snapshot.paths().iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            vec![":", ":a", ":a:b"]
        );
    }

    #[test]
    fn empty_registry_has_no_snapshot() {
        let registry = ProjectDescriptorRegistry::new();
        assert!(ProjectSnapshot::from_registry(&registry, &ProjectPath::root()).is_none());
    }
}
