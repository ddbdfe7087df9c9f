//! Project descriptors and the descriptor registry
//!
//! Descriptors are the lightweight, settings-time identity of a project:
//! name, directory, build file and hierarchical path. The registry owns every
//! descriptor of one settings instance and keeps two indexes in step:
//!
//! - path → descriptor
//! - path → all transitive descendants
//!
//! Paths are computed once, when a descriptor is created. A rename derives
//! the new paths of the renamed descriptor and its registered descendants
//! up front, then re-registers them parents first.

use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use super::path::{validate_name, PathError, ProjectPath};

/// Build file name used when a project does not set one
pub const DEFAULT_BUILD_FILE_NAME: &str = "build.toml";

#[derive(Debug, Error, PartialEq)]
pub enum DescriptorError {
    #[error("A project with path '{0}' is already registered")]
    DuplicatePath(ProjectPath),

    #[error("No project with path '{0}' is registered")]
    NotRegistered(ProjectPath),

    #[error("Unknown project descriptor {0:?}")]
    UnknownDescriptor(DescriptorId),

    #[error("Found multiple projects with project directory '{dir}': {matches}")]
    AmbiguousDirectory { dir: PathBuf, matches: String },

    #[error(transparent)]
    Path(#[from] PathError),
}

impl DescriptorError {
    /// True for errors caused by user input rather than by the caller
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DescriptorError::AmbiguousDirectory { .. } | DescriptorError::Path(_)
        )
    }
}

/// Lexically normalizes a path, removing `.` and resolving `..`
///
/// Project directories may not exist yet when descriptors are created, so
/// this does not touch the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Stable handle to a descriptor inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(usize);

/// Settings-time description of a project
#[derive(Debug, Clone)]
pub struct ProjectDescriptor {
    id: DescriptorId,
    name: String,
    project_dir: PathBuf,
    build_file_name: String,
    path: ProjectPath,
    parent: Option<DescriptorId>,
    children: Vec<DescriptorId>,
}

impl ProjectDescriptor {
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &ProjectPath {
        &self.path
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn build_file_name(&self) -> &str {
        &self.build_file_name
    }

    /// Absolute location of the build file
    pub fn build_file(&self) -> PathBuf {
        self.project_dir.join(&self.build_file_name)
    }

    pub fn parent(&self) -> Option<DescriptorId> {
        self.parent
    }

    /// Children in inclusion order
    pub fn children(&self) -> &[DescriptorId] {
        &self.children
    }
}

impl PartialEq for ProjectDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ProjectDescriptor {}

impl Hash for ProjectDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

/// Registry of all descriptors of one settings instance
#[derive(Debug, Default)]
pub struct ProjectDescriptorRegistry {
    /// Every descriptor ever created, indexed by [`DescriptorId`]
    descriptors: Vec<ProjectDescriptor>,

    /// Registered descriptors by path
    projects: HashMap<ProjectPath, DescriptorId>,

    /// Transitive descendants of each registered path
    sub_projects: HashMap<ProjectPath, BTreeSet<DescriptorId>>,
}

impl ProjectDescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a descriptor below `parent` (or the root when None) and
    /// registers it
    pub fn create_descriptor(
        &mut self,
        parent: Option<DescriptorId>,
        name: &str,
        project_dir: &Path,
        build_file_name: &str,
    ) -> Result<DescriptorId, DescriptorError> {
        validate_name(name)?;

        let path = match parent {
            Some(parent_id) => self.descriptor(parent_id)?.path.child(name)?,
            None => ProjectPath::root(),
        };

        if self.projects.contains_key(&path) {
            return Err(DescriptorError::DuplicatePath(path));
        }

        let id = DescriptorId(self.descriptors.len());
        self.descriptors.push(ProjectDescriptor {
            id,
            name: name.to_string(),
            project_dir: normalize_path(project_dir),
            build_file_name: build_file_name.to_string(),
            path,
            parent,
            children: Vec::new(),
        });

        if let Some(parent_id) = parent {
            self.descriptor_mut(parent_id)?.children.push(id);
        }

        self.add_project(id)?;
        Ok(id)
    }

    /// Registers a descriptor under its current path
    pub fn add_project(&mut self, id: DescriptorId) -> Result<(), DescriptorError> {
        let path = self.descriptor(id)?.path.clone();
        if self.projects.contains_key(&path) {
            return Err(DescriptorError::DuplicatePath(path));
        }

        self.projects.insert(path.clone(), id);
        self.sub_projects.insert(path, BTreeSet::new());

        for ancestor in self.ancestor_paths(id)? {
            self.sub_projects.entry(ancestor).or_default().insert(id);
        }

        Ok(())
    }

    /// Unregisters the descriptor at `path`
    ///
    /// The descriptor itself stays addressable by id so it can be re-added.
    pub fn remove_project(&mut self, path: &ProjectPath) -> Result<DescriptorId, DescriptorError> {
        let id = self
            .projects
            .remove(path)
            .ok_or_else(|| DescriptorError::NotRegistered(path.clone()))?;
        self.sub_projects.remove(path);

        for ancestor in self.ancestor_paths(id)? {
            if let Some(descendants) = self.sub_projects.get_mut(&ancestor) {
                descendants.remove(&id);
            }
        }

        Ok(id)
    }

    /// Moves a registered descriptor from `old` to `new`
    pub fn change_descriptor_path(
        &mut self,
        old: &ProjectPath,
        new: ProjectPath,
    ) -> Result<(), DescriptorError> {
        if old != &new && self.projects.contains_key(&new) {
            return Err(DescriptorError::DuplicatePath(new));
        }

        let id = self.remove_project(old)?;
        self.descriptor_mut(id)?.path = new;
        self.add_project(id)
    }

    /// Renames a descriptor and re-derives the paths of its whole subtree
    ///
    /// Every derived path is checked before anything changes, so a failed
    /// rename leaves the registry as it was.
    pub fn rename(&mut self, id: DescriptorId, name: &str) -> Result<(), DescriptorError> {
        validate_name(name)?;

        let descriptor = self.descriptor(id)?;
        let Some(parent_id) = descriptor.parent else {
            // The root path does not depend on the root's name
            self.descriptor_mut(id)?.name = name.to_string();
            return Ok(());
        };

        let new_path = self.descriptor(parent_id)?.path.child(name)?;
        if descriptor.path == new_path {
            return Ok(());
        }
        if self.projects.contains_key(&new_path) {
            return Err(DescriptorError::DuplicatePath(new_path));
        }

        let nodes = self.registered_subtree(id)?;
        let mut derived: HashMap<DescriptorId, ProjectPath> = HashMap::new();
        derived.insert(id, new_path);
        for node in nodes.iter().skip(1) {
            let descriptor = self.descriptor(*node)?;
            let parent = descriptor.parent.ok_or(DescriptorError::UnknownDescriptor(*node))?;
            let parent_path = derived
                .get(&parent)
                .ok_or(DescriptorError::UnknownDescriptor(parent))?;
            let path = parent_path.child(&descriptor.name)?;
            if let Some(existing) = self.projects.get(&path) {
                if !nodes.contains(existing) {
                    return Err(DescriptorError::DuplicatePath(path));
                }
            }
            derived.insert(*node, path);
        }

        // Unregister under the old paths, then re-register parents first
        for node in nodes.iter().rev() {
            let old_path = self.descriptor(*node)?.path.clone();
            self.remove_project(&old_path)?;
        }
        self.descriptor_mut(id)?.name = name.to_string();
        for node in &nodes {
            if let Some(path) = derived.remove(node) {
                self.descriptor_mut(*node)?.path = path;
            }
        }
        for node in &nodes {
            self.add_project(*node)?;
        }

        Ok(())
    }

    /// Moves a descriptor to another directory
    pub fn set_project_dir(&mut self, id: DescriptorId, dir: &Path) -> Result<(), DescriptorError> {
        self.descriptor_mut(id)?.project_dir = normalize_path(dir);
        Ok(())
    }

    pub fn set_build_file_name(
        &mut self,
        id: DescriptorId,
        build_file_name: &str,
    ) -> Result<(), DescriptorError> {
        self.descriptor_mut(id)?.build_file_name = build_file_name.to_string();
        Ok(())
    }

    /// Looks up any descriptor by id, registered or not
    pub fn get(&self, id: DescriptorId) -> Option<&ProjectDescriptor> {
        self.descriptors.get(id.0)
    }

    /// Looks up the registered descriptor at `path`
    pub fn get_project(&self, path: &ProjectPath) -> Option<&ProjectDescriptor> {
        self.projects.get(path).and_then(|id| self.get(*id))
    }

    /// Looks up the registered descriptor whose directory is `dir`
    pub fn get_project_by_dir(
        &self,
        dir: &Path,
    ) -> Result<Option<&ProjectDescriptor>, DescriptorError> {
        let dir = normalize_path(dir);
        let matches: Vec<&ProjectDescriptor> = self
            .all_projects()
            .into_iter()
            .filter(|d| d.project_dir == dir)
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches[0])),
            _ => Err(DescriptorError::AmbiguousDirectory {
                dir,
                matches: describe(&matches),
            }),
        }
    }

    /// The descriptor at `path` plus all of its registered descendants
    pub fn get_all_projects(&self, path: &ProjectPath) -> Vec<&ProjectDescriptor> {
        let mut result: Vec<&ProjectDescriptor> = self.get_project(path).into_iter().collect();
        result.extend(self.get_sub_projects(path));
        result.sort_by(|a, b| a.path.cmp(&b.path));
        result
    }

    /// All registered descendants of `path`
    pub fn get_sub_projects(&self, path: &ProjectPath) -> Vec<&ProjectDescriptor> {
        self.sub_projects
            .get(path)
            .map(|ids| ids.iter().filter_map(|id| self.get(*id)).collect())
            .unwrap_or_default()
    }

    /// Registered direct children of a descriptor
    pub fn children(&self, id: DescriptorId) -> Vec<&ProjectDescriptor> {
        self.get(id)
            .map(|d| {
                d.children
                    .iter()
                    .filter_map(|child| self.get(*child))
                    .filter(|child| self.is_registered(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All registered descriptors, sorted by path
    pub fn all_projects(&self) -> Vec<&ProjectDescriptor> {
        let mut all: Vec<&ProjectDescriptor> =
            self.projects.values().filter_map(|id| self.get(*id)).collect();
        all.sort_by(|a, b| a.path.cmp(&b.path));
        all
    }

    pub fn root(&self) -> Option<&ProjectDescriptor> {
        self.get_project(&ProjectPath::root())
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Drops every descriptor and both indexes
    pub fn discard_all(&mut self) {
        self.projects.clear();
        self.sub_projects.clear();
        self.descriptors.clear();
    }

    fn descriptor(&self, id: DescriptorId) -> Result<&ProjectDescriptor, DescriptorError> {
        self.get(id).ok_or(DescriptorError::UnknownDescriptor(id))
    }

    fn descriptor_mut(&mut self, id: DescriptorId) -> Result<&mut ProjectDescriptor, DescriptorError> {
        self.descriptors
            .get_mut(id.0)
            .ok_or(DescriptorError::UnknownDescriptor(id))
    }

    /// Current paths of every ancestor of `id`, nearest first
    fn ancestor_paths(&self, id: DescriptorId) -> Result<Vec<ProjectPath>, DescriptorError> {
        let mut paths = Vec::new();
        let mut current = self.descriptor(id)?.parent;
        while let Some(ancestor) = current {
            let descriptor = self.descriptor(ancestor)?;
            paths.push(descriptor.path.clone());
            current = descriptor.parent;
        }
        Ok(paths)
    }

    fn is_registered(&self, descriptor: &ProjectDescriptor) -> bool {
        self.projects.get(&descriptor.path) == Some(&descriptor.id)
    }

    /// Pre-order ids of the registered subtree rooted at `id`
    ///
    /// Unregistered descendants are skipped along with everything below them.
    fn registered_subtree(&self, id: DescriptorId) -> Result<Vec<DescriptorId>, DescriptorError> {
        let root = self.descriptor(id)?;
        if !self.is_registered(root) {
            return Err(DescriptorError::NotRegistered(root.path.clone()));
        }

        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            order.push(next);
            let children = self.descriptor(next)?.children.iter().rev();
            stack.extend(children.filter(|child| {
                self.get(**child).is_some_and(|d| self.is_registered(d))
            }));
        }
        Ok(order)
    }
}

/// Renders descriptors for error messages, e.g. `project ':a', project ':b'`
pub fn describe(descriptors: &[&ProjectDescriptor]) -> String {
    descriptors
        .iter()
        .map(|d| format!("project '{}'", d.path))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn path(s: &str) -> ProjectPath {
        s.parse().unwrap()
    }

    fn registry_with_tree() -> (ProjectDescriptorRegistry, DescriptorId, DescriptorId, DescriptorId) {
        let mut registry = ProjectDescriptorRegistry::new();
        let root = registry
            .create_descriptor(None, "proj", Path::new("/proj"), DEFAULT_BUILD_FILE_NAME)
            .unwrap();
        let a = registry
            .create_descriptor(Some(root), "a", Path::new("/proj/a"), DEFAULT_BUILD_FILE_NAME)
            .unwrap();
        let b = registry
            .create_descriptor(Some(a), "b", Path::new("/proj/a/b"), DEFAULT_BUILD_FILE_NAME)
            .unwrap();
        (registry, root, a, b)
    }

    fn paths(descriptors: Vec<&ProjectDescriptor>) -> Vec<String> {
        descriptors.iter().map(|d| d.path().to_string()).collect()
    }

    #[test]
    fn paths_derive_from_parent() {
        let (registry, root, a, b) = registry_with_tree();
        assert_eq!(registry.get(root).unwrap().path().to_string(), ":");
        assert_eq!(registry.get(a).unwrap().path().to_string(), ":a");
        assert_eq!(registry.get(b).unwrap().path().to_string(), ":a:b");
        assert_eq!(registry.get(b).unwrap().build_file(), PathBuf::from("/proj/a/b/build.toml"));
    }

    #[test]
    fn all_projects_includes_descendants() {
        let (registry, ..) = registry_with_tree();
        assert_eq!(paths(registry.get_all_projects(&path(":a"))), vec![":a", ":a:b"]);
        assert_eq!(
            paths(registry.get_all_projects(&ProjectPath::root())),
            vec![":", ":a", ":a:b"]
        );
        assert!(registry.get_all_projects(&path(":missing")).is_empty());
    }

    #[test]
    fn duplicate_path_rejected() {
        let (mut registry, root, ..) = registry_with_tree();
        let result =
            registry.create_descriptor(Some(root), "a", Path::new("/elsewhere"), DEFAULT_BUILD_FILE_NAME);
        assert_eq!(result, Err(DescriptorError::DuplicatePath(path(":a"))));
    }

    #[test]
    fn remove_unknown_path_fails() {
        let mut registry = ProjectDescriptorRegistry::new();
        assert_eq!(
            registry.remove_project(&path(":x")),
            Err(DescriptorError::NotRegistered(path(":x")))
        );
    }

    #[test]
    fn remove_updates_ancestors() {
        let (mut registry, _, _, b) = registry_with_tree();
        assert_eq!(registry.remove_project(&path(":a:b")).unwrap(), b);
        assert_eq!(paths(registry.get_all_projects(&ProjectPath::root())), vec![":", ":a"]);
        assert!(registry.get_project(&path(":a:b")).is_none());
    }

    #[test]
    fn change_descriptor_path_reinserts() {
        let (mut registry, _, _, b) = registry_with_tree();
        registry.change_descriptor_path(&path(":a:b"), path(":a:c")).unwrap();
        assert_eq!(registry.get_project(&path(":a:c")).unwrap().id(), b);
        assert!(registry.get_project(&path(":a:b")).is_none());
        assert_eq!(paths(registry.get_all_projects(&path(":a"))), vec![":a", ":a:c"]);
    }

    #[test]
    fn rename_rederives_subtree() {
        let (mut registry, _, a, b) = registry_with_tree();
        registry.rename(a, "core").unwrap();

        assert_eq!(registry.get(a).unwrap().name(), "core");
        assert_eq!(registry.get(b).unwrap().path().to_string(), ":core:b");
        assert_eq!(
            paths(registry.get_all_projects(&ProjectPath::root())),
            vec![":", ":core", ":core:b"]
        );
        assert_eq!(paths(registry.get_all_projects(&path(":core"))), vec![":core", ":core:b"]);
        assert!(registry.get_project(&path(":a")).is_none());
        assert!(registry.get_project(&path(":a:b")).is_none());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn rename_to_sibling_name_fails() {
        let (mut registry, root, a, _) = registry_with_tree();
        registry
            .create_descriptor(Some(root), "c", Path::new("/proj/c"), DEFAULT_BUILD_FILE_NAME)
            .unwrap();
        assert_eq!(registry.rename(a, "c"), Err(DescriptorError::DuplicatePath(path(":c"))));
        assert_eq!(registry.get(a).unwrap().name(), "a");
    }

    #[test]
    fn rename_skips_removed_children() {
        let (mut registry, _, a, b) = registry_with_tree();
        registry.remove_project(&path(":a:b")).unwrap();

        registry.rename(a, "core").unwrap();
        assert_eq!(registry.get_project(&path(":core")).unwrap().id(), a);
        assert!(registry.get_project(&path(":a")).is_none());
        assert!(registry.get_project(&path(":core:b")).is_none());
        assert_eq!(registry.get(b).unwrap().path().to_string(), ":a:b");
        assert_eq!(paths(registry.get_all_projects(&ProjectPath::root())), vec![":", ":core"]);
    }

    #[test]
    fn failed_rename_changes_nothing() {
        let (mut registry, root, a, b) = registry_with_tree();
        let stray = registry
            .create_descriptor(Some(root), "q", Path::new("/proj/q"), DEFAULT_BUILD_FILE_NAME)
            .unwrap();
        registry.change_descriptor_path(&path(":q"), path(":z:b")).unwrap();

        assert_eq!(registry.rename(a, "z"), Err(DescriptorError::DuplicatePath(path(":z:b"))));
        assert_eq!(registry.get(a).unwrap().name(), "a");
        assert_eq!(registry.get_project(&path(":a")).unwrap().id(), a);
        assert_eq!(registry.get_project(&path(":a:b")).unwrap().id(), b);
        assert_eq!(registry.get_project(&path(":z:b")).unwrap().id(), stray);
        assert_eq!(paths(registry.get_all_projects(&path(":a"))), vec![":a", ":a:b"]);
    }

    #[test]
    fn rename_root_keeps_root_path() {
        let (mut registry, root, ..) = registry_with_tree();
        registry.rename(root, "renamed").unwrap();
        assert_eq!(registry.root().unwrap().name(), "renamed");
        assert!(registry.root().unwrap().path().is_root());
    }

    #[test]
    fn lookup_by_directory() {
        let (mut registry, root, ..) = registry_with_tree();
        let found = registry.get_project_by_dir(Path::new("/proj/a/./")).unwrap();
        assert_eq!(found.unwrap().path().to_string(), ":a");
        assert!(registry.get_project_by_dir(Path::new("/nope")).unwrap().is_none());

        registry
            .create_descriptor(Some(root), "twin", Path::new("/proj/a"), DEFAULT_BUILD_FILE_NAME)
            .unwrap();
        let err = registry.get_project_by_dir(Path::new("/proj/a")).unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().contains("project ':a', project ':twin'"));
    }

    #[test]
    fn descriptors_compare_by_path() {
        let (registry, _, a, _) = registry_with_tree();
        let mut other = registry.get(a).unwrap().clone();
        other.project_dir = PathBuf::from("/different");
        assert_eq!(registry.get(a).unwrap(), &other);
    }

    #[test]
    fn discard_all_clears() {
        let (mut registry, ..) = registry_with_tree();
        registry.discard_all();
        assert!(registry.is_empty());
        assert!(registry.root().is_none());
    }

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Include(usize, u8),
        Rename(usize, u8),
        Move(usize, u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<usize>(), 0u8..6).prop_map(|(i, n)| Op::Include(i, n)),
            (any::<usize>(), 0u8..6).prop_map(|(i, n)| Op::Rename(i, n)),
            (any::<usize>(), 0u8..6).prop_map(|(i, n)| Op::Move(i, n)),
        ]
    }

    /// Checks both indexes against a recomputation from scratch
    fn assert_consistent(registry: &ProjectDescriptorRegistry) {
        let all = registry.all_projects();
        for descriptor in &all {
            // path index is bijective
            assert_eq!(registry.get_project(descriptor.path()).unwrap().id(), descriptor.id());

            let mut expected: Vec<String> = all
                .iter()
                .filter(|d| d.path() == descriptor.path() || descriptor.path().is_ancestor_of(d.path()))
                .map(|d| d.path().to_string())
                .collect();
            expected.sort();
            assert_eq!(paths(registry.get_all_projects(descriptor.path())), expected);
        }
    }

    proptest! {
        #[test]
        fn descendant_sets_stay_consistent(ops in proptest::collection::vec(op(), 1..40)) {
            let mut registry = ProjectDescriptorRegistry::new();
            registry.create_descriptor(None, "root", Path::new("/r"), DEFAULT_BUILD_FILE_NAME).unwrap();

            for op in ops {
                let ids: Vec<DescriptorId> = registry.all_projects().iter().map(|d| d.id()).collect();
                match op {
                    Op::Include(i, n) => {
                        let parent = ids[i % ids.len()];
                        let dir = registry.get(parent).unwrap().project_dir().join(format!("p{}", n));
                        let _ = registry.create_descriptor(Some(parent), &format!("p{}", n), &dir, DEFAULT_BUILD_FILE_NAME);
                    }
                    Op::Rename(i, n) => {
                        let _ = registry.rename(ids[i % ids.len()], &format!("p{}", n));
                    }
                    Op::Move(i, n) => {
                        // Only leaves can move freely without orphaning descendants
                        let id = ids[i % ids.len()];
                        let descriptor = registry.get(id).unwrap();
                        if descriptor.parent().is_some() && registry.get_sub_projects(descriptor.path()).is_empty() {
                            let old = descriptor.path().clone();
                            let new = old.parent().unwrap().child(&format!("m{}", n)).unwrap();
                            let _ = registry.change_descriptor_path(&old, new);
                        }
                    }
                }
                assert_consistent(&registry);
            }
        }
    }
}
