//! The settings facade
//!
//! A [`Settings`] owns the descriptor registry of one build and exposes the
//! operations a settings script uses to lay out the project tree.
//! [`SettingsState`] pairs it with the services that live as long as the
//! settings do.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::location::SettingsLocation;
use super::properties::BuildProperties;
use super::start::StartParameter;
use crate::build::{ServiceError, ServiceScope};
use crate::domain::{
    normalize_path, DescriptorError, DescriptorId, PathError, ProjectDescriptor,
    ProjectDescriptorRegistry, ProjectPath, ProjectSnapshot, SelectionError,
};
use crate::scope::{ClassLoaderScope, ScopeError};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Project with path '{0}' could not be found.")]
    ProjectNotFound(String),

    #[error("Settings file '{}' does not exist.", .0.display())]
    MissingSettingsFile(PathBuf),

    #[error("Included build '{}' does not exist.", .0.display())]
    MissingIncludedBuild(PathBuf),

    #[error("Included build '{}' is not a directory.", .0.display())]
    IncludedBuildNotDirectory(PathBuf),

    #[error("Included build '{}' has build name '{name}' which is already used by '{}'.", dir.display(), existing.display())]
    DuplicateIncludedBuild {
        name: String,
        dir: PathBuf,
        existing: PathBuf,
    },

    #[error("Included build '{}' is the root build itself.", .0.display())]
    IncludesItself(PathBuf),

    #[error("Settings have no root project")]
    NoRootProject,

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Scope(#[from] ScopeError),
}

impl SettingsError {
    /// True for errors caused by user input
    pub fn is_user_error(&self) -> bool {
        match self {
            SettingsError::Descriptor(e) => e.is_user_error(),
            SettingsError::NoRootProject | SettingsError::Scope(_) => false,
            _ => true,
        }
    }
}

/// A build included into a composite build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludedBuild {
    pub name: String,
    /// Identity of the build within the build tree, e.g. `:lib`
    pub build_path: ProjectPath,
    pub root_dir: PathBuf,
}

/// Settings of one build
#[derive(Debug)]
pub struct Settings {
    settings_dir: PathBuf,
    settings_script: Option<PathBuf>,
    start_parameter: StartParameter,
    properties: BuildProperties,
    registry: ProjectDescriptorRegistry,
    root: DescriptorId,
    scope: Arc<ClassLoaderScope>,
    included_builds: Vec<PathBuf>,
    default_project: Option<ProjectPath>,
}

impl Settings {
    /// Creates settings with only a root project, named after the settings
    /// directory
    pub fn new(
        location: &SettingsLocation,
        start_parameter: StartParameter,
        properties: BuildProperties,
        scope: Arc<ClassLoaderScope>,
    ) -> Result<Self, SettingsError> {
        let settings_dir = normalize_path(&location.settings_dir);
        let root_name = settings_dir
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("root")
            .replace(':', "_");

        let mut registry = ProjectDescriptorRegistry::new();
        let root = registry.create_descriptor(
            None,
            &root_name,
            &settings_dir,
            &start_parameter.file_names.build,
        )?;

        Ok(Self {
            settings_dir,
            settings_script: location.settings_file.clone(),
            start_parameter,
            properties,
            registry,
            root,
            scope,
            included_builds: Vec::new(),
            default_project: None,
        })
    }

    /// Recreates settings from a snapshot of an earlier project tree
    pub fn from_snapshot(
        location: &SettingsLocation,
        start_parameter: StartParameter,
        properties: BuildProperties,
        scope: Arc<ClassLoaderScope>,
        root: &ProjectSnapshot,
    ) -> Result<Self, SettingsError> {
        let mut settings = Self::new(location, start_parameter, properties, scope)?;
        settings.registry.discard_all();
        settings.root = settings.restore(None, root)?;
        Ok(settings)
    }

    fn restore(
        &mut self,
        parent: Option<DescriptorId>,
        snapshot: &ProjectSnapshot,
    ) -> Result<DescriptorId, SettingsError> {
        let file_name = snapshot
            .build_file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(self.start_parameter.file_names.build.as_str())
            .to_string();
        let id = self
            .registry
            .create_descriptor(parent, &snapshot.name, &snapshot.project_dir, &file_name)?;
        for child in &snapshot.children {
            self.restore(Some(id), child)?;
        }
        Ok(id)
    }

    /// Includes projects by path, creating missing ancestors
    ///
    /// `include("a:b")` creates `:a` in `<root>/a` and `:a:b` in
    /// `<root>/a/b`. Paths already included are left alone.
    pub fn include<S: AsRef<str>>(&mut self, paths: &[S]) -> Result<(), SettingsError> {
        for raw in paths {
            let path = ProjectPath::root().resolve(raw.as_ref())?;
            let mut parent = self.root;
            let mut current = ProjectPath::root();
            for segment in path.segments() {
                current = current.child(segment)?;
                parent = match self.registry.get_project(&current) {
                    Some(existing) => existing.id(),
                    None => {
                        let dir = self.descriptor(parent)?.project_dir().join(segment);
                        debug!(path = %current, dir = %dir.display(), "Including project");
                        self.registry.create_descriptor(
                            Some(parent),
                            segment,
                            &dir,
                            &self.start_parameter.file_names.build,
                        )?
                    }
                };
            }
        }
        Ok(())
    }

    /// Includes projects that live next to the root directory
    pub fn include_flat<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), SettingsError> {
        let base = self
            .settings_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.settings_dir.clone());

        for name in names {
            let name = name.as_ref();
            let path = ProjectPath::root().child(name)?;
            if self.registry.get_project(&path).is_some() {
                continue;
            }
            self.registry.create_descriptor(
                Some(self.root),
                name,
                &base.join(name),
                &self.start_parameter.file_names.build,
            )?;
        }
        Ok(())
    }

    /// Requests another build to be included, relative to the settings
    /// directory
    pub fn include_build(&mut self, dir: &Path) {
        let dir = normalize_path(&self.settings_dir.join(dir));
        if !self.included_builds.contains(&dir) {
            self.included_builds.push(dir);
        }
    }

    pub fn root_project(&self) -> Result<&ProjectDescriptor, SettingsError> {
        self.registry.get(self.root).ok_or(SettingsError::NoRootProject)
    }

    /// The project at `path`, relative paths resolving against the root
    pub fn project(&self, path: &str) -> Result<&ProjectDescriptor, SettingsError> {
        self.find_project(path)
            .ok_or_else(|| SettingsError::ProjectNotFound(path.to_string()))
    }

    pub fn find_project(&self, path: &str) -> Option<&ProjectDescriptor> {
        let path = ProjectPath::root().resolve(path).ok()?;
        self.registry.get_project(&path)
    }

    pub fn find_project_by_dir(&self, dir: &Path) -> Result<Option<&ProjectDescriptor>, SettingsError> {
        let dir = normalize_path(&self.settings_dir.join(dir));
        Ok(self.registry.get_project_by_dir(&dir)?)
    }

    /// Renames a project and every path below it
    pub fn rename_project(&mut self, path: &str, name: &str) -> Result<(), SettingsError> {
        let id = self.project(path)?.id();
        self.registry.rename(id, name)?;
        Ok(())
    }

    /// Moves a project to another directory, relative to the settings
    /// directory
    pub fn set_project_dir(&mut self, path: &str, dir: &Path) -> Result<(), SettingsError> {
        let id = self.project(path)?.id();
        let dir = self.settings_dir.join(dir);
        self.registry.set_project_dir(id, &dir)?;
        Ok(())
    }

    pub fn set_build_file_name(&mut self, path: &str, name: &str) -> Result<(), SettingsError> {
        let id = self.project(path)?.id();
        self.registry.set_build_file_name(id, name)?;
        Ok(())
    }

    pub fn registry(&self) -> &ProjectDescriptorRegistry {
        &self.registry
    }

    pub fn settings_dir(&self) -> &Path {
        &self.settings_dir
    }

    pub fn settings_script(&self) -> Option<&Path> {
        self.settings_script.as_deref()
    }

    /// Name of these settings in user-facing messages
    pub fn description(&self) -> String {
        SettingsLocation::new(&self.settings_dir, self.settings_script.clone()).description()
    }

    pub fn start_parameter(&self) -> &StartParameter {
        &self.start_parameter
    }

    pub fn properties(&self) -> &BuildProperties {
        &self.properties
    }

    pub fn class_loader_scope(&self) -> &Arc<ClassLoaderScope> {
        &self.scope
    }

    /// Build directories requested through [`Settings::include_build`]
    pub fn included_builds(&self) -> &[PathBuf] {
        &self.included_builds
    }

    pub fn default_project(&self) -> Option<&ProjectPath> {
        self.default_project.as_ref()
    }

    pub fn set_default_project(&mut self, path: ProjectPath) -> Result<(), SettingsError> {
        if self.registry.get_project(&path).is_none() {
            return Err(SettingsError::ProjectNotFound(path.to_string()));
        }
        self.default_project = Some(path);
        Ok(())
    }

    fn descriptor(&self, id: DescriptorId) -> Result<&ProjectDescriptor, SettingsError> {
        self.registry
            .get(id)
            .ok_or(SettingsError::Descriptor(DescriptorError::UnknownDescriptor(id)))
    }
}

/// Settings plus the services bound to them
#[derive(Debug)]
pub struct SettingsState {
    settings: Settings,
    services: ServiceScope,
    included_builds: Vec<IncludedBuild>,
}

impl SettingsState {
    pub fn new(settings: Settings, services: ServiceScope) -> Self {
        Self {
            settings,
            services,
            included_builds: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn services_mut(&mut self) -> &mut ServiceScope {
        &mut self.services
    }

    /// Included builds validated and registered for this build
    pub fn included_builds(&self) -> &[IncludedBuild] {
        &self.included_builds
    }

    pub fn set_included_builds(&mut self, builds: Vec<IncludedBuild>) {
        self.included_builds = builds;
    }

    /// Releases the settings services; consuming `self` makes a second close
    /// impossible
    pub fn close(mut self) -> Result<(), ServiceError> {
        debug!(dir = %self.settings.settings_dir.display(), "Closing settings");
        self.services.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ClassLoaderScopeRegistry;

    fn settings_at(dir: &str) -> Settings {
        let scopes = ClassLoaderScopeRegistry::empty();
        let location = SettingsLocation::new(dir, Some(PathBuf::from(dir).join("settings.toml")));
        Settings::new(
            &location,
            StartParameter::new(Path::new(dir)),
            BuildProperties::default(),
            scopes.core_and_plugins_scope().create_child("settings"),
        )
        .unwrap()
    }

    fn paths(settings: &Settings) -> Vec<(String, PathBuf)> {
        settings
            .registry()
            .all_projects()
            .into_iter()
            .map(|d| (d.path().to_string(), d.project_dir().to_path_buf()))
            .collect()
    }

    #[test]
    fn include_creates_nested_projects() {
        let mut settings = settings_at("/proj");
        settings.include(&["a"]).unwrap();
        settings.include(&["a:b"]).unwrap();

        assert_eq!(
            paths(&settings),
            vec![
                (":".to_string(), PathBuf::from("/proj")),
                (":a".to_string(), PathBuf::from("/proj/a")),
                (":a:b".to_string(), PathBuf::from("/proj/a/b")),
            ]
        );

        let a: ProjectPath = ":a".parse().unwrap();
        let all: Vec<String> = settings
            .registry()
            .get_all_projects(&a)
            .iter()
            .map(|d| d.path().to_string())
            .collect();
        assert_eq!(all, vec![":a", ":a:b"]);
    }

    #[test]
    fn include_creates_missing_ancestors() {
        let mut settings = settings_at("/proj");
        settings.include(&[":libs:core"]).unwrap();
        assert_eq!(settings.project("libs").unwrap().project_dir(), Path::new("/proj/libs"));
        assert_eq!(settings.project(":libs:core").unwrap().name(), "core");
    }

    #[test]
    fn include_flat_uses_sibling_directories() {
        let mut settings = settings_at("/work/proj");
        settings.include_flat(&["shared"]).unwrap();
        assert_eq!(settings.project(":shared").unwrap().project_dir(), Path::new("/work/shared"));
    }

    #[test]
    fn root_named_after_directory() {
        let settings = settings_at("/work/my-app");
        assert_eq!(settings.root_project().unwrap().name(), "my-app");
        assert_eq!(settings.root_project().unwrap().path(), &ProjectPath::root());
    }

    #[test]
    fn unknown_project_message() {
        let settings = settings_at("/proj");
        let err = settings.project(":missing").unwrap_err();
        assert_eq!(err.to_string(), "Project with path ':missing' could not be found.");
        assert!(err.is_user_error());
    }

    #[test]
    fn rename_moves_subtree() {
        let mut settings = settings_at("/proj");
        settings.include(&["a:b"]).unwrap();
        settings.rename_project(":a", "x").unwrap();

        assert!(settings.find_project(":a").is_none());
        assert!(settings.find_project(":x:b").is_some());
        // Directories stay where they were
        assert_eq!(settings.project(":x:b").unwrap().project_dir(), Path::new("/proj/a/b"));
    }

    #[test]
    fn find_by_dir_relative_to_settings() {
        let mut settings = settings_at("/proj");
        settings.include(&["a"]).unwrap();
        let found = settings.find_project_by_dir(Path::new("a")).unwrap().unwrap();
        assert_eq!(found.path().to_string(), ":a");
        assert!(settings.find_project_by_dir(Path::new("zzz")).unwrap().is_none());
    }

    #[test]
    fn include_build_deduplicates() {
        let mut settings = settings_at("/proj");
        settings.include_build(Path::new("../lib"));
        settings.include_build(Path::new("/lib"));
        assert_eq!(settings.included_builds(), &[PathBuf::from("/lib")]);
    }

    #[test]
    fn restores_from_snapshot() {
        let mut settings = settings_at("/proj");
        settings.include(&["a:b"]).unwrap();
        settings.set_build_file_name(":a", "a.toml").unwrap();
        let snapshot = ProjectSnapshot::from_registry(settings.registry(), &ProjectPath::root()).unwrap();

        let scopes = ClassLoaderScopeRegistry::empty();
        let location = SettingsLocation::new("/proj", None);
        let restored = Settings::from_snapshot(
            &location,
            StartParameter::new(Path::new("/proj")),
            BuildProperties::default(),
            scopes.core_scope().create_child("settings"),
            &snapshot,
        )
        .unwrap();

        assert_eq!(paths(&restored), paths(&settings));
        assert_eq!(restored.project(":a").unwrap().build_file_name(), "a.toml");
    }

    #[test]
    fn default_project_must_exist() {
        let mut settings = settings_at("/proj");
        assert!(settings.set_default_project(":nope".parse().unwrap()).is_err());
        settings.set_default_project(ProjectPath::root()).unwrap();
        assert_eq!(settings.default_project(), Some(&ProjectPath::root()));
    }
}
