//! Build invocation parameters

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::{normalize_path, DEFAULT_BUILD_FILE_NAME};

pub const DEFAULT_SETTINGS_FILE_NAME: &str = "settings.toml";
pub const DEFAULT_PROPERTIES_FILE_NAME: &str = "properties.toml";

/// File names a build looks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileNames {
    pub settings: String,
    pub build: String,
    pub properties: String,
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            settings: DEFAULT_SETTINGS_FILE_NAME.to_string(),
            build: DEFAULT_BUILD_FILE_NAME.to_string(),
            properties: DEFAULT_PROPERTIES_FILE_NAME.to_string(),
        }
    }
}

/// Everything a build was started with
///
/// All paths are absolute and normalized; relative input is resolved against
/// the current directory by the `with_*` builders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartParameter {
    pub current_dir: PathBuf,
    pub project_dir: Option<PathBuf>,
    pub build_file: Option<PathBuf>,
    pub settings_file: Option<PathBuf>,
    pub task_names: Vec<String>,
    /// `-P key=value` overrides
    pub project_properties: BTreeMap<String, String>,
    pub included_builds: Vec<PathBuf>,
    pub search_upwards: bool,
    pub offline: bool,
    pub dry_run: bool,
    pub configuration_cache: bool,
    /// Skip settings discovery and evaluation entirely
    pub use_empty_settings: bool,
    pub file_names: FileNames,
}

impl StartParameter {
    pub fn new(current_dir: &Path) -> Self {
        Self {
            current_dir: normalize_path(current_dir),
            project_dir: None,
            build_file: None,
            settings_file: None,
            task_names: Vec::new(),
            project_properties: BTreeMap::new(),
            included_builds: Vec::new(),
            search_upwards: true,
            offline: false,
            dry_run: false,
            configuration_cache: false,
            use_empty_settings: false,
            file_names: FileNames::default(),
        }
    }

    pub fn with_project_dir(mut self, dir: &Path) -> Self {
        self.project_dir = Some(self.resolve(dir));
        self
    }

    pub fn with_build_file(mut self, file: &Path) -> Self {
        self.build_file = Some(self.resolve(file));
        self
    }

    pub fn with_settings_file(mut self, file: &Path) -> Self {
        self.settings_file = Some(self.resolve(file));
        self
    }

    pub fn with_included_build(mut self, dir: &Path) -> Self {
        let dir = self.resolve(dir);
        self.included_builds.push(dir);
        self
    }

    pub fn with_tasks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.task_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.project_properties.insert(key.to_string(), value.to_string());
        self
    }

    /// Directory the build is aimed at: the project directory, else the
    /// build file's directory, else the current directory
    pub fn effective_project_dir(&self) -> PathBuf {
        if let Some(dir) = &self.project_dir {
            return dir.clone();
        }
        self.build_file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.current_dir.clone())
    }

    /// Copy that neither searches for nor evaluates a settings script
    pub fn use_empty_settings_variant(&self) -> Self {
        let mut variant = self.clone();
        variant.use_empty_settings = true;
        variant.search_upwards = false;
        variant.settings_file = None;
        variant
    }

    /// Parameters for an included build rooted at `root_dir`
    ///
    /// Shared switches and property overrides carry over; tasks, selection
    /// and further included builds do not.
    pub fn for_nested_build(&self, root_dir: &Path) -> Self {
        let mut nested = Self::new(root_dir);
        nested.project_properties = self.project_properties.clone();
        nested.offline = self.offline;
        nested.dry_run = self.dry_run;
        nested.search_upwards = false;
        nested.file_names = self.file_names.clone();
        nested
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        normalize_path(&self.current_dir.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_current_dir() {
        let start = StartParameter::new(Path::new("/work/proj"))
            .with_project_dir(Path::new("../other"))
            .with_build_file(Path::new("sub/custom.toml"));

        assert_eq!(start.project_dir, Some(PathBuf::from("/work/other")));
        assert_eq!(start.build_file, Some(PathBuf::from("/work/proj/sub/custom.toml")));
    }

    #[test]
    fn effective_project_dir_precedence() {
        let start = StartParameter::new(Path::new("/w"));
        assert_eq!(start.effective_project_dir(), PathBuf::from("/w"));

        let start = start.with_build_file(Path::new("a/build.toml"));
        assert_eq!(start.effective_project_dir(), PathBuf::from("/w/a"));

        let start = start.with_project_dir(Path::new("b"));
        assert_eq!(start.effective_project_dir(), PathBuf::from("/w/b"));
    }

    #[test]
    fn empty_settings_variant_drops_discovery() {
        let start = StartParameter::new(Path::new("/w")).with_settings_file(Path::new("s.toml"));
        let variant = start.use_empty_settings_variant();

        assert!(variant.use_empty_settings);
        assert!(!variant.search_upwards);
        assert!(variant.settings_file.is_none());
        assert_eq!(variant.current_dir, start.current_dir);
    }

    #[test]
    fn nested_build_inherits_switches_only() {
        let mut start = StartParameter::new(Path::new("/w"))
            .with_tasks(["build"])
            .with_property("version", "1.0")
            .with_included_build(Path::new("../lib"));
        start.offline = true;

        let nested = start.for_nested_build(Path::new("/lib"));
        assert_eq!(nested.current_dir, PathBuf::from("/lib"));
        assert!(nested.offline);
        assert!(nested.task_names.is_empty());
        assert!(nested.included_builds.is_empty());
        assert_eq!(nested.project_properties.get("version").map(String::as_str), Some("1.0"));
    }
}
