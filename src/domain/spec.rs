//! Default project selection
//!
//! A [`ProjectSpec`] picks exactly one descriptor out of a registry, using
//! the build file, project directory or current directory the build was
//! started with.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::descriptor::{describe, normalize_path, ProjectDescriptor, ProjectDescriptorRegistry};

const UNRELATED_BUILD_HINT: &str =
    "If this is an unrelated build, it must have its own settings file.";

/// Selection failures; all of them are caused by user input
#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("{0}")]
    Precondition(String),

    #[error("{0}")]
    NoMatch(String),

    #[error("{0}")]
    MultipleMatches(String),
}

/// Strategy for choosing the default project of a build
pub trait ProjectSpec: fmt::Debug {
    /// Appends every descriptor matching this spec
    fn select<'a>(
        &self,
        registry: &'a ProjectDescriptorRegistry,
        matches: &mut Vec<&'a ProjectDescriptor>,
    );

    /// Checks the spec's own inputs before selection
    fn check_preconditions(&self) -> Result<(), SelectionError> {
        Ok(())
    }

    fn no_match_message(&self, settings_description: &str) -> String;

    fn multiple_matches_message(&self, matches: &[&ProjectDescriptor]) -> String;

    /// True when [`ProjectSpec::select`] finds at least one descriptor
    fn contains_project(&self, registry: &ProjectDescriptorRegistry) -> bool {
        let mut matches = Vec::new();
        self.select(registry, &mut matches);
        !matches.is_empty()
    }

    /// Selects exactly one descriptor or fails with a user-facing message
    fn select_project<'a>(
        &self,
        settings_description: &str,
        registry: &'a ProjectDescriptorRegistry,
    ) -> Result<&'a ProjectDescriptor, SelectionError> {
        self.check_preconditions()?;

        let mut matches = Vec::new();
        self.select(registry, &mut matches);

        match matches.len() {
            0 => Err(SelectionError::NoMatch(
                self.no_match_message(settings_description),
            )),
            1 => Ok(matches[0]),
            _ => Err(SelectionError::MultipleMatches(
                self.multiple_matches_message(&matches),
            )),
        }
    }
}

/// Selects the project whose build file is the given file
#[derive(Debug, Clone)]
pub struct BuildFileProjectSpec {
    build_file: PathBuf,
}

impl BuildFileProjectSpec {
    pub fn new(build_file: &Path) -> Self {
        Self {
            build_file: normalize_path(build_file),
        }
    }
}

impl ProjectSpec for BuildFileProjectSpec {
    fn select<'a>(
        &self,
        registry: &'a ProjectDescriptorRegistry,
        matches: &mut Vec<&'a ProjectDescriptor>,
    ) {
        matches.extend(
            registry
                .all_projects()
                .into_iter()
                .filter(|d| d.build_file() == self.build_file),
        );
    }

    fn check_preconditions(&self) -> Result<(), SelectionError> {
        if !self.build_file.exists() {
            return Err(SelectionError::Precondition(format!(
                "Build file '{}' does not exist.",
                self.build_file.display()
            )));
        }
        if !self.build_file.is_file() {
            return Err(SelectionError::Precondition(format!(
                "Build file '{}' is not a file.",
                self.build_file.display()
            )));
        }
        Ok(())
    }

    fn no_match_message(&self, settings_description: &str) -> String {
        format!(
            "Build file '{}' is not part of the build defined by {}. {}",
            self.build_file.display(),
            settings_description,
            UNRELATED_BUILD_HINT
        )
    }

    fn multiple_matches_message(&self, matches: &[&ProjectDescriptor]) -> String {
        format!(
            "Multiple projects in this build have build file '{}': {}",
            self.build_file.display(),
            describe(matches)
        )
    }
}

/// Selects the project located in the given directory
#[derive(Debug, Clone)]
pub struct ProjectDirectoryProjectSpec {
    dir: PathBuf,
}

impl ProjectDirectoryProjectSpec {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: normalize_path(dir),
        }
    }
}

impl ProjectSpec for ProjectDirectoryProjectSpec {
    fn select<'a>(
        &self,
        registry: &'a ProjectDescriptorRegistry,
        matches: &mut Vec<&'a ProjectDescriptor>,
    ) {
        select_by_dir(&self.dir, registry, matches);
    }

    fn check_preconditions(&self) -> Result<(), SelectionError> {
        if !self.dir.exists() {
            return Err(SelectionError::Precondition(format!(
                "Project directory '{}' does not exist.",
                self.dir.display()
            )));
        }
        if !self.dir.is_dir() {
            return Err(SelectionError::Precondition(format!(
                "Project directory '{}' is not a directory.",
                self.dir.display()
            )));
        }
        Ok(())
    }

    fn no_match_message(&self, settings_description: &str) -> String {
        dir_no_match_message(&self.dir, settings_description)
    }

    fn multiple_matches_message(&self, matches: &[&ProjectDescriptor]) -> String {
        dir_multiple_matches_message(&self.dir, matches)
    }
}

/// Selects the project in the current directory
///
/// When the build was started in the settings directory itself and no
/// project lives there, the root project is selected instead.
#[derive(Debug, Clone)]
pub struct CurrentDirectoryProjectSpec {
    current_dir: PathBuf,
    use_root_when_no_match: bool,
}

impl CurrentDirectoryProjectSpec {
    pub fn new(current_dir: &Path, settings_dir: &Path) -> Self {
        let current_dir = normalize_path(current_dir);
        let use_root_when_no_match = current_dir == normalize_path(settings_dir);
        Self {
            current_dir,
            use_root_when_no_match,
        }
    }
}

impl ProjectSpec for CurrentDirectoryProjectSpec {
    fn select<'a>(
        &self,
        registry: &'a ProjectDescriptorRegistry,
        matches: &mut Vec<&'a ProjectDescriptor>,
    ) {
        let before = matches.len();
        select_by_dir(&self.current_dir, registry, matches);

        if matches.len() == before && self.use_root_when_no_match {
            matches.extend(registry.root());
        }
    }

    fn no_match_message(&self, settings_description: &str) -> String {
        dir_no_match_message(&self.current_dir, settings_description)
    }

    fn multiple_matches_message(&self, matches: &[&ProjectDescriptor]) -> String {
        dir_multiple_matches_message(&self.current_dir, matches)
    }
}

/// Picks the spec for a build invocation: an explicit build file wins over
/// an explicit project directory, which wins over the current directory
pub fn for_selection(
    build_file: Option<&Path>,
    project_dir: Option<&Path>,
    current_dir: &Path,
    settings_dir: &Path,
) -> Box<dyn ProjectSpec> {
    if let Some(build_file) = build_file {
        return Box::new(BuildFileProjectSpec::new(build_file));
    }
    if let Some(project_dir) = project_dir {
        return Box::new(ProjectDirectoryProjectSpec::new(project_dir));
    }
    Box::new(CurrentDirectoryProjectSpec::new(current_dir, settings_dir))
}

fn select_by_dir<'a>(
    dir: &Path,
    registry: &'a ProjectDescriptorRegistry,
    matches: &mut Vec<&'a ProjectDescriptor>,
) {
    matches.extend(
        registry
            .all_projects()
            .into_iter()
            .filter(|d| d.project_dir() == dir),
    );
}

fn dir_no_match_message(dir: &Path, settings_description: &str) -> String {
    format!(
        "Project directory '{}' is not part of the build defined by {}. {}",
        dir.display(),
        settings_description,
        UNRELATED_BUILD_HINT
    )
}

fn dir_multiple_matches_message(dir: &Path, matches: &[&ProjectDescriptor]) -> String {
    format!(
        "Multiple projects in this build have project directory '{}': {}",
        dir.display(),
        describe(matches)
    )
}
