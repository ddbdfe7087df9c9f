//! Settings script evaluation
//!
//! The default evaluator reads a declarative TOML settings file:
//!
//! ```toml
//! root_project_name = "shop"
//! include = ["api", "libs:core"]
//! include_flat = ["shared"]
//! include_build = ["../plugins"]
//! classpath = ["buildSrc/vendor"]
//!
//! [projects.":libs:core"]
//! name = "core-lib"
//! dir = "modules/core"
//! build_file = "core.toml"
//! ```
//!
//! Overrides under `[projects]` are applied after every include, in path
//! order, so a table can target any included project.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use super::settings::Settings;
use crate::scope::{ClassLoaderScope, ClassPath};

/// A settings script and its text
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptSource {
    pub path: PathBuf,
    pub text: String,
}

impl ScriptSource {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            text,
        })
    }

    pub fn display_name(&self) -> String {
        format!("settings file '{}'", self.path.display())
    }
}

/// Runs a settings script against fresh settings
///
/// `scope` is the settings class loader scope; it is locked by the caller
/// once evaluation returns.
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, script: &ScriptSource, settings: &mut Settings, scope: &Arc<ClassLoaderScope>) -> Result<()>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsScript {
    root_project_name: Option<String>,

    #[serde(default)]
    include: Vec<String>,

    #[serde(default)]
    include_flat: Vec<String>,

    #[serde(default)]
    include_build: Vec<PathBuf>,

    /// Directories exported to every project's build logic
    #[serde(default)]
    classpath: Vec<PathBuf>,

    #[serde(default)]
    projects: BTreeMap<String, ProjectOverride>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectOverride {
    name: Option<String>,
    dir: Option<PathBuf>,
    build_file: Option<String>,
}

/// Evaluator for `settings.toml`
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlSettingsScript;

impl ScriptEvaluator for TomlSettingsScript {
    fn evaluate(&self, script: &ScriptSource, settings: &mut Settings, scope: &Arc<ClassLoaderScope>) -> Result<()> {
        let parsed: SettingsScript = toml::from_str(&script.text)
            .with_context(|| format!("Could not parse {}", script.display_name()))?;

        if !parsed.classpath.is_empty() {
            let classpath = ClassPath::of(parsed.classpath.iter().map(|p| settings.settings_dir().join(p)));
            scope.export(&classpath)?;
        }

        settings.include(&parsed.include)?;
        settings.include_flat(&parsed.include_flat)?;
        for dir in &parsed.include_build {
            settings.include_build(dir);
        }

        // Overrides address projects by their included path, so dirs and
        // build files go first and renames last
        for (path, project) in &parsed.projects {
            if let Some(dir) = &project.dir {
                settings.set_project_dir(path, dir)?;
            }
            if let Some(build_file) = &project.build_file {
                settings.set_build_file_name(path, build_file)?;
            }
        }
        for (path, project) in parsed.projects.iter().rev() {
            if let Some(name) = &project.name {
                settings.rename_project(path, name)?;
            }
        }

        if let Some(name) = &parsed.root_project_name {
            settings.rename_project(":", name)?;
        }

        debug!(
            script = %script.path.display(),
            projects = settings.registry().len(),
            "Evaluated settings script"
        );
        Ok(())
    }
}
