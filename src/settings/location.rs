//! Settings discovery

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::settings::SettingsError;
use super::start::StartParameter;

/// Where a build's settings live
///
/// `settings_file` is None when no settings script exists; the build then
/// consists of a single project in `settings_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsLocation {
    pub settings_dir: PathBuf,
    pub settings_file: Option<PathBuf>,
}

impl SettingsLocation {
    pub fn new(settings_dir: impl Into<PathBuf>, settings_file: Option<PathBuf>) -> Self {
        Self {
            settings_dir: settings_dir.into(),
            settings_file,
        }
    }

    /// Human-readable name used in user-facing messages
    pub fn description(&self) -> String {
        match &self.settings_file {
            Some(file) => format!("settings file '{}'", file.display()),
            None => format!("the build in directory '{}'", self.settings_dir.display()),
        }
    }
}

pub trait SettingsLocationFinder: Send + Sync {
    fn find(&self, start: &StartParameter) -> Result<SettingsLocation>;
}

/// Looks for the settings file in the project directory, then in each parent
/// directory when searching upwards is enabled
#[derive(Debug, Clone, Copy, Default)]
pub struct UpwardSettingsFinder;

impl SettingsLocationFinder for UpwardSettingsFinder {
    fn find(&self, start: &StartParameter) -> Result<SettingsLocation> {
        let start_dir = start.effective_project_dir();

        if start.use_empty_settings {
            return Ok(SettingsLocation::new(start_dir, None));
        }

        if let Some(file) = &start.settings_file {
            if !file.is_file() {
                return Err(SettingsError::MissingSettingsFile(file.clone()).into());
            }
            let dir = file.parent().map(Path::to_path_buf).unwrap_or_else(|| start_dir.clone());
            return Ok(SettingsLocation::new(dir, Some(file.clone())));
        }

        let name = &start.file_names.settings;
        let mut dir = start_dir.clone();
        loop {
            let candidate = dir.join(name);
            if candidate.is_file() {
                debug!(file = %candidate.display(), "Found settings file");
                return Ok(SettingsLocation::new(dir, Some(candidate)));
            }
            if !start.search_upwards || !dir.pop() {
                break;
            }
        }

        debug!(dir = %start_dir.display(), "No settings file found");
        Ok(SettingsLocation::new(start_dir, None))
    }
}
