//! Settings loading with default project selection
//!
//! Loading runs the settings pipeline, then checks that the project the
//! build was aimed at is part of the loaded settings. When it is not, and no
//! settings file was named explicitly, the settings are discarded and the
//! build is retried as a single-project build without a settings script.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use super::build_src::BuildSrcBuilder;
use super::location::SettingsLocationFinder;
use super::pipeline::{SettingsPipeline, SettingsRequest};
use super::settings::{SettingsError, SettingsState};
use super::start::StartParameter;
use crate::domain::{spec, ProjectPath, ProjectSpec};
use crate::scope::ClassLoaderScopeRegistry;

pub struct SettingsLoader {
    finder: Arc<dyn SettingsLocationFinder>,
    build_src: Arc<dyn BuildSrcBuilder>,
    pipeline: SettingsPipeline,
}

impl SettingsLoader {
    pub fn new(
        finder: Arc<dyn SettingsLocationFinder>,
        build_src: Arc<dyn BuildSrcBuilder>,
        pipeline: SettingsPipeline,
    ) -> Self {
        Self {
            finder,
            build_src,
            pipeline,
        }
    }

    /// Loads the settings of a build and records its default project
    pub fn load(
        &self,
        start: &StartParameter,
        build_path: &ProjectPath,
        scopes: &ClassLoaderScopeRegistry,
    ) -> Result<SettingsState> {
        let state = self.find_and_load(start, build_path, scopes)?;

        let mut state = if self.use_empty_settings(start, &state) {
            info!(
                dir = %start.effective_project_dir().display(),
                settings = %state.settings().description(),
                "Project is not part of the loaded settings, using empty settings"
            );
            if let Err(e) = state.close() {
                warn!(error = %e, "Failed to close discarded settings");
            }

            let empty = start.use_empty_settings_variant();
            let mut state = self.find_and_load(&empty, build_path, scopes)?;
            if let Err(e) = rebind_build_file(&mut state, empty.build_file.as_deref()) {
                return Err(close_on_error(state, e.into()));
            }
            state
        } else {
            state
        };

        let selected = {
            let settings = state.settings();
            project_spec(start, settings.settings_dir())
                .select_project(&settings.description(), settings.registry())
                .map(|descriptor| descriptor.path().clone())
        };
        let result = selected
            .map_err(SettingsError::from)
            .and_then(|path| state.settings_mut().set_default_project(path));
        if let Err(e) = result {
            return Err(close_on_error(state, e.into()));
        }

        Ok(state)
    }

    fn find_and_load(
        &self,
        start: &StartParameter,
        build_path: &ProjectPath,
        scopes: &ClassLoaderScopeRegistry,
    ) -> Result<SettingsState> {
        let location = self.finder.find(start)?;
        let base_scope = self
            .build_src
            .build_and_create_scope(start, &location, scopes.core_and_plugins_scope())?;

        self.pipeline.process(&SettingsRequest {
            location: &location,
            start_parameter: start,
            base_scope: &base_scope,
            build_path,
        })
    }

    fn use_empty_settings(&self, start: &StartParameter, state: &SettingsState) -> bool {
        if start.settings_file.is_some() || start.use_empty_settings {
            return false;
        }
        let settings = state.settings();
        !project_spec(start, settings.settings_dir()).contains_project(settings.registry())
    }
}

fn project_spec(start: &StartParameter, settings_dir: &Path) -> Box<dyn ProjectSpec> {
    spec::for_selection(
        start.build_file.as_deref(),
        start.project_dir.as_deref(),
        &start.current_dir,
        settings_dir,
    )
}

/// Points the root project at an explicitly named build file
fn rebind_build_file(state: &mut SettingsState, build_file: Option<&Path>) -> Result<(), SettingsError> {
    let Some(name) = build_file.and_then(|f| f.file_name()).and_then(|n| n.to_str()) else {
        return Ok(());
    };
    state.settings_mut().set_build_file_name(":", name)
}

fn close_on_error(state: SettingsState, error: anyhow::Error) -> anyhow::Error {
    if let Err(e) = state.close() {
        warn!(error = %e, "Failed to close settings");
    }
    error
}
