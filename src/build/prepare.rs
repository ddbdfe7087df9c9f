//! Default settings and project preparation

use std::sync::Arc;

use anyhow::{Context, Result};

use super::controller::{ProjectsPreparer, SettingsPreparer};
use super::loader::BuildLoader;
use super::model::BuildModel;
use super::progress::{BuildProgressEvent, ProgressListener};
use crate::scope::ClassLoaderScopeRegistry;
use crate::settings::SettingsLoader;

/// Loads settings through a [`SettingsLoader`]
pub struct DefaultSettingsPreparer {
    loader: SettingsLoader,
    scopes: Arc<ClassLoaderScopeRegistry>,
}

impl DefaultSettingsPreparer {
    pub fn new(loader: SettingsLoader, scopes: Arc<ClassLoaderScopeRegistry>) -> Self {
        Self { loader, scopes }
    }
}

impl SettingsPreparer for DefaultSettingsPreparer {
    fn prepare_settings(&self, model: &mut BuildModel) -> Result<()> {
        let state = self
            .loader
            .load(model.start_parameter(), model.build_path(), &self.scopes)?;
        model.set_settings(state);
        Ok(())
    }
}

/// Builds the project tree with a [`BuildLoader`]
pub struct DefaultProjectsPreparer {
    loader: BuildLoader,
    progress: Arc<dyn ProgressListener>,
}

impl DefaultProjectsPreparer {
    pub fn new(loader: BuildLoader, progress: Arc<dyn ProgressListener>) -> Self {
        Self { loader, progress }
    }
}

impl ProjectsPreparer for DefaultProjectsPreparer {
    fn prepare_projects(&self, model: &mut BuildModel) -> Result<()> {
        let settings = model.settings().context("Settings must be loaded before projects")?;
        let tree = self
            .loader
            .load(settings, settings.class_loader_scope(), model.build_path())?;

        self.progress.on_event(&BuildProgressEvent::ProjectsLoaded {
            build_path: model.build_path().clone(),
            root_project: tree.snapshot(),
        });
        model.set_projects(tree);
        Ok(())
    }
}
