//! `settings` command

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use super::output::{Output, TextReport, TextWriter};
use super::session::BuildSession;
use crate::domain::ProjectPath;
use crate::settings::{BuildProperties, IncludedBuild};

#[derive(Debug, Serialize)]
struct SettingsReport {
    description: String,
    settings_dir: PathBuf,
    settings_file: Option<PathBuf>,
    root_project: String,
    projects: usize,
    default_project: Option<ProjectPath>,
    class_loader_scope: String,
    properties: BuildProperties,
    included_builds: Vec<IncludedBuild>,
}

pub fn run(session: &BuildSession, output: &Output) -> Result<()> {
    let report = session.run_build(session.root_build(), |controller| {
        controller.loaded_settings()?;
        let state = controller
            .model()
            .settings_state()
            .ok_or_else(|| anyhow::anyhow!("Settings have not been loaded"))?;
        let settings = state.settings();
        Ok(SettingsReport {
            description: settings.description(),
            settings_dir: settings.settings_dir().to_path_buf(),
            settings_file: settings.settings_script().map(PathBuf::from),
            root_project: settings.root_project()?.name().to_string(),
            projects: settings.registry().len(),
            default_project: settings.default_project().cloned(),
            class_loader_scope: settings.class_loader_scope().id().to_string(),
            properties: settings.properties().clone(),
            included_builds: state.included_builds().to_vec(),
        })
    })?;

    output.report(&report)
}

impl TextReport for SettingsReport {
    fn write_text(&self, out: &mut TextWriter<'_>) -> io::Result<()> {
        out.field("Settings", &self.description)?;
        out.field("Settings dir", self.settings_dir.display())?;
        out.field("Root project", &self.root_project)?;
        out.field("Projects", self.projects)?;
        if let Some(default) = &self.default_project {
            out.field("Default project", default)?;
        }
        out.field("Scope", &self.class_loader_scope)?;

        out.section(
            "Properties",
            self.properties.iter().map(|(key, value)| format!("{} = {}", key, value)),
        )?;
        out.section(
            "Included builds",
            self.included_builds
                .iter()
                .map(|build| format!("{} ({})", build.build_path, build.root_dir.display())),
        )
    }
}
