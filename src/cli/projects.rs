//! `projects` command

use std::io;

use anyhow::{Context, Result};
use serde::Serialize;

use super::output::{Output, TextReport, TextWriter};
use super::session::BuildSession;
use crate::build::BuildModel;
use crate::domain::{ProjectPath, ProjectSnapshot};
use crate::settings::IncludedBuild;

#[derive(Debug, Serialize)]
struct BuildReport {
    build_path: ProjectPath,
    default_project: ProjectPath,
    from_cache: bool,
    root: ProjectSnapshot,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    included_builds: Vec<BuildReport>,
}

fn report(model: &BuildModel, from_cache: bool) -> Result<BuildReport> {
    let projects = model.projects().context("Build has no projects")?;
    Ok(BuildReport {
        build_path: model.build_path().clone(),
        default_project: projects.default_project().path().clone(),
        from_cache,
        root: projects.snapshot(),
        included_builds: Vec::new(),
    })
}

/// Configures the root build, then every build it includes
pub fn run(session: &BuildSession, output: &Output) -> Result<()> {
    let (mut root, included) = session.run_build(session.root_build(), |controller| {
        controller.configured_build()?;
        let model = controller.model();
        let included: Vec<IncludedBuild> = model
            .settings_state()
            .map(|state| state.included_builds().to_vec())
            .unwrap_or_default();
        Ok((report(model, controller.loaded_from_cache())?, included))
    })?;

    for build in &included {
        let nested = session.run_build(session.nested_build(build), |controller| {
            let model = controller.configured_build()?;
            report(model, false)
        })?;
        root.included_builds.push(nested);
    }

    output.report(&root)
}

impl TextReport for BuildReport {
    fn write_text(&self, out: &mut TextWriter<'_>) -> io::Result<()> {
        if self.build_path.is_root() {
            out.line(format_args!("Root project '{}'", self.root.name))?;
        } else {
            out.line(format_args!(
                "Included build '{}' ({})",
                self.build_path,
                self.root.project_dir.display()
            ))?;
        }
        write_children(out, &self.root, "")?;
        out.line(format_args!("Default project: {}", self.default_project))?;

        for nested in &self.included_builds {
            out.blank()?;
            nested.write_text(out)?;
        }
        Ok(())
    }
}

fn write_children(out: &mut TextWriter<'_>, project: &ProjectSnapshot, prefix: &str) -> io::Result<()> {
    let count = project.children.len();
    for (i, child) in project.children.iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "\\---" } else { "+---" };
        out.line(format_args!("{}{} Project '{}'", prefix, branch, child.path))?;
        let nested = format!("{}{}", prefix, if last { "     " } else { "|    " });
        write_children(out, child, &nested)?;
    }
    Ok(())
}
