//! `run` command

use std::io;

use anyhow::{Context, Result};
use serde::Serialize;

use super::output::{Output, TextReport, TextWriter};
use super::session::BuildSession;
use crate::build::TaskGraph;
use crate::domain::ProjectPath;

#[derive(Debug, Serialize)]
struct RunReport {
    build_path: ProjectPath,
    from_cache: bool,
    tasks: TaskGraph,
}

pub fn run(session: &BuildSession, output: &Output, tasks: Vec<String>) -> Result<()> {
    let report = session.run_build(session.root_build(), |controller| {
        controller.schedule_tasks(tasks)?;
        controller.execute_tasks()?;

        let model = controller.model();
        Ok(RunReport {
            build_path: model.build_path().clone(),
            from_cache: controller.loaded_from_cache(),
            tasks: model.task_graph().cloned().context("Build has no task graph")?,
        })
    })?;

    output.report(&report)
}

impl TextReport for RunReport {
    fn write_text(&self, out: &mut TextWriter<'_>) -> io::Result<()> {
        if self.from_cache {
            out.line("Reusing configuration cache.")?;
        }
        for task in self.tasks.tasks() {
            out.line(format_args!("> Task {} SKIPPED", task))?;
        }
        out.blank()?;
        out.line(format_args!("BUILD SUCCESSFUL ({} task(s) scheduled)", self.tasks.len()))
    }
}
