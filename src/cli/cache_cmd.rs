//! Configuration cache commands

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use super::output::{Output, TextReport, TextWriter};
use super::session::BuildSession;
use crate::build::CacheStore;
use crate::settings::{SettingsLocationFinder, UpwardSettingsFinder};

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Remove every stored configuration of this build
    Clear,

    /// Show cache location and entry count
    Status,
}

#[derive(Debug, Serialize)]
struct ClearReport {
    path: PathBuf,
    removed: usize,
}

impl TextReport for ClearReport {
    fn write_text(&self, out: &mut TextWriter<'_>) -> io::Result<()> {
        out.line(format_args!("Removed {} configuration cache entries", self.removed))
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    path: PathBuf,
    entries: usize,
}

impl TextReport for StatusReport {
    fn write_text(&self, out: &mut TextWriter<'_>) -> io::Result<()> {
        out.field("Path", self.path.display())?;
        out.field("Entries", self.entries)
    }
}

pub fn run(cmd: CacheCommands, session: &BuildSession, output: &Output) -> Result<()> {
    let location = UpwardSettingsFinder.find(session.start())?;
    let store = CacheStore::open(&location.settings_dir)?;
    let path = store.path().to_path_buf();

    match cmd {
        CacheCommands::Clear => output.report(&ClearReport {
            path,
            removed: store.clear()?,
        }),
        CacheCommands::Status => output.report(&StatusReport {
            path,
            entries: store.len()?,
        }),
    }
}
