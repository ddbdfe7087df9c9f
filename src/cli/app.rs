//! Main CLI application structure

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;

use super::output::{Output, OutputFormat};
use super::session::BuildSession;
use super::{cache_cmd, projects, run_cmd, settings_cmd};
use crate::logging::{init_logging, LoggingConfig};
use crate::settings::{
    apply_build_options, register_build_options, BuildConfig, PropertiesLoader,
    SettingsLocationFinder, StartParameter, TomlPropertiesLoader, UpwardSettingsFinder,
};

#[derive(Parser)]
#[command(name = "buildinit")]
#[command(author, version, about = "Loads build settings, project trees and task graphs")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Increase log verbosity (repeatable)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Use this configuration file instead of the user-wide one
    #[arg(long, global = true, env = "BUILDINIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub build: BuildArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options selecting and configuring the build
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Directory of the project to build
    #[arg(long, short = 'p', global = true)]
    pub project_dir: Option<PathBuf>,

    /// Build file of the project to build
    #[arg(long, short = 'b', global = true)]
    pub build_file: Option<PathBuf>,

    /// Settings file to use instead of searching for one
    #[arg(long, short = 'c', global = true)]
    pub settings_file: Option<PathBuf>,

    /// Set a project property
    #[arg(short = 'P', global = true, value_name = "KEY=VALUE", value_parser = parse_property)]
    pub properties: Vec<(String, String)>,

    /// Include another build in this one
    #[arg(long, global = true, value_name = "DIR")]
    pub include_build: Vec<PathBuf>,

    /// Do not search parent directories for a settings file
    #[arg(long, global = true)]
    pub no_search_upward: bool,

    /// Work without network access
    #[arg(long, global = true)]
    pub offline: bool,

    /// Reuse the configuration of a previous identical run
    #[arg(long, global = true)]
    pub configuration_cache: bool,
}

impl BuildArgs {
    /// Start parameter for a build started in `current_dir`
    ///
    /// Command line switches win over build options set in properties, which
    /// win over the configuration file.
    pub fn start_parameter(
        &self,
        config: &BuildConfig,
        current_dir: &Path,
        properties: &dyn PropertiesLoader,
    ) -> Result<StartParameter> {
        let mut start = config.start_parameter(current_dir);
        if let Some(dir) = &self.project_dir {
            start = start.with_project_dir(dir);
        }
        if let Some(file) = &self.build_file {
            start = start.with_build_file(file);
        }
        if let Some(file) = &self.settings_file {
            start = start.with_settings_file(file);
        }
        for (key, value) in &self.properties {
            start = start.with_property(key, value);
        }
        for dir in &self.include_build {
            start = start.with_included_build(dir);
        }
        if self.no_search_upward {
            start.search_upwards = false;
        }

        let location = UpwardSettingsFinder.find(&start)?;
        let loaded = properties
            .load_properties(&location.settings_dir, &start)
            .context("Failed to read build options")?;
        let applied = apply_build_options(register_build_options(), &loaded, &mut start)?;
        if !applied.is_empty() {
            debug!(options = ?applied, "Applied build options from properties");
        }

        if self.no_search_upward {
            start.search_upwards = false;
        }
        if self.offline {
            start.offline = true;
        }
        if self.configuration_cache {
            start.configuration_cache = true;
        }
        Ok(start)
    }
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the project tree of the build and its included builds
    Projects,

    /// Show where the settings came from and what they contain
    Settings,

    /// Calculate the task graph and run it without task actions
    Run {
        /// Tasks to run; unqualified names apply to the default project and
        /// its subprojects
        #[arg(required = true)]
        tasks: Vec<String>,
    },

    /// Manage the configuration cache
    #[command(subcommand)]
    Cache(cache_cmd::CacheCommands),
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BuildConfig::load_from(path)?,
        None => BuildConfig::load()?,
    };
    init_logging(LoggingConfig::from_section(&config.logging, cli.verbose));

    let output = Output::new(cli.format);
    let current_dir = env::current_dir().context("Failed to determine the current directory")?;
    let properties = TomlPropertiesLoader::new(BuildConfig::global_config_dir());
    let start = cli.build.start_parameter(&config, &current_dir, &properties)?;
    debug!(dir = %start.effective_project_dir().display(), "Starting buildinit");

    let session = BuildSession::new(start, properties);
    match cli.command {
        Commands::Projects => projects::run(&session, &output)?,
        Commands::Settings => settings_cmd::run(&session, &output)?,
        Commands::Run { tasks } => run_cmd::run(&session, &output, tasks)?,
        Commands::Cache(cmd) => cache_cmd::run(cmd, &session, &output)?,
    }

    debug!("Command completed successfully");
    Ok(())
}
