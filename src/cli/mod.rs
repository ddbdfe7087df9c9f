//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose | Stages run |
//! |---------|---------|------------|
//! | `projects` | Project tree of the build and its included builds | up to `Configure` |
//! | `settings` | Settings location, properties, included builds | `LoadSettings` |
//! | `run <tasks..>` | Task graph, run without task actions | up to `RunTasks` |
//! | `cache clear`, `cache status` | Configuration cache maintenance | none |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Each `-v` raises the log level by one step; logs go to stderr:
//! ```bash
//! buildinit -vv projects
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod cache_cmd;
mod output;
mod projects;
mod run_cmd;
mod session;
mod settings_cmd;

pub use app::{run, BuildArgs, Cli, Commands};
pub use output::{Output, OutputFormat, TextReport, TextWriter};
pub use session::BuildSession;
