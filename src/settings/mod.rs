//! # Settings
//!
//! Locating, evaluating and post-processing the settings of a build.
//!
//! ## Loading Flow
//!
//! ```text
//! StartParameter
//!   → SettingsLocationFinder     settings dir + optional settings.toml
//!   → BuildSrcBuilder            buildSrc scope below core-and-plugins
//!   → SettingsPipeline           middleware around script evaluation
//!   → ProjectSpec selection      default project, empty-settings retry
//!   → SettingsState
//! ```
//!
//! ## Files
//!
//! | File | Format | Location |
//! |------|--------|----------|
//! | Settings | TOML | `settings.toml` in the root directory or a parent |
//! | Properties | TOML | `properties.toml` in the settings dir and user config dir |
//! | Config | TOML | `~/.config/buildinit/config.toml` |
//!
//! ## Key Types
//!
//! - [`Settings`] - Facade over the descriptor registry used by scripts
//! - [`SettingsState`] - Settings plus their closeable services
//! - [`SettingsLoader`] - Full loading flow for one build
//! - [`StartParameter`] - What a build was started with

mod build_src;
mod config;
mod loader;
mod location;
mod pipeline;
mod properties;
mod script;
#[allow(clippy::module_inception)]
mod settings;
mod start;

pub use build_src::{BuildSrcBuilder, DirectoryBuildSrc, BUILD_SRC_DIR};
pub use config::{
    apply_build_options, register_build_options, BuildConfig, BuildOption, ConfigError,
    LoggingSection,
};
pub use loader::SettingsLoader;
pub use location::{SettingsLocation, SettingsLocationFinder, UpwardSettingsFinder};
pub use pipeline::{
    BuildKind, CommandLineIncludedBuilds, IncludedBuildRegistration, ProgressMiddleware,
    ScriptEvaluatingProcessor, SettingsMiddleware, SettingsPipeline, SettingsRequest,
};
pub use properties::{read_properties_file, BuildProperties, PropertiesLoader, TomlPropertiesLoader};
pub use script::{ScriptEvaluator, ScriptSource, TomlSettingsScript};
pub use settings::{IncludedBuild, Settings, SettingsError, SettingsState};
pub use start::{FileNames, StartParameter, DEFAULT_PROPERTIES_FILE_NAME, DEFAULT_SETTINGS_FILE_NAME};
