//! Configuration handling for buildinit
//!
//! User-wide defaults live in `~/.config/buildinit/config.toml` (platform
//! equivalent via `directories`). Build options are read from the build's
//! properties and applied on top of the command line.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::properties::BuildProperties;
use super::start::{FileNames, StartParameter, DEFAULT_PROPERTIES_FILE_NAME, DEFAULT_SETTINGS_FILE_NAME};
use crate::domain::DEFAULT_BUILD_FILE_NAME;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Value '{value}' given for {property} is invalid (must be true or false)")]
    InvalidOption { property: String, value: String },
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    /// Default level when neither `RUST_LOG` nor `--verbose` is set
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    /// Look for the settings file in parent directories
    pub search_upwards: bool,

    pub settings_file_name: String,

    pub build_file_name: String,

    pub properties_file_name: String,

    pub logging: LoggingSection,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            search_upwards: true,
            settings_file_name: DEFAULT_SETTINGS_FILE_NAME.to_string(),
            build_file_name: DEFAULT_BUILD_FILE_NAME.to_string(),
            properties_file_name: DEFAULT_PROPERTIES_FILE_NAME.to_string(),
            logging: LoggingSection::default(),
        }
    }
}

impl BuildConfig {
    /// Loads configuration from the default location
    pub fn load() -> Result<Self> {
        match Self::global_config_dir() {
            Some(dir) => Self::load_from(&dir.join("config.toml")),
            None => Ok(Self::default()),
        }
    }

    /// Loads configuration from a file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "buildinit", "buildinit").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn file_names(&self) -> FileNames {
        FileNames {
            settings: self.settings_file_name.clone(),
            build: self.build_file_name.clone(),
            properties: self.properties_file_name.clone(),
        }
    }

    /// Start parameter carrying this configuration's defaults
    pub fn start_parameter(&self, current_dir: &Path) -> StartParameter {
        let mut start = StartParameter::new(current_dir);
        start.search_upwards = self.search_upwards;
        start.file_names = self.file_names();
        start
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("settings_file_name", &self.settings_file_name),
            ("build_file_name", &self.build_file_name),
            ("properties_file_name", &self.properties_file_name),
        ] {
            if value.is_empty() || value.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a plain file name, got '{}'",
                    key, value
                )));
            }
        }
        Ok(())
    }
}

/// A boolean switch that can be set through a build property
#[derive(Debug, Clone, Copy)]
pub struct BuildOption {
    pub property: &'static str,
    pub description: &'static str,
    apply: fn(&mut StartParameter, bool),
}

impl BuildOption {
    pub fn apply(&self, start: &mut StartParameter, value: bool) {
        (self.apply)(start, value)
    }
}

/// Every build option known to this tool
pub fn register_build_options() -> &'static [BuildOption] {
    const OPTIONS: &[BuildOption] = &[
        BuildOption {
            property: "buildinit.offline",
            description: "Work without access to network resources",
            apply: set_offline,
        },
        BuildOption {
            property: "buildinit.dry-run",
            description: "Schedule tasks without running their actions",
            apply: set_dry_run,
        },
        BuildOption {
            property: "buildinit.search-upwards",
            description: "Search parent directories for the settings file",
            apply: set_search_upwards,
        },
        BuildOption {
            property: "buildinit.configuration-cache",
            description: "Reuse the configured project tree and task graph across runs",
            apply: set_configuration_cache,
        },
    ];
    OPTIONS
}

fn set_offline(start: &mut StartParameter, value: bool) {
    start.offline = value;
}

fn set_dry_run(start: &mut StartParameter, value: bool) {
    start.dry_run = value;
}

fn set_search_upwards(start: &mut StartParameter, value: bool) {
    start.search_upwards = value;
}

fn set_configuration_cache(start: &mut StartParameter, value: bool) {
    start.configuration_cache = value;
}

/// Applies every option set in `properties`, returning the applied property
/// names
pub fn apply_build_options(
    options: &[BuildOption],
    properties: &BuildProperties,
    start: &mut StartParameter,
) -> Result<Vec<&'static str>, ConfigError> {
    let mut applied = Vec::new();
    for option in options {
        let Some(raw) = properties.get(option.property) else {
            continue;
        };
        let value = match raw.trim().to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => {
                return Err(ConfigError::InvalidOption {
                    property: option.property.to_string(),
                    value: raw.to_string(),
                })
            }
        };
        option.apply(start, value);
        applied.push(option.property);
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = BuildConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, BuildConfig::default());
        assert_eq!(config.settings_file_name, "settings.toml");
    }

    #[test]
    fn parse_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
search_upwards = false
build_file_name = "project.toml"

[logging]
level = "debug"
json = true
"#,
        )
        .unwrap();

        let config = BuildConfig::load_from(&path).unwrap();
        assert!(!config.search_upwards);
        assert_eq!(config.build_file_name, "project.toml");
        assert_eq!(config.settings_file_name, "settings.toml");
        assert!(config.logging.json);

        let start = config.start_parameter(Path::new("/w"));
        assert!(!start.search_upwards);
        assert_eq!(start.file_names.build, "project.toml");
    }

    #[test]
    fn rejects_path_like_file_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "settings_file_name = \"conf/settings.toml\"\n").unwrap();
        assert!(BuildConfig::load_from(&path).is_err());
    }

    #[test]
    fn options_apply_from_properties() {
        let mut properties = BuildProperties::default();
        properties.insert("buildinit.offline", "true");
        properties.insert("buildinit.search-upwards", "FALSE");
        properties.insert("unrelated", "x");

        let mut start = StartParameter::new(Path::new("/w"));
        let applied = apply_build_options(register_build_options(), &properties, &mut start).unwrap();

        assert_eq!(applied, vec!["buildinit.offline", "buildinit.search-upwards"]);
        assert!(start.offline);
        assert!(!start.search_upwards);
        assert!(!start.dry_run);
    }

    #[test]
    fn malformed_option_value_is_rejected() {
        let mut properties = BuildProperties::default();
        properties.insert("buildinit.dry-run", "yes");

        let mut start = StartParameter::new(Path::new("/w"));
        let err = apply_build_options(register_build_options(), &properties, &mut start).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Value 'yes' given for buildinit.dry-run is invalid (must be true or false)"
        );
    }
}
