//! Build properties
//!
//! Properties come from four layers, later layers winning:
//!
//! | Layer | Source |
//! |-------|--------|
//! | Defaults | Built into the loader |
//! | Project | `<settings dir>/properties.toml` |
//! | User | `<user config dir>/properties.toml` |
//! | Overrides | `-P key=value` on the command line |
//!
//! Nested TOML tables flatten to dotted keys (`[buildinit] offline = true`
//! becomes `buildinit.offline`). Non-string values are stringified.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use super::start::StartParameter;

/// Flat string properties of a build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BuildProperties {
    values: BTreeMap<String, String>,
}

impl BuildProperties {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Overlays `other`, its values winning
    pub fn merge(&mut self, other: BuildProperties) {
        self.values.extend(other.values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BuildProperties {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Loads the properties of a build whose settings live in `settings_dir`
pub trait PropertiesLoader: Send + Sync {
    fn load_properties(&self, settings_dir: &Path, start: &StartParameter) -> Result<BuildProperties>;
}

/// Reads `properties.toml` files
#[derive(Debug, Clone, Default)]
pub struct TomlPropertiesLoader {
    defaults: BuildProperties,
    user_dir: Option<PathBuf>,
}

impl TomlPropertiesLoader {
    pub fn new(user_dir: Option<PathBuf>) -> Self {
        Self {
            defaults: BuildProperties::default(),
            user_dir,
        }
    }

    pub fn with_defaults(mut self, defaults: BuildProperties) -> Self {
        self.defaults = defaults;
        self
    }
}

impl PropertiesLoader for TomlPropertiesLoader {
    fn load_properties(&self, settings_dir: &Path, start: &StartParameter) -> Result<BuildProperties> {
        let file_name = &start.file_names.properties;

        let mut properties = self.defaults.clone();
        properties.merge(read_properties_file(&settings_dir.join(file_name))?);
        if let Some(user_dir) = &self.user_dir {
            properties.merge(read_properties_file(&user_dir.join(file_name))?);
        }
        properties.merge(start.project_properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect());

        debug!(dir = %settings_dir.display(), count = properties.len(), "Loaded build properties");
        Ok(properties)
    }
}

/// Reads one properties file; a missing file has no properties
pub fn read_properties_file(path: &Path) -> Result<BuildProperties> {
    if !path.is_file() {
        return Ok(BuildProperties::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read properties: {}", path.display()))?;
    let table: toml::Table = toml::from_str(&content)
        .with_context(|| format!("Failed to parse properties: {}", path.display()))?;

    let mut properties = BuildProperties::default();
    flatten("", &table, &mut properties);
    Ok(properties)
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut BuildProperties) {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            toml::Value::Table(nested) => flatten(&key, nested, out),
            toml::Value::String(s) => out.insert(key, s.clone()),
            other => out.insert(key, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn flattens_tables_and_stringifies() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("properties.toml");
        fs::write(
            &file,
            r#"
version = "1.2"
workers = 4

[buildinit]
offline = true
"#,
        )
        .unwrap();

        let properties = read_properties_file(&file).unwrap();
        assert_eq!(properties.get("version"), Some("1.2"));
        assert_eq!(properties.get("workers"), Some("4"));
        assert_eq!(properties.get("buildinit.offline"), Some("true"));
    }

    #[test]
    fn layers_override_in_order() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(project.path().join("properties.toml"), "a = \"project\"\nb = \"project\"\nc = \"project\"\n").unwrap();
        fs::write(user.path().join("properties.toml"), "b = \"user\"\nc = \"user\"\n").unwrap();

        let loader = TomlPropertiesLoader::new(Some(user.path().to_path_buf()))
            .with_defaults([("a", "default"), ("d", "default")].into_iter().collect());
        let start = StartParameter::new(project.path()).with_property("c", "override");

        let properties = loader.load_properties(project.path(), &start).unwrap();
        assert_eq!(properties.get("a"), Some("project"));
        assert_eq!(properties.get("b"), Some("user"));
        assert_eq!(properties.get("c"), Some("override"));
        assert_eq!(properties.get("d"), Some("default"));
    }

    #[test]
    fn missing_files_are_empty() {
        let dir = TempDir::new().unwrap();
        let start = StartParameter::new(dir.path());
        let properties = TomlPropertiesLoader::new(None).load_properties(dir.path(), &start).unwrap();
        assert!(properties.is_empty());
    }

    #[test]
    fn malformed_file_names_the_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("properties.toml");
        fs::write(&file, "not toml [").unwrap();
        let err = read_properties_file(&file).unwrap_err();
        assert!(format!("{:#}", err).contains("properties.toml"));
    }
}
