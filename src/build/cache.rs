//! Configuration cache
//!
//! A configured build (project tree, default project, task graph) is stored
//! after its task graph is calculated. A later build with the same inputs
//! skips settings evaluation and configuration and jumps to the task graph.
//!
//! Entries live in `<settings dir>/.buildinit/cache.db` and are keyed by a
//! blake3 fingerprint of:
//!
//! - the settings file contents
//! - the requested task names
//! - the project directory, build file and included builds
//! - the `-P` property overrides
//!
//! An entry also records where the settings were actually loaded from. A
//! project outside the settings it was started under is configured with
//! empty settings in its own directory, and a cache hit restores exactly that.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::loader::BuildLoader;
use super::model::{BuildModel, TaskGraph};
use super::services::ServiceScope;
use crate::domain::{ProjectPath, ProjectSnapshot};
use crate::scope::ClassLoaderScopeRegistry;
use crate::settings::{
    IncludedBuild, PropertiesLoader, Settings, SettingsLocation, SettingsLocationFinder, SettingsState,
    StartParameter,
};

pub const CACHE_DIR: &str = ".buildinit";
const CACHE_FILE: &str = "cache.db";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("No configuration cache entry for {0}")]
    Missing(String),

    #[error("Cannot store a build that has not been configured")]
    NotConfigured,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Hooks the lifecycle controller uses to skip configuration
pub trait ConfigurationCache: Send + Sync {
    /// True when a stored configuration matches this build
    fn can_load(&self, model: &BuildModel) -> bool;

    /// Restores settings, projects and the task graph into `model`
    fn load(&self, model: &mut BuildModel) -> Result<()>;

    /// Called before configuring when nothing could be loaded
    fn prepare_for_configuration(&self, model: &mut BuildModel) -> Result<()>;

    /// Stores the configured build
    fn save(&self, model: &BuildModel) -> Result<()>;
}

/// Cache that never loads and never stores
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledConfigurationCache;

impl ConfigurationCache for DisabledConfigurationCache {
    fn can_load(&self, _model: &BuildModel) -> bool {
        false
    }

    fn load(&self, _model: &mut BuildModel) -> Result<()> {
        Err(CacheError::Missing("a disabled cache".to_string()).into())
    }

    fn prepare_for_configuration(&self, _model: &mut BuildModel) -> Result<()> {
        Ok(())
    }

    fn save(&self, _model: &BuildModel) -> Result<()> {
        Ok(())
    }
}

/// A stored configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Settings the configuration was loaded from
    pub settings: SettingsLocation,
    /// True when the build fell back to empty settings
    pub empty_settings: bool,
    /// Directories requested with `include_build`
    pub included_build_dirs: Vec<PathBuf>,
    pub included_builds: Vec<IncludedBuild>,
    pub root_project: ProjectSnapshot,
    pub default_project: ProjectPath,
    pub task_graph: TaskGraph,
    #[serde(skip, default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// SQLite table of cache entries
pub struct CacheStore {
    db_path: PathBuf,
    conn: Connection,
}

impl CacheStore {
    /// Schema version - bump when schema changes to force rebuild
    const SCHEMA_VERSION: i32 = 2;

    /// Creates or opens the cache of the build rooted at `root_dir`
    pub fn open(root_dir: &Path) -> Result<Self> {
        let cache_dir = root_dir.join(CACHE_DIR);
        fs::create_dir_all(&cache_dir).with_context(|| {
            format!("Failed to create cache directory: {}", cache_dir.display())
        })?;

        let db_path = cache_dir.join(CACHE_FILE);
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open cache database: {}", db_path.display()))?;

        let store = Self { db_path, conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn ensure_schema(&self) -> Result<(), CacheError> {
        if self.schema_version()? != Self::SCHEMA_VERSION {
            self.conn.execute_batch(
                "
                DROP TABLE IF EXISTS entries;
                CREATE TABLE entries (
                    fingerprint TEXT PRIMARY KEY,
                    payload TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                ",
            )?;
            self.conn
                .pragma_update(None, "user_version", Self::SCHEMA_VERSION)?;
        }
        Ok(())
    }

    fn schema_version(&self) -> Result<i32, CacheError> {
        let version: Option<i32> = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .optional()?;
        Ok(version.unwrap_or(0))
    }

    pub fn contains(&self, fingerprint: &str) -> Result<bool, CacheError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM entries WHERE fingerprint = ?1",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT payload, created_at FROM entries WHERE fingerprint = ?1",
                params![fingerprint],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((payload, created_at)) = row else {
            return Ok(None);
        };
        let mut entry: CacheEntry = serde_json::from_str(&payload)?;
        if let Ok(at) = DateTime::parse_from_rfc3339(&created_at) {
            entry.created_at = at.with_timezone(&Utc);
        }
        Ok(Some(entry))
    }

    pub fn put(&self, fingerprint: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let payload = serde_json::to_string(entry)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO entries (fingerprint, payload, created_at) VALUES (?1, ?2, ?3)",
            params![fingerprint, payload, entry.created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Removes every entry, returning how many there were
    pub fn clear(&self) -> Result<usize, CacheError> {
        Ok(self.conn.execute("DELETE FROM entries", [])?)
    }

    pub fn len(&self) -> Result<usize, CacheError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

/// Fingerprint of everything a stored configuration depends on
pub fn fingerprint(location: &SettingsLocation, start: &StartParameter, tasks: &[String]) -> Result<String> {
    let mut hasher = blake3::Hasher::new();

    match &location.settings_file {
        Some(file) => {
            let bytes = fs::read(file)
                .with_context(|| format!("Failed to read settings file: {}", file.display()))?;
            hasher.update(b"settings\0");
            hasher.update(&bytes);
        }
        None => {
            hasher.update(b"no-settings\0");
        }
    }

    let mut field = |tag: &str, value: &str| {
        hasher.update(tag.as_bytes());
        hasher.update(b"\0");
        hasher.update(value.as_bytes());
        hasher.update(b"\0");
    };
    for task in tasks {
        field("task", task);
    }
    field("project-dir", &start.effective_project_dir().to_string_lossy());
    if let Some(build_file) = &start.build_file {
        field("build-file", &build_file.to_string_lossy());
    }
    for dir in &start.included_builds {
        field("include-build", &dir.to_string_lossy());
    }
    for (key, value) in &start.project_properties {
        field("property", &format!("{}={}", key, value));
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Configuration cache backed by [`CacheStore`]
pub struct SqliteConfigurationCache {
    finder: Arc<dyn SettingsLocationFinder>,
    properties: Arc<dyn PropertiesLoader>,
    loader: BuildLoader,
    scopes: Arc<ClassLoaderScopeRegistry>,
}

impl SqliteConfigurationCache {
    pub fn new(
        finder: Arc<dyn SettingsLocationFinder>,
        properties: Arc<dyn PropertiesLoader>,
        loader: BuildLoader,
        scopes: Arc<ClassLoaderScopeRegistry>,
    ) -> Self {
        Self {
            finder,
            properties,
            loader,
            scopes,
        }
    }

    fn key(&self, model: &BuildModel) -> Result<(SettingsLocation, String)> {
        let location = self.finder.find(model.start_parameter())?;
        let key = fingerprint(&location, model.start_parameter(), model.requested_tasks())?;
        Ok((location, key))
    }

    fn lookup(&self, model: &BuildModel) -> Result<bool> {
        let (location, key) = self.key(model)?;
        let store = CacheStore::open(&location.settings_dir)?;
        Ok(store.contains(&key)?)
    }
}

impl ConfigurationCache for SqliteConfigurationCache {
    fn can_load(&self, model: &BuildModel) -> bool {
        if !model.start_parameter().configuration_cache {
            return false;
        }
        match self.lookup(model) {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Ignoring unreadable configuration cache");
                false
            }
        }
    }

    fn load(&self, model: &mut BuildModel) -> Result<()> {
        let (store_location, key) = self.key(model)?;
        let entry = CacheStore::open(&store_location.settings_dir)?
            .get(&key)?
            .ok_or_else(|| CacheError::Missing(store_location.description()))?;

        let start = if entry.empty_settings {
            model.start_parameter().use_empty_settings_variant()
        } else {
            model.start_parameter().clone()
        };
        let location = &entry.settings;
        let properties = self.properties.load_properties(&location.settings_dir, &start)?;
        let scope = self.scopes.core_and_plugins_scope().create_child("settings");
        scope.lock();

        let mut settings = Settings::from_snapshot(location, start, properties, scope, &entry.root_project)?;
        for dir in &entry.included_build_dirs {
            settings.include_build(dir);
        }
        settings.set_default_project(entry.default_project.clone())?;
        let tree = self
            .loader
            .load(&settings, settings.class_loader_scope(), model.build_path())?;

        debug!(
            key = %key,
            created_at = %entry.created_at,
            projects = tree.len(),
            "Loaded configuration from cache"
        );

        let services = ServiceScope::new(format!("settings of build '{}'", model.build_path()));
        let mut state = SettingsState::new(settings, services);
        state.set_included_builds(entry.included_builds);
        model.set_settings(state);
        model.set_projects(tree);
        model.set_task_graph(entry.task_graph);
        Ok(())
    }

    fn prepare_for_configuration(&self, model: &mut BuildModel) -> Result<()> {
        if model.start_parameter().configuration_cache {
            debug!(build = %model.build_path(), "Calculating task graph as no cached configuration is available");
        }
        Ok(())
    }

    fn save(&self, model: &BuildModel) -> Result<()> {
        if !model.start_parameter().configuration_cache {
            return Ok(());
        }
        let (Some(state), Some(projects), Some(task_graph)) =
            (model.settings_state(), model.projects(), model.task_graph())
        else {
            return Err(CacheError::NotConfigured.into());
        };
        let settings = state.settings();

        let (location, key) = self.key(model)?;
        let entry = CacheEntry {
            settings: SettingsLocation::new(
                settings.settings_dir(),
                settings.settings_script().map(PathBuf::from),
            ),
            empty_settings: settings.start_parameter().use_empty_settings,
            included_build_dirs: settings.included_builds().to_vec(),
            included_builds: state.included_builds().to_vec(),
            root_project: projects.snapshot(),
            default_project: projects.default_project().path().clone(),
            task_graph: task_graph.clone(),
            created_at: Utc::now(),
        };
        CacheStore::open(&location.settings_dir)?.put(&key, &entry)?;
        debug!(key = %key, "Stored configuration cache entry");
        Ok(())
    }
}
