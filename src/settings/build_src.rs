//! buildSrc class loader scope
//!
//! A `buildSrc` directory next to the settings holds build logic shared by
//! every project. Compiling it is out of scope here; classes already present
//! under `buildSrc/build/classes` are exported to the settings and projects.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use super::location::SettingsLocation;
use super::start::StartParameter;
use crate::scope::{ClassLoaderScope, ClassPath};

pub const BUILD_SRC_DIR: &str = "buildSrc";
const CLASSES_DIR: &str = "build/classes";

pub trait BuildSrcBuilder: Send + Sync {
    /// Creates the locked buildSrc scope below `parent`
    fn build_and_create_scope(
        &self,
        start: &StartParameter,
        location: &SettingsLocation,
        parent: &Arc<ClassLoaderScope>,
    ) -> Result<Arc<ClassLoaderScope>>;
}

/// Exports precompiled buildSrc classes when they exist
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryBuildSrc;

impl BuildSrcBuilder for DirectoryBuildSrc {
    fn build_and_create_scope(
        &self,
        _start: &StartParameter,
        location: &SettingsLocation,
        parent: &Arc<ClassLoaderScope>,
    ) -> Result<Arc<ClassLoaderScope>> {
        let scope = parent.create_child(BUILD_SRC_DIR);
        let classes = location.settings_dir.join(BUILD_SRC_DIR).join(CLASSES_DIR);

        if classes.is_dir() {
            debug!(classes = %classes.display(), "Exporting buildSrc classes");
            scope.export(&ClassPath::of([classes]))?;
        }

        scope.lock();
        Ok(scope)
    }
}
