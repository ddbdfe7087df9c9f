//! Class paths and class loaders
//!
//! A class path is an ordered list of directories. A class named
//! `com.acme.Plugin` is found in an entry as `com/acme/Plugin.class`.
//! Class files below an excluded directory are never found.
//! Loaders delegate parent-first and remember which loader defined a class.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

/// Ordered, duplicate-free list of class path entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassPath {
    entries: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    excluded: Vec<PathBuf>,
}

impl ClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut classpath = Self::new();
        for entry in entries {
            classpath.push(entry);
        }
        classpath
    }

    /// Appends an entry unless it is already present
    pub fn push(&mut self, entry: impl Into<PathBuf>) {
        let entry = entry.into();
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    /// Hides every class file below `dir`, typically a nested directory
    /// owned by another class path
    pub fn excluding(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if !self.excluded.contains(&dir) {
            self.excluded.push(dir);
        }
        self
    }

    /// Returns a class path with `other`'s entries appended
    pub fn plus(&self, other: &ClassPath) -> ClassPath {
        let mut combined = self.clone();
        for entry in &other.entries {
            combined.push(entry.clone());
        }
        for dir in &other.excluded {
            combined = combined.excluding(dir.clone());
        }
        combined
    }

    fn is_excluded(&self, file: &Path) -> bool {
        self.excluded.iter().any(|dir| file.starts_with(dir))
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Relative file for a class name, or None for malformed names
fn class_file(class_name: &str) -> Option<PathBuf> {
    if class_name.is_empty() || class_name.split('.').any(|s| s.is_empty() || s.contains(['/', '\\'])) {
        return None;
    }
    Some(PathBuf::from(format!("{}.class", class_name.replace('.', "/"))))
}

/// A class found by a loader
#[derive(Debug, Clone)]
pub struct LoadedClass {
    name: String,
    location: PathBuf,
    defined_by: Arc<ClassLoader>,
}

impl LoadedClass {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class file the class was loaded from
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn defined_by(&self) -> &Arc<ClassLoader> {
        &self.defined_by
    }

    pub fn is_defined_by(&self, loader: &Arc<ClassLoader>) -> bool {
        Arc::ptr_eq(&self.defined_by, loader)
    }
}

/// Loader over a class path, delegating to its parents first
pub struct ClassLoader {
    name: String,
    classpath: ClassPath,
    parents: Vec<Arc<ClassLoader>>,
}

impl ClassLoader {
    pub fn new(name: impl Into<String>, classpath: ClassPath, parents: Vec<Arc<ClassLoader>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            classpath,
            parents,
        })
    }

    /// Loader that finds nothing
    pub fn empty(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, ClassPath::new(), vec![])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classpath(&self) -> &ClassPath {
        &self.classpath
    }

    pub fn parents(&self) -> &[Arc<ClassLoader>] {
        &self.parents
    }

    /// Loads a class, asking every parent before this loader's own path
    pub fn load_class(self: &Arc<Self>, class_name: &str) -> Option<LoadedClass> {
        self.parents
            .iter()
            .find_map(|parent| parent.load_class(class_name))
            .or_else(|| self.find_class(class_name))
    }

    fn find_class(self: &Arc<Self>, class_name: &str) -> Option<LoadedClass> {
        let relative = class_file(class_name)?;
        self.classpath.entries().iter().find_map(|entry| {
            let location = entry.join(&relative);
            (location.is_file() && !self.classpath.is_excluded(&location)).then(|| LoadedClass {
                name: class_name.to_string(),
                location,
                defined_by: Arc::clone(self),
            })
        })
    }
}

impl fmt::Debug for ClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassLoader")
            .field("name", &self.name)
            .field("classpath", &self.classpath.entries)
            .field("parents", &self.parents.iter().map(|p| p.name.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_class(dir: &Path, class_name: &str) {
        let file = dir.join(class_file(class_name).unwrap());
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, b"\xca\xfe\xba\xbe").unwrap();
    }

    #[test]
    fn classpath_deduplicates() {
        let mut classpath = ClassPath::of(["/a", "/b"]);
        classpath.push("/a");
        assert_eq!(classpath.entries().len(), 2);

        let combined = classpath.plus(&ClassPath::of(["/b", "/c"]));
        assert_eq!(combined.entries(), &[PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")]);
    }

    #[test]
    fn finds_class_in_entry() {
        let dir = TempDir::new().unwrap();
        write_class(dir.path(), "com.acme.Plugin");

        let loader = ClassLoader::new("test", ClassPath::of([dir.path()]), vec![]);
        let class = loader.load_class("com.acme.Plugin").unwrap();
        assert!(class.is_defined_by(&loader));
        assert!(class.location().ends_with("com/acme/Plugin.class"));
        assert!(loader.load_class("com.acme.Missing").is_none());
    }

    #[test]
    fn excluded_directory_is_hidden() {
        let dir = TempDir::new().unwrap();
        write_class(dir.path(), "core.Api");
        write_class(dir.path(), "plugins.Lint");

        let classpath = ClassPath::of([dir.path()]).excluding(dir.path().join("plugins"));
        let loader = ClassLoader::new("test", classpath, vec![]);
        assert!(loader.load_class("core.Api").is_some());
        assert!(loader.load_class("plugins.Lint").is_none());
    }

    #[test]
    fn parent_first_delegation() {
        let parent_dir = TempDir::new().unwrap();
        let child_dir = TempDir::new().unwrap();
        write_class(parent_dir.path(), "a.Shared");
        write_class(child_dir.path(), "a.Shared");

        let parent = ClassLoader::new("parent", ClassPath::of([parent_dir.path()]), vec![]);
        let child = ClassLoader::new("child", ClassPath::of([child_dir.path()]), vec![Arc::clone(&parent)]);

        let class = child.load_class("a.Shared").unwrap();
        assert!(class.is_defined_by(&parent));
    }

    #[test]
    fn malformed_names_are_not_found() {
        assert!(class_file("").is_none());
        assert!(class_file("a..B").is_none());
        assert!(class_file("a/b.C").is_none());
    }
}
