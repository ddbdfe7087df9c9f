//! Hierarchical project paths
//!
//! Path Format:
//! - Root: `:`
//! - Child of root: `:app`
//! - Nested: `:libs:core`
//!
//! Relative paths (`libs:core`) are resolved against a base path with
//! [`ProjectPath::resolve`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PathError {
    #[error("Invalid project path '{0}': segments must not be empty")]
    EmptySegment(String),

    #[error("Invalid project name '{0}': must not be empty or contain ':', '/' or '\\'")]
    InvalidName(String),

    #[error("Project path must be absolute, got '{0}'")]
    NotAbsolute(String),
}

/// Separator between path segments
pub const SEPARATOR: char = ':';

/// Validates a single project name
pub fn validate_name(name: &str) -> Result<(), PathError> {
    if name.is_empty() || name.contains([SEPARATOR, '/', '\\']) {
        return Err(PathError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Absolute, colon-separated project path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectPath {
    segments: Vec<String>,
}

impl ProjectPath {
    /// The root path `:`
    pub fn root() -> Self {
        Self { segments: vec![] }
    }

    /// Returns true for the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the path of a direct child with the given name
    pub fn child(&self, name: &str) -> Result<Self, PathError> {
        validate_name(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self { segments })
    }

    /// Returns the parent path, or None for the root
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Returns the last segment, or None for the root
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments below the root
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if `other` is a strict descendant of this path
    pub fn is_ancestor_of(&self, other: &ProjectPath) -> bool {
        other.segments.len() > self.segments.len() && other.segments.starts_with(&self.segments)
    }

    /// Resolves a path against this one
    ///
    /// Absolute input (`:a:b`) is returned as-is; relative input (`a:b`) is
    /// appended to `self`.
    pub fn resolve(&self, path: &str) -> Result<Self, PathError> {
        let path = path.trim();
        if path.starts_with(SEPARATOR) {
            return path.parse();
        }
        let mut resolved = self.clone();
        for segment in path.split(SEPARATOR) {
            if segment.is_empty() {
                return Err(PathError::EmptySegment(path.to_string()));
            }
            resolved = resolved.child(segment)?;
        }
        Ok(resolved)
    }

    /// Prefixes this project path with a build path, for identity paths of
    /// projects in nested builds
    pub fn append(&self, other: &ProjectPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Iterates from the parent up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = ProjectPath> + '_ {
        (0..self.segments.len()).rev().map(move |len| Self {
            segments: self.segments[..len].to_vec(),
        })
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "{}", SEPARATOR);
        }
        for segment in &self.segments {
            write!(f, "{}{}", SEPARATOR, segment)?;
        }
        Ok(())
    }
}

impl FromStr for ProjectPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let rest = s
            .strip_prefix(SEPARATOR)
            .ok_or_else(|| PathError::NotAbsolute(s.to_string()))?;

        if rest.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in rest.split(SEPARATOR) {
            if segment.is_empty() {
                return Err(PathError::EmptySegment(s.to_string()));
            }
            validate_name(segment)?;
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }
}

impl TryFrom<String> for ProjectPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectPath> for String {
    fn from(path: ProjectPath) -> Self {
        path.to_string()
    }
}
