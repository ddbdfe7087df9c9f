//! # Class Loader Scopes
//!
//! Isolation of plugin and build logic code per settings and per project.
//!
//! ## Scope Tree
//!
//! ```text
//! core                        (root, core API)
//! core-and-plugins            (root, core API + built-in plugins)
//! └── buildSrc
//!     └── settings
//!         └── project(:)
//!             ├── project(:a)
//!             └── project(:b)
//! ```
//!
//! A scope's code sees its parent's exported classes, its own local classes
//! and its own exported classes. Children never see a parent's local classes.
//!
//! ## Key Types
//!
//! - [`ClassLoaderScopeRegistry`] - Owns the two root scopes of a process
//! - [`ClassLoaderScope`] - One node of the tree
//! - [`ClassPath`] / [`ClassLoader`] - Directory class paths and loaders

mod classpath;
mod node;
mod registry;

pub use classpath::{ClassLoader, ClassPath, LoadedClass};
pub use node::{ClassLoaderScope, ScopeError, ScopeId};
pub use registry::{
    ClassLoaderScopeListener, ClassLoaderScopeRegistry, ListenerHandle, ListenerSlot,
    LoggingScopeListener, NoOpScopeListener,
};
