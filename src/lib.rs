//! buildinit - Build initialization core
//!
//! Loads the settings of a build, turns its project descriptors into a
//! project tree with per-project class loader scopes, and drives the build
//! through a staged, fail-once lifecycle up to its task graph.

pub mod build;
pub mod cli;
pub mod domain;
pub mod logging;
pub mod scope;
pub mod settings;

pub use build::{BuildControllerFactory, BuildLifecycleController, BuildTreeContext};
pub use domain::{ProjectDescriptorRegistry, ProjectPath, Stage};
pub use settings::{Settings, StartParameter};
