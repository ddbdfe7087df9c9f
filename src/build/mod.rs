//! # Build Lifecycle
//!
//! Drives one build from its start parameters to a finished result.
//!
//! ## Stages
//!
//! ```text
//! Created ─▶ LoadSettings ─▶ Configure ─▶ TaskGraph ─▶ RunTasks ─▶ Finished
//!    │                                        ▲
//!    └──────────── configuration cache hit ───┘
//! ```
//!
//! Stages only move forward. The first stage failure poisons the
//! controller; every later request reports that same failure.
//!
//! | File | Purpose |
//! |------|---------|
//! | `controller.rs` | Stage machine and collaborator traits |
//! | `model.rs` | Per-build state: settings, projects, task graph |
//! | `project.rs` | Project objects and the project tree |
//! | `loader.rs` | Project tree creation from descriptors |
//! | `prepare.rs` | Default settings and projects preparers |
//! | `tasks.rs` | Task selection and the dry-run executor |
//! | `cache.rs` | SQLite-backed configuration cache |
//! | `services.rs` | Closeable service scopes |
//! | `progress.rs` | Progress events and listeners |
//! | `tree.rs` | Controller factory for root and included builds |

mod cache;
mod controller;
mod loader;
mod model;
mod prepare;
mod progress;
mod project;
mod services;
mod tasks;
mod tree;

pub use cache::{
    fingerprint, CacheEntry, CacheError, CacheStore, ConfigurationCache,
    DisabledConfigurationCache, SqliteConfigurationCache, CACHE_DIR,
};
pub use controller::{
    BuildCollaborators, BuildFinishedListener, BuildLifecycleController, BuildResult,
    BuildWorkExecutor, Failure, LifecycleError, LoggingBuildFinishedListener, ProjectsPreparer,
    SettingsPreparer, TaskExecutionPreparer,
};
pub use loader::{BuildLoader, DefaultProjectFactory, ProjectFactory};
pub use model::{BuildModel, TaskGraph};
pub use prepare::{DefaultProjectsPreparer, DefaultSettingsPreparer};
pub use progress::{BuildProgressEvent, LoggingListener, NoOpListener, ProgressListener};
pub use project::{Project, ProjectTree, ProjectTreeError};
pub use services::{Closer, ServiceError, ServiceScope};
pub use tasks::{task_path, DefaultTaskSelector, DryRunExecutor, ExecutionError, TaskSelectionError};
pub use tree::{BuildControllerFactory, BuildTreeContext, ClientMetadata};
