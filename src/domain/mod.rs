//! Domain models for the build initialization core
//!
//! Contains project identity, selection and lifecycle primitives without any
//! I/O concerns.

mod cancellation;
mod descriptor;
mod path;
mod snapshot;
pub mod spec;
mod stage;

pub use cancellation::{
    BuildGateToken, CancellationCallback, CancellationError, CancellationToken, GateError,
    Gatekeeper,
};
pub use descriptor::{
    normalize_path, DescriptorError, DescriptorId, ProjectDescriptor, ProjectDescriptorRegistry,
    DEFAULT_BUILD_FILE_NAME,
};
pub use path::{PathError, ProjectPath};
pub use snapshot::ProjectSnapshot;
pub use spec::{
    BuildFileProjectSpec, CurrentDirectoryProjectSpec, ProjectDirectoryProjectSpec, ProjectSpec,
    SelectionError,
};
pub use stage::Stage;
