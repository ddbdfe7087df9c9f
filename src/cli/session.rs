//! Build controllers for CLI commands

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::build::{
    BuildControllerFactory, BuildLifecycleController, BuildTreeContext, LoggingListener,
};
use crate::scope::{ClassLoaderScopeRegistry, ListenerHandle, LoggingScopeListener};
use crate::settings::{IncludedBuild, StartParameter, TomlPropertiesLoader};

/// One build tree started from the command line
pub struct BuildSession {
    factory: BuildControllerFactory,
    start: StartParameter,
    _scope_listener: ListenerHandle,
}

impl BuildSession {
    pub fn new(start: StartParameter, properties: TomlPropertiesLoader) -> Self {
        let scopes = match distribution_home() {
            Some(home) => ClassLoaderScopeRegistry::for_distribution(&home),
            None => ClassLoaderScopeRegistry::empty(),
        };
        let scopes = Arc::new(scopes);
        let scope_listener = scopes.install_listener(Arc::new(LoggingScopeListener));
        let tree = BuildTreeContext::new(scopes, Arc::new(LoggingListener));
        Self {
            factory: BuildControllerFactory::new(tree, Arc::new(properties)),
            start,
            _scope_listener: scope_listener,
        }
    }

    pub fn start(&self) -> &StartParameter {
        &self.start
    }

    pub fn root_build(&self) -> BuildLifecycleController {
        self.factory.root_build(self.start.clone())
    }

    pub fn nested_build(&self, included: &IncludedBuild) -> BuildLifecycleController {
        self.factory.nested_build(included, &self.start)
    }

    /// Runs `action` against a build, then finishes and stops the build
    ///
    /// The build is stopped even when `action` fails; the action's error wins
    /// over errors releasing the build.
    pub fn run_build<T, F>(&self, mut controller: BuildLifecycleController, action: F) -> Result<T>
    where
        F: FnOnce(&mut BuildLifecycleController) -> Result<T>,
    {
        let outcome = action(&mut controller);

        let mut listener_failures = Vec::new();
        if let Some(result) = controller.finish_build(None, &mut |e| listener_failures.push(e)) {
            debug!(action = result.action, failed = result.failure.is_some(), "Build finished");
        }
        for failure in &listener_failures {
            warn!(error = %failure, "Build finished listener failed");
        }

        let stopped = controller.stop(|| debug!("Build services released"));
        let value = outcome?;
        stopped?;
        Ok(value)
    }
}

/// `BUILDINIT_HOME`, else the directory above the one holding the binary
fn distribution_home() -> Option<PathBuf> {
    if let Some(home) = env::var_os("BUILDINIT_HOME") {
        return Some(PathBuf::from(home));
    }
    let exe = env::current_exe().ok()?;
    exe.parent()?.parent().map(PathBuf::from)
}
