//! Root scopes and the scope listener slot
//!
//! A registry is created once per process. It owns the two root scopes that
//! every build shares read-only, and a single listener slot that the build
//! tree currently running can bind through [`ClassLoaderScopeRegistry::install_listener`].

use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::classpath::{ClassLoader, ClassPath};
use super::node::{ClassLoaderScope, ScopeId};

/// Observer of scope and loader creation
pub trait ClassLoaderScopeListener: Send + Sync {
    fn child_scope_created(&self, _parent: &ScopeId, _child: &ScopeId) {}

    fn class_loader_created(&self, _scope: &ScopeId, _loader: &str, _classpath: &ClassPath) {}
}

/// Listener that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpScopeListener;

impl ClassLoaderScopeListener for NoOpScopeListener {}

/// Logs scope and loader creation at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingScopeListener;

impl ClassLoaderScopeListener for LoggingScopeListener {
    fn child_scope_created(&self, parent: &ScopeId, child: &ScopeId) {
        debug!(parent = %parent, scope = %child, "Class loader scope created");
    }

    fn class_loader_created(&self, scope: &ScopeId, loader: &str, classpath: &ClassPath) {
        debug!(scope = %scope, loader, entries = classpath.entries().len(), "Class loader created");
    }
}

/// Single rebindable listener shared by every scope of a registry
#[derive(Clone)]
pub struct ListenerSlot(Arc<RwLock<Arc<dyn ClassLoaderScopeListener>>>);

impl ListenerSlot {
    fn new() -> Self {
        Self(Arc::new(RwLock::new(Arc::new(NoOpScopeListener))))
    }

    /// The listener bound right now
    pub fn current(&self) -> Arc<dyn ClassLoaderScopeListener> {
        Arc::clone(&self.0.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn bind(&self, listener: Arc<dyn ClassLoaderScopeListener>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = listener;
    }
}

/// Keeps a listener bound; dropping it rebinds the no-op listener
#[must_use = "the listener is unbound as soon as the handle is dropped"]
pub struct ListenerHandle {
    slot: ListenerSlot,
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.slot.bind(Arc::new(NoOpScopeListener));
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle").finish_non_exhaustive()
    }
}

/// Process-wide root scopes
pub struct ClassLoaderScopeRegistry {
    core: Arc<ClassLoaderScope>,
    core_and_plugins: Arc<ClassLoaderScope>,
    listener: ListenerSlot,
}

impl ClassLoaderScopeRegistry {
    /// Builds the roots: `core` over the core API class path and
    /// `core-and-plugins` adding the built-in plugins on top of it
    pub fn new(core_api: ClassPath, plugins: ClassPath) -> Self {
        let listener = ListenerSlot::new();

        let core_loader = ClassLoader::new("core", core_api, vec![]);
        let plugins_loader =
            ClassLoader::new("core-and-plugins", plugins, vec![Arc::clone(&core_loader)]);

        Self {
            core: ClassLoaderScope::root(ScopeId::root("core"), core_loader, listener.clone()),
            core_and_plugins: ClassLoaderScope::root(
                ScopeId::root("core-and-plugins"),
                plugins_loader,
                listener.clone(),
            ),
            listener,
        }
    }

    /// Roots with no class path at all
    pub fn empty() -> Self {
        Self::new(ClassPath::new(), ClassPath::new())
    }

    /// Roots for a distribution laid out as `lib/` and `lib/plugins/`
    ///
    /// `lib/plugins/` belongs to the plugins root only.
    pub fn for_distribution(home: &Path) -> Self {
        let lib = home.join("lib");
        let plugins = lib.join("plugins");

        let core_api = if lib.is_dir() {
            ClassPath::of([&lib]).excluding(&plugins)
        } else {
            ClassPath::new()
        };
        let plugins = if plugins.is_dir() { ClassPath::of([&plugins]) } else { ClassPath::new() };

        debug!(home = %home.display(), "Creating root class loader scopes");
        Self::new(core_api, plugins)
    }

    /// Root with the core implementation and the restricted core API
    pub fn core_scope(&self) -> &Arc<ClassLoaderScope> {
        &self.core
    }

    /// Root adding built-in plugins and the full API
    pub fn core_and_plugins_scope(&self) -> &Arc<ClassLoaderScope> {
        &self.core_and_plugins
    }

    /// Binds `listener` for every scope of this registry, including scopes
    /// created by earlier builds and reused now
    pub fn install_listener(&self, listener: Arc<dyn ClassLoaderScopeListener>) -> ListenerHandle {
        self.listener.bind(listener);
        ListenerHandle {
            slot: self.listener.clone(),
        }
    }
}

impl fmt::Debug for ClassLoaderScopeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassLoaderScopeRegistry")
            .field("core", self.core.id())
            .field("core_and_plugins", self.core_and_plugins.id())
            .finish()
    }
}
