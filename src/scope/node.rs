//! Class loader scopes
//!
//! Each scope adds a local class path (visible only inside the scope) and an
//! export class path (visible to the scope and all of its descendants) on top
//! of its parent's export loader. Class loaders are built on first request
//! and memoized; requesting one locks the scope.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use super::classpath::{ClassLoader, ClassPath, LoadedClass};
use super::registry::ListenerSlot;

#[derive(Debug, Error, PartialEq)]
pub enum ScopeError {
    #[error("Class loader scope '{0}' is locked and cannot be modified")]
    Locked(ScopeId),
}

/// Hierarchical scope identifier, e.g. `core-and-plugins:settings:project(:a)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}:{}", self.0, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Default)]
struct ScopeState {
    local: ClassPath,
    export: ClassPath,
    exported_loaders: Vec<Arc<ClassLoader>>,
    locked: bool,
    local_loader: Option<Arc<ClassLoader>>,
    export_loader: Option<Arc<ClassLoader>>,
    /// Whether the loaders above were created by this scope rather than
    /// shared with the parent
    owns_local: bool,
    owns_export: bool,
}

/// A node in the class loader scope tree
pub struct ClassLoaderScope {
    id: ScopeId,
    parent: Option<Arc<ClassLoaderScope>>,
    listener: ListenerSlot,
    state: Mutex<ScopeState>,
}

impl ClassLoaderScope {
    /// Creates a locked root scope around an existing loader
    pub(crate) fn root(id: ScopeId, loader: Arc<ClassLoader>, listener: ListenerSlot) -> Arc<Self> {
        Arc::new(Self {
            id,
            parent: None,
            listener,
            state: Mutex::new(ScopeState {
                locked: true,
                local_loader: Some(Arc::clone(&loader)),
                export_loader: Some(loader),
                owns_local: true,
                owns_export: true,
                ..ScopeState::default()
            }),
        })
    }

    pub fn id(&self) -> &ScopeId {
        &self.id
    }

    pub fn parent(&self) -> Option<&Arc<ClassLoaderScope>> {
        self.parent.as_ref()
    }

    /// Adds class path visible only within this scope
    pub fn local(&self, classpath: &ClassPath) -> Result<(), ScopeError> {
        let mut state = self.mutable_state()?;
        state.local = state.local.plus(classpath);
        Ok(())
    }

    /// Adds class path visible to this scope and its descendants
    pub fn export(&self, classpath: &ClassPath) -> Result<(), ScopeError> {
        let mut state = self.mutable_state()?;
        state.export = state.export.plus(classpath);
        Ok(())
    }

    /// Exports a loader built elsewhere; its class path is not tracked
    pub fn export_loader(&self, loader: Arc<ClassLoader>) -> Result<(), ScopeError> {
        let mut state = self.mutable_state()?;
        state.exported_loaders.push(loader);
        Ok(())
    }

    /// Creates a child scope; this scope does not need to be locked first
    pub fn create_child(self: &Arc<Self>, name: &str) -> Arc<ClassLoaderScope> {
        let id = self.id.child(name);
        self.listener.current().child_scope_created(&self.id, &id);
        Arc::new(Self {
            id,
            parent: Some(Arc::clone(self)),
            listener: self.listener.clone(),
            state: Mutex::new(ScopeState::default()),
        })
    }

    /// Freezes the class paths; repeated calls are fine
    pub fn lock(&self) {
        self.state().locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.state().locked
    }

    /// Loader for code running in this scope
    pub fn local_class_loader(&self) -> Arc<ClassLoader> {
        let mut state = self.state();
        self.materialize(&mut state);
        match &state.local_loader {
            Some(loader) => Arc::clone(loader),
            None => ClassLoader::empty(self.id.as_str()),
        }
    }

    /// Loader that descendants build on
    pub fn export_class_loader(&self) -> Arc<ClassLoader> {
        let mut state = self.state();
        self.materialize(&mut state);
        match &state.export_loader {
            Some(loader) => Arc::clone(loader),
            None => ClassLoader::empty(self.id.as_str()),
        }
    }

    /// Loads a class as code in this scope sees it
    pub fn load_class(&self, class_name: &str) -> Option<LoadedClass> {
        self.local_class_loader().load_class(class_name)
    }

    /// True when the class was defined by a loader this scope created
    pub fn defines(&self, class: &LoadedClass) -> bool {
        let state = self.state();
        let by = |loader: &Option<Arc<ClassLoader>>, owned: bool| {
            owned && loader.as_ref().is_some_and(|l| class.is_defined_by(l))
        };
        by(&state.local_loader, state.owns_local) || by(&state.export_loader, state.owns_export)
    }

    fn materialize(&self, state: &mut ScopeState) {
        if state.export_loader.is_some() {
            return;
        }
        state.locked = true;

        let parent_export = self.parent.as_ref().map(|parent| parent.export_class_loader());
        let listener = self.listener.current();

        let export = if state.export.is_empty() && state.exported_loaders.is_empty() {
            parent_export.unwrap_or_else(|| ClassLoader::empty(self.id.as_str()))
        } else {
            let mut parents: Vec<Arc<ClassLoader>> = parent_export.into_iter().collect();
            parents.extend(state.exported_loaders.iter().cloned());
            let name = format!("{}-export", self.id);
            listener.class_loader_created(&self.id, &name, &state.export);
            state.owns_export = true;
            ClassLoader::new(name, state.export.clone(), parents)
        };

        let local = if state.local.is_empty() {
            Arc::clone(&export)
        } else {
            let name = format!("{}-local", self.id);
            listener.class_loader_created(&self.id, &name, &state.local);
            state.owns_local = true;
            ClassLoader::new(name, state.local.clone(), vec![Arc::clone(&export)])
        };

        state.export_loader = Some(export);
        state.local_loader = Some(local);
    }

    fn mutable_state(&self) -> Result<MutexGuard<'_, ScopeState>, ScopeError> {
        let state = self.state();
        if state.locked {
            return Err(ScopeError::Locked(self.id.clone()));
        }
        Ok(state)
    }

    fn state(&self) -> MutexGuard<'_, ScopeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ClassLoaderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("ClassLoaderScope")
            .field("id", &self.id)
            .field("locked", &state.locked)
            .field("local", &state.local)
            .field("export", &state.export)
            .finish()
    }
}
