//! Closeable service scopes

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

/// Action run when a scope is closed
pub type Closer = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Services of {0} have already been closed")]
    AlreadyClosed(String),

    #[error("Failed to close services of {scope} ({} failure(s))", failures.len())]
    CloseFailed {
        scope: String,
        failures: Vec<anyhow::Error>,
    },
}

/// Services owned by one build or one settings instance
///
/// Closers run in reverse registration order. A scope is closed once; all
/// closers run even when some fail.
pub struct ServiceScope {
    name: String,
    closers: Vec<(String, Closer)>,
    closed: bool,
}

impl ServiceScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            closers: Vec::new(),
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a service to release on close
    pub fn register<F>(&mut self, service: impl Into<String>, closer: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.closers.push((service.into(), Box::new(closer)));
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) -> Result<(), ServiceError> {
        if self.closed {
            return Err(ServiceError::AlreadyClosed(self.name.clone()));
        }
        self.closed = true;

        let mut failures = Vec::new();
        while let Some((service, closer)) = self.closers.pop() {
            debug!(scope = %self.name, service = %service, "Closing service");
            if let Err(e) = closer() {
                warn!(scope = %self.name, service = %service, error = %e, "Failed to close service");
                failures.push(e.context(format!("Failed to close {}", service)));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::CloseFailed {
                scope: self.name.clone(),
                failures,
            })
        }
    }
}

impl fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceScope")
            .field("name", &self.name)
            .field("services", &self.closers.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>())
            .field("closed", &self.closed)
            .finish()
    }
}
