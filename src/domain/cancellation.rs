//! Cancellation and gate tokens shared by the builds of one build tree
//!
//! Both tokens are advisory: they only notify or block their callers. The
//! lifecycle controller never polls them between stages.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;

/// Callback run when a build is cancelled
pub type CancellationCallback = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

#[derive(Debug, Error)]
pub enum CancellationError {
    #[error("Failed to run cancellation actions ({} failure(s))", .0.len())]
    Multiple(Vec<anyhow::Error>),
}

impl CancellationError {
    /// Every callback failure, in registration order
    pub fn causes(&self) -> &[anyhow::Error] {
        match self {
            CancellationError::Multiple(causes) => causes,
        }
    }
}

#[derive(Default)]
struct TokenState {
    cancelled: bool,
    callbacks: Vec<CancellationCallback>,
}

/// Thread-safe, one-way cancellation broadcast
#[derive(Default)]
pub struct CancellationToken {
    state: Mutex<TokenState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Registers a callback to run on cancellation
    ///
    /// Returns true when the token was already cancelled; the callback has
    /// then been run before this returns, and its failure is returned.
    pub fn add_callback<F>(&self, callback: F) -> Result<bool, CancellationError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        {
            let mut state = self.lock();
            if !state.cancelled {
                state.callbacks.push(Box::new(callback));
                return Ok(false);
            }
        }

        callback().map_err(|e| CancellationError::Multiple(vec![e]))?;
        Ok(true)
    }

    /// Cancels the token and runs every registered callback
    ///
    /// All callbacks run even when some fail; failures are reported together.
    /// Cancelling an already cancelled token does nothing.
    pub fn cancel(&self) -> Result<(), CancellationError> {
        let callbacks = {
            let mut state = self.lock();
            if state.cancelled {
                return Ok(());
            }
            state.cancelled = true;
            std::mem::take(&mut state.callbacks)
        };

        debug!(callbacks = callbacks.len(), "Build cancelled");

        let failures: Vec<anyhow::Error> = callbacks
            .into_iter()
            .filter_map(|callback| callback().err())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CancellationError::Multiple(failures))
        }
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("CancellationToken")
            .field("cancelled", &state.cancelled)
            .field("callbacks", &state.callbacks.len())
            .finish()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GateError {
    #[error("Gate is already open by another gatekeeper")]
    AlreadyOpen,

    #[error("Gate can only be closed by the gatekeeper that opened it")]
    NotOpener,
}

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    opened_by: Option<usize>,
    gatekeepers: usize,
}

/// Gate used by continuous builds to hold rebuilds until a gatekeeper opens it
#[derive(Debug, Default)]
pub struct BuildGateToken {
    state: Mutex<GateState>,
    opened: Condvar,
}

impl BuildGateToken {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a new gatekeeper; from now on the gate starts out closed
    pub fn gatekeeper(self: &Arc<Self>) -> Gatekeeper {
        let mut state = self.lock();
        state.gatekeepers += 1;
        Gatekeeper {
            id: state.gatekeepers,
            token: Arc::clone(self),
        }
    }

    /// True when nobody guards the gate or it is open
    pub fn is_open(&self) -> bool {
        let state = self.lock();
        state.gatekeepers == 0 || state.open
    }

    /// Blocks until the gate is open; returns at once when there are no
    /// gatekeepers
    pub fn wait_for_open(&self) {
        let mut state = self.lock();
        while state.gatekeepers > 0 && !state.open {
            state = self
                .opened
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn open(&self, keeper: usize) -> Result<(), GateError> {
        let mut state = self.lock();
        if state.open {
            return if state.opened_by == Some(keeper) {
                Ok(())
            } else {
                Err(GateError::AlreadyOpen)
            };
        }
        state.open = true;
        state.opened_by = Some(keeper);
        self.opened.notify_all();
        Ok(())
    }

    fn close(&self, keeper: usize) -> Result<(), GateError> {
        let mut state = self.lock();
        if !state.open {
            return Ok(());
        }
        if state.opened_by != Some(keeper) {
            return Err(GateError::NotOpener);
        }
        state.open = false;
        state.opened_by = None;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Identity allowed to open, and then close, a [`BuildGateToken`]
#[derive(Debug)]
pub struct Gatekeeper {
    id: usize,
    token: Arc<BuildGateToken>,
}

impl Gatekeeper {
    pub fn open(&self) -> Result<(), GateError> {
        self.token.open(self.id)
    }

    pub fn close(&self) -> Result<(), GateError> {
        self.token.close(self.id)
    }
}
