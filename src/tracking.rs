//! Experiment-tracking runs and their cleanup
//!
//! Experiment trackers keep per-process state: a stack of active runs that
//! outlives the test which started them. A test that crashes mid-run would
//! otherwise leak its run into the next test's view. [`TrackingSession`]
//! models that stack, and [`TrackingSession::clean_runs`] hands tests an
//! RAII guard that flushes it both before and after the test body.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

/// One tracking run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    /// Process-unique run id
    pub id: u64,
    /// Run name as shown by the tracker
    pub name: String,
    /// When the run was started
    pub started_at: DateTime<Utc>,
}

/// Backend a tracking session reports run closures to
#[cfg_attr(test, mockall::automock)]
pub trait TrackingBackend: Send + Sync {
    /// Close `run` on the tracker
    fn end_run(&self, run: &RunInfo) -> anyhow::Result<()>;
}

/// Per-process experiment-tracking session
///
/// Runs nest: [`start_run`](Self::start_run) pushes and
/// [`end_run`](Self::end_run) pops the most recent. A backend is optional;
/// without one the session tracks the stack and nothing else.
pub struct TrackingSession {
    backend: Mutex<Option<Arc<dyn TrackingBackend>>>,
    active: Mutex<Vec<RunInfo>>,
    next_id: AtomicU64,
}

impl TrackingSession {
    /// Create a session with no backend and no active runs
    pub fn new() -> Self {
        Self {
            backend: Mutex::new(None),
            active: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Attach the backend that should be told when runs end
    pub fn install_backend(&self, backend: Arc<dyn TrackingBackend>) {
        *self.backend.lock() = Some(backend);
    }

    /// Detach the backend, if any
    pub fn clear_backend(&self) {
        *self.backend.lock() = None;
    }

    /// Whether a backend is attached
    pub fn has_backend(&self) -> bool {
        self.backend.lock().is_some()
    }

    /// Start a run and push it onto the active stack
    pub fn start_run(&self, name: impl Into<String>) -> RunInfo {
        let run = RunInfo {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            started_at: Utc::now(),
        };
        self.active.lock().push(run.clone());
        debug!("Started tracking run `{}`", run.name);
        run
    }

    /// The most recently started run that has not ended yet
    pub fn active_run(&self) -> Option<RunInfo> {
        self.active.lock().last().cloned()
    }

    /// Number of active runs
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// End the most recent run and notify the backend.
    ///
    /// The run is popped before the backend is called, so even a failing
    /// backend cannot keep a run on the stack.
    pub fn end_run(&self) -> Result<()> {
        let run = self
            .pop_run()
            .ok_or_else(|| Error::tracking("no active run to end"))?;
        if let Some(backend) = self.backend_handle() {
            backend.end_run(&run).map_err(|e| {
                Error::tracking(format!("failed to end run `{}`: {}", run.name, e))
            })?;
        }
        Ok(())
    }

    /// End every active run, most recent first, swallowing backend errors.
    ///
    /// With no backend and no active runs this does nothing at all.
    pub fn flush_all(&self) {
        while let Some(run) = self.pop_run() {
            if let Some(backend) = self.backend_handle() {
                if let Err(err) = backend.end_run(&run) {
                    debug!("Ignoring error while ending run `{}`: {}", run.name, err);
                }
            }
        }
    }

    /// Flush now and hand back a guard that flushes again on drop.
    pub fn clean_runs(&self) -> TrackingGuard<'_> {
        self.flush_all();
        TrackingGuard { session: self }
    }

    fn pop_run(&self) -> Option<RunInfo> {
        self.active.lock().pop()
    }

    fn backend_handle(&self) -> Option<Arc<dyn TrackingBackend>> {
        self.backend.lock().clone()
    }
}

impl Default for TrackingSession {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that leaves a tracking session with no active runs
///
/// Created by [`TrackingSession::clean_runs`]. The run stack is flushed
/// when the guard is created and again when it drops, so a test neither
/// inherits another test's runs nor leaks its own.
#[must_use = "the guard flushes on drop; bind it with `let _guard = ...`"]
pub struct TrackingGuard<'a> {
    session: &'a TrackingSession,
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        self.session.flush_all();
    }
}

static GLOBAL: Lazy<TrackingSession> = Lazy::new(TrackingSession::new);

/// The process-wide tracking session `#[test]` functions share
pub fn global() -> &'static TrackingSession {
    &GLOBAL
}
