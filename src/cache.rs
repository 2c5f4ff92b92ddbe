//! Session-scoped fixture cache
//!
//! Expensive resources (tiny pretrained models, tokenizers) are built once
//! per test process and shared. The cache memoizes the outcome of each
//! build: values are handed out behind [`Arc`], a builder that signalled
//! unavailability produces the same skip for every later request, and a
//! builder that failed replays its failure instead of running again.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use tracing::debug;

use crate::checkout::Checkout;
use crate::error::{Error, Result};

/// The memoized outcome of one builder run
enum Slot {
    /// The builder succeeded; the value is shared as-is
    Ready(Arc<dyn Any + Send + Sync>),
    /// The builder declared the fixture unavailable; requests become skips
    Skipped {
        what: String,
        reason: String,
    },
    /// The builder failed; requests replay the failure
    Failed {
        reason: String,
    },
}

/// Process-wide cache of session-scoped fixtures, keyed by name.
///
/// `cargo test` runs tests on many threads, so each key's builder must run
/// at most once even under concurrent first access. A builder must not
/// request its own key (that deadlocks on the key's init cell); requesting
/// a different key from inside a builder is fine.
pub struct SessionCache {
    slots: DashMap<String, Arc<OnceCell<Slot>>>,
}

impl SessionCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Fetch the value for `key`, running `build` only if no outcome has
    /// been memoized yet.
    ///
    /// On the first call for a key the builder runs exactly once, even when
    /// several tests race here. Whatever outcome it produces (a value, a
    /// skip, or a failure) is what every later call for the key observes.
    /// Requesting the value as the wrong `T` yields
    /// [`Error::TypeMismatch`].
    pub fn get_or_create<T, F>(&self, key: &str, build: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T>,
    {
        let cell = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        // The map shard lock is released above; the possibly slow builder
        // runs under the per-key cell only.
        let slot = cell.get_or_init(|| match build() {
            Ok(value) => {
                debug!("Session fixture `{}` built", key);
                Slot::Ready(Arc::new(value))
            }
            Err(Error::Unavailable { what, reason }) => {
                debug!("Session fixture `{}` unavailable: {}", key, reason);
                Slot::Skipped { what, reason }
            }
            Err(err) => {
                debug!("Session fixture `{}` failed: {}", key, err);
                Slot::Failed {
                    reason: err.to_string(),
                }
            }
        });

        match slot {
            Slot::Ready(value) => value
                .clone()
                .downcast::<T>()
                .map_err(|_| Error::type_mismatch(key, std::any::type_name::<T>())),
            Slot::Skipped { what, reason } => {
                Err(Error::unavailable(what.clone(), reason.clone()))
            }
            Slot::Failed { reason } => Err(Error::build(key, reason.clone())),
        }
    }

    /// Fetch the session value for `key` and hand back a per-test deep copy.
    ///
    /// The shared original stays in the cache untouched; the returned copy
    /// is the caller's to mutate.
    pub fn checkout<T, F>(&self, key: &str, build: F) -> Result<T>
    where
        T: Checkout + Send + Sync + 'static,
        F: FnOnce() -> Result<T>,
    {
        self.get_or_create(key, build)?.checkout()
    }

    /// Number of keys with a memoized outcome or one in flight
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the cache holds no keys
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether `key` has an entry, regardless of its outcome
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

static SESSION: Lazy<SessionCache> = Lazy::new(SessionCache::new);

/// The process-wide session cache shared by `#[test]` functions.
///
/// Library code takes a `&SessionCache` argument instead of reaching for
/// this, so suites that want an isolated cache can pass their own.
pub fn session() -> &'static SessionCache {
    &SESSION
}
