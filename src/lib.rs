//! Crucible - Session-scoped fixtures for ML training test suites
//!
//! This crate provides the shared fixtures a training test suite needs:
//! a session cache that builds expensive resources (tiny models, tokenizers,
//! configs) once and hands every test an isolated copy, plus prebuilt run
//! states, deterministic datasets, and tracking cleanup.
//!
//! The fixture surface lives in [`fixtures`]; everything else backs it.

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod cache;
pub mod checkout;
pub mod data;
pub mod device;
pub mod dist;
pub mod error;
pub mod fixtures;
pub mod hub;
pub mod loggers;
pub mod models;
pub mod options;
pub mod retry;
pub mod state;
pub mod time;
pub mod tracking;

// Re-exports
pub use cache::{session, SessionCache};
pub use checkout::{checkout_via_serde, Checkout};
pub use device::ProcessorKind;
pub use dist::{Collective, LocalProcess};
pub use error::{Error, Result};
pub use loggers::{JsonFileSink, LogSink, Logger, MemorySink};
pub use options::TestMarkers;
pub use retry::{retry, retry_async, DEFAULT_ATTEMPTS};
pub use state::{LrSchedule, Precision, RunState};
pub use time::{TimeBudget, TimeUnit};
pub use tracking::{RunInfo, TrackingBackend, TrackingGuard, TrackingSession};
