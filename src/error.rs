//! Error types for the Crucible fixture system

use thiserror::Error;

/// Main error type for fixture operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A fixture (or the capability it depends on) is not available in this
    /// build or environment; tests should skip rather than fail
    #[error("Fixture unavailable: {what}: {reason}")]
    Unavailable {
        /// The fixture or capability that could not be provided
        what: String,
        /// Why it is unavailable
        reason: String,
    },

    /// A session fixture builder failed; the failure is replayed to every
    /// later request for the same key
    #[error("Fixture `{key}` failed to build: {reason}")]
    Build {
        /// The session cache key of the failing fixture
        key: String,
        /// The rendered builder error
        reason: String,
    },

    /// A cached fixture was requested as a different type than it was
    /// created with
    #[error("Fixture `{key}` is not a `{requested}`")]
    TypeMismatch {
        /// The session cache key of the fixture
        key: String,
        /// The type the caller asked for
        requested: &'static str,
    },

    /// Option lookup error
    #[error("Option error: {0}")]
    Options(#[from] config::ConfigError),

    /// Tensor operation error
    #[error("Tensor operation error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Tokenizer error
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Model hub error
    #[error("Model hub error: {0}")]
    Hub(String),

    /// Tracking session error
    #[error("Tracking error: {0}")]
    Tracking(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary encoding error
    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for fixture operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an unavailability error (the skip signal)
    pub fn unavailable(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Create a build error for a session cache key
    pub fn build(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Build {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a type mismatch error for a session cache key
    pub fn type_mismatch(key: impl Into<String>, requested: &'static str) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            requested,
        }
    }

    /// Create a tokenizer error
    pub fn tokenizer(msg: impl Into<String>) -> Self {
        Self::Tokenizer(msg.into())
    }

    /// Create a model hub error
    pub fn hub(msg: impl Into<String>) -> Self {
        Self::Hub(msg.into())
    }

    /// Create a tracking error
    pub fn tracking(msg: impl Into<String>) -> Self {
        Self::Tracking(msg.into())
    }

    /// Whether this error means "skip the test" rather than "fail the test"
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
