//! Environment-backed options for test runs
//!
//! Options are plain strings resolved from `CRUCIBLE_*` environment
//! variables with a per-option default, so a suite can be re-run with a
//! different seed (`CRUCIBLE_SEED=42 cargo test`) without code changes.

use config::{Config, Environment};

use crate::error::{Error, Result};

/// Environment variable prefix for all options
pub const ENV_PREFIX: &str = "CRUCIBLE";

const SEED_OPTION: &str = "seed";
const DEFAULT_SEED: &str = "0";

/// Resolve the option `name`, preferring the `CRUCIBLE_*` environment over
/// the given default.
pub fn get_option(name: &str, default: &str) -> Result<String> {
    let cfg = Config::builder()
        .set_default(name, default)?
        .add_source(Environment::with_prefix(ENV_PREFIX))
        .build()?;
    Ok(cfg.get_string(name)?)
}

/// The seed rank zero trains with, from `CRUCIBLE_SEED` (default 0).
///
/// Other ranks derive their seeds from this one, so tests that check seed
/// handling only ever look at rank zero's value.
pub fn rank_zero_seed() -> Result<u64> {
    let raw = get_option(SEED_OPTION, DEFAULT_SEED)?;
    raw.parse()
        .map_err(|_| Error::config(format!("seed option `{}` is not an integer", raw)))
}

/// Requirements a test declares about its environment
///
/// Markers steer fixture construction: a `gpu` test gets its state built on
/// an accelerator (or is skipped when none is present), and a `remote` test
/// is pointed at real remote storage instead of throwaway local names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestMarkers {
    /// The test needs an accelerator device
    pub gpu: bool,
    /// The test talks to remote object storage
    pub remote: bool,
}

impl TestMarkers {
    /// Markers for an ordinary CPU-only, local-only test
    pub fn none() -> Self {
        Self::default()
    }

    /// Mark the test as needing an accelerator
    pub fn with_gpu(mut self) -> Self {
        self.gpu = true;
        self
    }

    /// Mark the test as talking to remote storage
    pub fn with_remote(mut self) -> Self {
        self.remote = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const SEED_VAR: &str = "CRUCIBLE_SEED";

    #[test]
    #[serial]
    fn test_seed_defaults_to_zero() {
        std::env::remove_var(SEED_VAR);
        assert_eq!(rank_zero_seed().unwrap(), 0);
    }

    #[test]
    #[serial]
    fn test_seed_reads_environment() {
        std::env::set_var(SEED_VAR, "42");
        assert_eq!(rank_zero_seed().unwrap(), 42);
        std::env::remove_var(SEED_VAR);
    }

    #[test]
    #[serial]
    fn test_non_numeric_seed_is_rejected() {
        std::env::set_var(SEED_VAR, "not-a-seed");
        let err = rank_zero_seed().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        std::env::remove_var(SEED_VAR);
    }

    #[test]
    #[serial]
    fn test_get_option_uses_default_when_unset() {
        std::env::remove_var("CRUCIBLE_BUCKET");
        assert_eq!(get_option("bucket", "fallback").unwrap(), "fallback");
    }

    #[test]
    fn test_marker_builders() {
        let markers = TestMarkers::none().with_gpu().with_remote();
        assert!(markers.gpu);
        assert!(markers.remote);
        assert_eq!(TestMarkers::none(), TestMarkers::default());
    }
}
