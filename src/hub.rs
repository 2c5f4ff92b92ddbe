//! Model hub access for fixtures that need real artifacts
//!
//! Hub access is optional: the `hub` feature pulls in `cached-path`, and
//! without it construction reports unavailability so dependent fixtures
//! skip instead of fail.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Base URL artifacts are resolved against
pub const DEFAULT_BASE_URL: &str = "https://huggingface.co";

/// Thin client for fetching files from a model hub
#[derive(Debug, Clone)]
pub struct HubClient {
    base_url: String,
}

impl HubClient {
    /// Client for the default hub.
    ///
    /// Fails with [`Error::Unavailable`] when the crate was built without
    /// the `hub` feature, so fixture builders skip before attempting any
    /// network traffic.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Client for a specific hub endpoint (a mirror, usually)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        if !Self::available() {
            return Err(Error::unavailable(
                "model hub",
                "crate was built without the `hub` feature",
            ));
        }
        Ok(Self {
            base_url: base_url.into(),
        })
    }

    /// Whether hub support was compiled in
    pub fn available() -> bool {
        cfg!(feature = "hub")
    }

    /// Endpoint files are resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Download `file` from `repo`, reusing the local cache when the file
    /// was fetched before.
    #[cfg(feature = "hub")]
    pub fn fetch(&self, repo: &str, file: &str) -> Result<PathBuf> {
        let url = format!("{}/{}/resolve/main/{}", self.base_url, repo, file);
        cached_path::cached_path(&url)
            .map_err(|e| Error::hub(format!("failed to fetch `{}`: {}", url, e)))
    }

    /// Fetch stub for builds without hub support
    #[cfg(not(feature = "hub"))]
    pub fn fetch(&self, repo: &str, file: &str) -> Result<PathBuf> {
        Err(Error::unavailable(
            "model hub",
            format!(
                "cannot fetch `{}/{}` from {}: crate was built without the `hub` feature",
                repo, file, self.base_url
            ),
        ))
    }
}
