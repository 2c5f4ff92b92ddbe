//! Test loggers and their destinations
//!
//! [`Logger`] fans metric records out to its destinations. Tests mostly
//! want [`Logger::empty`] (no destinations, every record dropped) or a
//! [`MemorySink`] they can assert against afterwards.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use crate::error::Result;

/// A destination metric records get logged to
pub trait LogSink: Send + Sync {
    /// Short destination name used in diagnostics
    fn name(&self) -> &str;

    /// Record one step's metrics
    fn log_metrics(&self, step: u64, metrics: &HashMap<String, f64>) -> anyhow::Result<()>;

    /// Flush buffered records to the backing store
    fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Fan-out logger attached to run states under test
pub struct Logger {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl Logger {
    /// Logger over the given destinations
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }

    /// Logger with no destinations
    pub fn empty() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Number of attached destinations
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Record one step's metrics on every destination
    pub fn log_metrics(&self, step: u64, metrics: &HashMap<String, f64>) -> Result<()> {
        for sink in &self.sinks {
            sink.log_metrics(step, metrics)?;
        }
        Ok(())
    }

    /// Flush every destination
    pub fn flush(&self) -> Result<()> {
        for sink in &self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::empty()
    }
}

/// In-memory destination tests can assert against
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<(u64, HashMap<String, f64>)>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn records(&self) -> Vec<(u64, HashMap<String, f64>)> {
        self.records.lock().clone()
    }

    /// Number of recorded steps
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl LogSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn log_metrics(&self, step: u64, metrics: &HashMap<String, f64>) -> anyhow::Result<()> {
        self.records.lock().push((step, metrics.clone()));
        Ok(())
    }
}

/// Destination appending one JSON line per logged step to a file
pub struct JsonFileSink {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl JsonFileSink {
    /// Create (or truncate) the record file at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::create(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path the records are written to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for JsonFileSink {
    fn name(&self) -> &str {
        "json-file"
    }

    fn log_metrics(&self, step: u64, metrics: &HashMap<String, f64>) -> anyhow::Result<()> {
        let line = serde_json::to_string(&json!({ "step": step, "metrics": metrics }))?;
        let mut file = self.file.lock();
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        self.file.lock().flush()?;
        Ok(())
    }
}
