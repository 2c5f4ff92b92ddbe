//! Minimal collective-communication seam
//!
//! Some fixtures must agree on a value across ranks (the shared session
//! name in particular). [`Collective`] is the narrow surface they need:
//! rank, world size, and a byte broadcast. [`LocalProcess`] is the
//! single-process case every plain `cargo test` run uses.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Collective operations a fixture may need
#[cfg_attr(test, mockall::automock)]
pub trait Collective: Send + Sync {
    /// This process's rank in the job
    fn rank(&self) -> usize;

    /// Total number of ranks in the job
    fn world_size(&self) -> usize;

    /// Broadcast bytes from rank `src`; every rank returns the source's
    /// bytes. The payload is ignored on non-source ranks.
    fn broadcast_bytes(&self, payload: Vec<u8>, src: usize) -> anyhow::Result<Vec<u8>>;
}

/// Single-process collective: rank 0 of a world of 1
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProcess;

impl Collective for LocalProcess {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn broadcast_bytes(&self, payload: Vec<u8>, _src: usize) -> anyhow::Result<Vec<u8>> {
        Ok(payload)
    }
}

/// Broadcast a serde value from rank `src` to every rank.
///
/// The source rank passes `Some(value)`, every other rank passes `None`,
/// and all ranks return the source's value. The source decodes its own
/// encoded bytes too, so every rank returns exactly what went over the
/// wire.
pub fn broadcast_value<T>(comm: &dyn Collective, value: Option<T>, src: usize) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let payload = match value {
        Some(v) if comm.rank() == src => bincode::serialize(&v)?,
        None if comm.rank() != src => Vec::new(),
        Some(_) => {
            return Err(Error::config(
                "only the source rank provides a broadcast value",
            ))
        }
        None => {
            return Err(Error::config(
                "the source rank must provide a broadcast value",
            ))
        }
    };

    let bytes = comm.broadcast_bytes(payload, src)?;
    Ok(bincode::deserialize(&bytes)?)
}
