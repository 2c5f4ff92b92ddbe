//! Per-test isolation via deep copies of shared resources
//!
//! Session fixtures are built once and shared by every test in the process.
//! Before a test may mutate one it takes a checkout: an independent deep
//! copy whose mutation cannot leak into the cached original or into other
//! tests.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// A deep, independent copy of a fixture value.
///
/// `checkout` must return a value that shares no mutable state with `self`.
/// Plain `Clone` is not enough for types whose clones alias storage (tensor
/// handles in particular); implementations copy the underlying buffers.
pub trait Checkout: Sized {
    /// Produce an independent deep copy
    fn checkout(&self) -> Result<Self>;
}

/// Deep-copy a plain-data value by round-tripping it through a binary
/// encoding.
///
/// Suitable as the body of a [`Checkout`] impl for config-style types that
/// hold no tensor or handle state.
pub fn checkout_via_serde<T>(value: &T) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let bytes = bincode::serialize(value)?;
    Ok(bincode::deserialize(&bytes)?)
}
