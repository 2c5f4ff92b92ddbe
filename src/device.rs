//! Device selection for test fixtures
//!
//! Fixtures run on CPU unless a test is marked `gpu`, in which case an
//! accelerator is opened or the test is told to skip.

use candle_core::Device;

use crate::error::{Error, Result};
use crate::options::TestMarkers;

/// Processor class a fixture wants its tensors on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    /// Host CPU
    Cpu,
    /// CUDA or Metal accelerator
    Accelerator,
}

impl ProcessorKind {
    /// The processor class a test's markers imply
    pub fn for_markers(markers: &TestMarkers) -> Self {
        if markers.gpu {
            ProcessorKind::Accelerator
        } else {
            ProcessorKind::Cpu
        }
    }

    /// Open a device of this class
    pub fn open(self) -> Result<Device> {
        match self {
            ProcessorKind::Cpu => Ok(cpu()),
            ProcessorKind::Accelerator => accelerator(),
        }
    }
}

/// The CPU device every fixture defaults to
pub fn cpu() -> Device {
    Device::Cpu
}

/// Try to open an accelerator device, preferring CUDA over Metal.
///
/// When neither backend can produce a device this returns
/// [`Error::Unavailable`], which callers treat as a skip rather than a
/// failure.
pub fn accelerator() -> Result<Device> {
    match Device::new_cuda(0) {
        Ok(device) => Ok(device),
        Err(cuda_err) => match Device::new_metal(0) {
            Ok(device) => Ok(device),
            Err(_) => Err(Error::unavailable(
                "accelerator",
                format!("no CUDA or Metal device could be opened: {}", cuda_err),
            )),
        },
    }
}

/// Open the device implied by a test's markers.
pub fn for_markers(markers: &TestMarkers) -> Result<Device> {
    ProcessorKind::for_markers(markers).open()
}
