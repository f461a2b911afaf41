use thiserror::Error;

use crate::device::MemoryKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The device could not provide the requested bytes.
    #[error("allocation of {bytes} bytes failed: {reason}")]
    AllocationFailed { bytes: usize, reason: String },

    /// A byte range reaches past the end of a handle.
    #[error("byte range {offset}..{offset}+{len} exceeds capacity {capacity}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// A host buffer passed to a copy is shorter than the copy length.
    #[error("host buffer too small: needed {needed} bytes, got {actual}")]
    HostBufferTooSmall { needed: usize, actual: usize },

    /// Only device memory can be shared across processes.
    #[error("expected device memory, found {kind} memory")]
    NotDeviceMemory { kind: MemoryKind },

    #[error("device {device} does not support ipc handles")]
    IpcUnsupported { device: String },

    #[error("invalid device: {device}")]
    InvalidDevice { device: String },

    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] cust::error::CudaError),
}
