use std::{any::Any, fmt, sync::Arc};

use crate::error::Result;

pub mod cpu;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod sim;

/// Where the bytes of an allocation physically live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// Accelerator memory, only reachable through explicit copies.
    Device,
    /// Ordinary pageable host memory.
    Host,
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::Device => f.write_str("device"),
            MemoryKind::Host => f.write_str("host"),
        }
    }
}

/// Opaque token that lets another process map the same physical allocation.
///
/// Layout matches `CUipcMemHandle`: 64 reserved bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpcMemHandle(pub [u8; 64]);

impl fmt::Debug for IpcMemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.0.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        f.debug_tuple("IpcMemHandle").field(&&self.0[..end]).finish()
    }
}

/// A memory backend. Devices hand out [`Allocation`]s; the allocations themselves
/// know how to move bytes in and out.
pub trait Device: fmt::Debug + Send + Sync {
    fn kind(&self) -> MemoryKind;

    /// Ordinal of the device, `-1` for host memory.
    fn id(&self) -> i32;

    fn name(&self) -> String {
        format!("{}:{}", self.kind(), self.id())
    }

    fn allocate(&self, byte_len: usize) -> Result<Arc<dyn Allocation>>;
}

/// One physical allocation. Offsets are absolute within the allocation and
/// callers are expected to have bounds checked them already.
pub trait Allocation: fmt::Debug + Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn copy_from_host(&self, offset: usize, from: &[u8]) -> Result<()>;
    fn copy_to_host(&self, offset: usize, to: &mut [u8]) -> Result<()>;

    /// Copies `len` bytes from `from` into this allocation.
    ///
    /// `from` may be this very allocation, in which case the ranges may overlap.
    fn copy(
        &self,
        offset: usize,
        from: &dyn Allocation,
        from_offset: usize,
        len: usize,
    ) -> Result<()> {
        let mut staging = vec![0; len];
        from.copy_to_host(from_offset, &mut staging)?;
        self.copy_from_host(offset, &staging)
    }

    fn ipc_handle(&self) -> Option<IpcMemHandle> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}
