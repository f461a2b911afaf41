use std::{
    any::Any,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use super::{cpu::HostAllocation, Allocation, Device, IpcMemHandle, MemoryKind};
use crate::error::{Error, Result};

static NEXT_IPC_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Host-backed stand-in for accelerator memory.
///
/// Allocations report [`MemoryKind::Device`], are only reachable through
/// explicit copies and can produce ipc handles. An optional byte limit makes
/// allocation failures reproducible.
#[derive(Debug, Clone)]
pub struct Sim {
    id: i32,
    limit: Option<usize>,
    used: Arc<AtomicUsize>,
}

impl Sim {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            limit: None,
            used: Arc::default(),
        }
    }

    pub fn with_limit(id: i32, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new(id)
        }
    }

    /// Bytes currently held by live allocations of this device.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

impl Device for Sim {
    fn kind(&self) -> MemoryKind {
        MemoryKind::Device
    }

    fn id(&self) -> i32 {
        self.id
    }

    fn name(&self) -> String {
        format!("sim:{}", self.id)
    }

    fn allocate(&self, byte_len: usize) -> Result<Arc<dyn Allocation>> {
        let limit = self.limit.unwrap_or(usize::MAX);
        let reserved = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(byte_len).filter(|&total| total <= limit)
            });
        if reserved.is_err() {
            return Err(Error::AllocationFailed {
                bytes: byte_len,
                reason: format!(
                    "{} exhausted: {} of {} bytes in use",
                    self.name(),
                    self.used(),
                    limit
                ),
            });
        }

        Ok(Arc::new(SimAllocation {
            inner: HostAllocation::zeroed(byte_len),
            len: byte_len,
            device: self.id,
            token: NEXT_IPC_TOKEN.fetch_add(1, Ordering::Relaxed),
            used: Arc::clone(&self.used),
        }))
    }
}

#[derive(Debug)]
pub struct SimAllocation {
    inner: HostAllocation,
    len: usize,
    device: i32,
    token: u64,
    used: Arc<AtomicUsize>,
}

impl Drop for SimAllocation {
    fn drop(&mut self) {
        self.used.fetch_sub(self.len, Ordering::AcqRel);
    }
}

impl Allocation for SimAllocation {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_from_host(&self, offset: usize, from: &[u8]) -> Result<()> {
        self.inner.copy_from_host(offset, from)
    }

    fn copy_to_host(&self, offset: usize, to: &mut [u8]) -> Result<()> {
        self.inner.copy_to_host(offset, to)
    }

    fn copy(
        &self,
        offset: usize,
        from: &dyn Allocation,
        from_offset: usize,
        len: usize,
    ) -> Result<()> {
        match from.as_any().downcast_ref::<SimAllocation>() {
            Some(from) => self.inner.copy(offset, &from.inner, from_offset, len),
            None => self.inner.copy(offset, from, from_offset, len),
        }
    }

    fn ipc_handle(&self) -> Option<IpcMemHandle> {
        let mut bytes = [0; 64];
        bytes[..8].copy_from_slice(&self.token.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.device.to_le_bytes());
        Some(IpcMemHandle(bytes))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{Allocation, Device, MemoryKind, Sim};
    use crate::error::Error;

    #[test]
    fn usage_follows_allocation_lifetime() {
        let sim = Sim::new(0);
        let a = sim.allocate(100).unwrap();
        let b = sim.allocate(28).unwrap();
        assert_eq!(sim.used(), 128);

        drop(a);
        assert_eq!(sim.used(), 28);
        drop(b);
        assert_eq!(sim.used(), 0);
    }

    #[test]
    fn limit_is_enforced() {
        let sim = Sim::with_limit(1, 64);
        let _a = sim.allocate(60).unwrap();

        let err = sim.allocate(8).unwrap_err();
        assert!(matches!(err, Error::AllocationFailed { bytes: 8, .. }));
        // the failed request must not leak into the accounting
        assert_eq!(sim.used(), 60);
        assert!(sim.allocate(4).is_ok());
    }

    #[test]
    fn ipc_handles_are_unique_per_allocation() {
        let sim = Sim::new(3);
        assert_eq!(sim.kind(), MemoryKind::Device);

        let a = sim.allocate(1).unwrap();
        let b = sim.allocate(1).unwrap();
        let (ha, hb) = (a.ipc_handle().unwrap(), b.ipc_handle().unwrap());
        assert_ne!(ha, hb);
        assert_eq!(ha.0[8..12], 3i32.to_le_bytes());
    }
}
