use std::{any::Any, sync::Arc};

use parking_lot::RwLock;

use super::{Allocation, Device, MemoryKind};
use crate::error::Result;

/// Pageable host memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cpu;

impl Device for Cpu {
    fn kind(&self) -> MemoryKind {
        MemoryKind::Host
    }

    fn id(&self) -> i32 {
        -1
    }

    fn allocate(&self, byte_len: usize) -> Result<Arc<dyn Allocation>> {
        Ok(Arc::new(HostAllocation::zeroed(byte_len)))
    }
}

/// Bytes held in host RAM behind a lock.
#[derive(Debug)]
pub struct HostAllocation {
    data: RwLock<Box<[u8]>>,
}

impl HostAllocation {
    pub fn zeroed(byte_len: usize) -> Self {
        Self {
            data: RwLock::new(vec![0; byte_len].into_boxed_slice()),
        }
    }
}

impl Allocation for HostAllocation {
    fn len(&self) -> usize {
        self.data.read().len()
    }

    fn copy_from_host(&self, offset: usize, from: &[u8]) -> Result<()> {
        self.data.write()[offset..offset + from.len()].copy_from_slice(from);
        Ok(())
    }

    fn copy_to_host(&self, offset: usize, to: &mut [u8]) -> Result<()> {
        to.copy_from_slice(&self.data.read()[offset..offset + to.len()]);
        Ok(())
    }

    fn copy(
        &self,
        offset: usize,
        from: &dyn Allocation,
        from_offset: usize,
        len: usize,
    ) -> Result<()> {
        // same allocation: a single write lock, overlap handled by copy_within
        if std::ptr::addr_eq(from as *const dyn Allocation, self as *const Self) {
            self.data
                .write()
                .copy_within(from_offset..from_offset + len, offset);
            return Ok(());
        }
        match from.as_any().downcast_ref::<HostAllocation>() {
            Some(from) => {
                let src = from.data.read();
                self.data.write()[offset..offset + len]
                    .copy_from_slice(&src[from_offset..from_offset + len]);
                Ok(())
            }
            None => {
                let mut staging = vec![0; len];
                from.copy_to_host(from_offset, &mut staging)?;
                self.copy_from_host(offset, &staging)
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
