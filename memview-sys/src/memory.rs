use std::{fmt, sync::Arc};

use parking_lot::RwLock;

use crate::{
    config,
    device::{Allocation, Device, IpcMemHandle, MemoryKind},
    error::{Error, Result},
};

/// A shared handle to a range of device memory.
///
/// Cloning a `Memory` yields another reference to the same handle: a resize
/// through one clone is observed through all of them. [`Memory::slice`] instead
/// produces a new handle that aliases part of the same physical allocation.
///
/// The physical allocation is released once the last handle or slice that
/// references it is dropped.
#[derive(Clone)]
pub struct Memory {
    inner: Arc<Handle>,
}

struct Handle {
    device: Arc<dyn Device>,
    state: RwLock<State>,
}

#[derive(Clone)]
struct State {
    alloc: Arc<dyn Allocation>,
    /// Start of this handle within `alloc`.
    offset: usize,
    len: usize,
    /// Bytes reserved for this handle, `len <= capacity` always.
    capacity: usize,
}

impl Memory {
    /// Allocates `byte_len` bytes on the configured default device.
    pub fn new(byte_len: usize) -> Result<Self> {
        Self::new_on(config::default_device()?, byte_len)
    }

    pub fn new_on(device: Arc<dyn Device>, byte_len: usize) -> Result<Self> {
        let alloc = device.allocate(byte_len)?;
        tracing::debug!(device = %device.name(), bytes = byte_len, "allocated memory");
        Ok(Self::from_parts(device, alloc, 0, byte_len))
    }

    fn from_parts(
        device: Arc<dyn Device>,
        alloc: Arc<dyn Allocation>,
        offset: usize,
        len: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Handle {
                device,
                state: RwLock::new(State {
                    alloc,
                    offset,
                    len,
                    capacity: len,
                }),
            }),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.inner.state.read().len
    }

    pub fn capacity(&self) -> usize {
        self.inner.state.read().capacity
    }

    pub fn is_empty(&self) -> bool {
        self.byte_len() == 0
    }

    pub fn kind(&self) -> MemoryKind {
        self.inner.device.kind()
    }

    pub fn device_id(&self) -> i32 {
        self.inner.device.id()
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.inner.device
    }

    /// A new handle over `begin..end` of this one. No bytes are copied; the
    /// slice keeps the underlying allocation alive.
    pub fn slice(&self, begin: usize, end: usize) -> Result<Self> {
        let state = self.inner.state.read();
        if begin > end || end > state.capacity {
            return Err(Error::OutOfBounds {
                offset: begin,
                len: end.saturating_sub(begin),
                capacity: state.capacity,
            });
        }

        Ok(Self::from_parts(
            Arc::clone(&self.inner.device),
            Arc::clone(&state.alloc),
            state.offset + begin,
            end - begin,
        ))
    }

    /// Changes the logical length of this handle.
    ///
    /// Shrinking, or growing within the current capacity, only moves the
    /// length. Growing past the capacity moves the handle to a new allocation
    /// holding a copy of the previously valid bytes; slices taken before keep
    /// the old allocation.
    pub fn resize(&self, byte_len: usize) -> Result<()> {
        let mut state = self.inner.state.write();
        if byte_len <= state.capacity {
            state.len = byte_len;
            return Ok(());
        }

        let alloc = self.inner.device.allocate(byte_len)?;
        alloc.copy(0, &*state.alloc, state.offset, state.len)?;
        tracing::debug!(
            device = %self.inner.device.name(),
            from = state.capacity,
            to = byte_len,
            "reallocated memory"
        );
        *state = State {
            alloc,
            offset: 0,
            len: byte_len,
            capacity: byte_len,
        };
        Ok(())
    }

    /// A new, independent handle on the same device holding a copy of
    /// this handle's bytes.
    pub fn duplicate(&self) -> Result<Self> {
        let state = self.inner.state.read().clone();
        let device = Arc::clone(&self.inner.device);
        let alloc = device.allocate(state.len)?;
        alloc.copy(0, &*state.alloc, state.offset, state.len)?;
        Ok(Self::from_parts(device, alloc, 0, state.len))
    }

    /// The ipc handle of the underlying allocation and this handle's offset into it.
    pub fn ipc_handle(&self) -> Result<(IpcMemHandle, usize)> {
        let kind = self.kind();
        if kind != MemoryKind::Device {
            return Err(Error::NotDeviceMemory { kind });
        }
        let state = self.inner.state.read();
        let handle = state.alloc.ipc_handle().ok_or_else(|| Error::IpcUnsupported {
            device: self.inner.device.name(),
        })?;
        Ok((handle, state.offset))
    }

    /// Whether both handles reference the same physical allocation.
    pub fn same_allocation(&self, other: &Memory) -> bool {
        let a = Arc::as_ptr(&self.inner.state.read().alloc);
        let b = Arc::as_ptr(&other.inner.state.read().alloc);
        std::ptr::addr_eq(a, b)
    }

    /// Whether both values are the same handle.
    pub fn ptr_eq(&self, other: &Memory) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Resolves `offset..offset + len` of this handle to its allocation and the
    /// absolute offset within it.
    pub(crate) fn locate(&self, offset: usize, len: usize) -> Result<(Arc<dyn Allocation>, usize)> {
        let state = self.inner.state.read();
        match offset.checked_add(len) {
            Some(end) if end <= state.capacity => Ok((Arc::clone(&state.alloc), state.offset + offset)),
            _ => Err(Error::OutOfBounds {
                offset,
                len,
                capacity: state.capacity,
            }),
        }
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Memory")
            .field("device", &self.inner.device.name())
            .field("offset", &state.offset)
            .field("byte_len", &state.len)
            .field("capacity", &state.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Memory;
    use crate::{
        copy::{copy, Dst, Src},
        device::{cpu::Cpu, sim::Sim, Device, MemoryKind},
        error::Error,
    };

    fn sim() -> (Sim, Arc<dyn Device>) {
        let sim = Sim::new(0);
        let device: Arc<dyn Device> = Arc::new(sim.clone());
        (sim, device)
    }

    fn read_all(mem: &Memory) -> Vec<u8> {
        let mut out = vec![0; mem.byte_len()];
        copy(Dst::Host(&mut out), Src::Memory(mem, 0), mem.byte_len()).unwrap();
        out
    }

    #[test]
    fn capacity_never_shrinks() {
        let (_, device) = sim();
        let mem = Memory::new_on(device, 1000).unwrap();
        assert_eq!(mem.byte_len(), 1000);
        assert_eq!(mem.capacity(), 1000);

        mem.resize(1234).unwrap();
        assert_eq!(mem.byte_len(), 1234);
        assert_eq!(mem.capacity(), 1234);

        mem.resize(0).unwrap();
        assert_eq!(mem.byte_len(), 0);
        assert_eq!(mem.capacity(), 1234);
        assert!(mem.is_empty());

        mem.resize(500).unwrap();
        assert_eq!(mem.capacity(), 1234);
    }

    #[test]
    fn growth_keeps_valid_bytes() {
        let (_, device) = sim();
        let mem = Memory::new_on(device, 4).unwrap();
        copy(Dst::Memory(&mem, 0), Src::Host(&[1, 2, 3, 4]), 4).unwrap();

        mem.resize(6).unwrap();
        assert_eq!(read_all(&mem), [1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn clones_share_the_handle() {
        let (_, device) = sim();
        let a = Memory::new_on(device, 8).unwrap();
        let b = a.clone();
        a.resize(2).unwrap();
        assert_eq!(b.byte_len(), 2);
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn slices_alias_bytes() {
        let (_, device) = sim();
        let mem = Memory::new_on(device, 8).unwrap();
        let slice = mem.slice(2, 6).unwrap();
        assert_eq!(slice.byte_len(), 4);
        assert_eq!(slice.capacity(), 4);
        assert!(slice.same_allocation(&mem));
        assert!(!slice.ptr_eq(&mem));

        copy(Dst::Memory(&slice, 0), Src::Host(&[7, 7]), 2).unwrap();
        assert_eq!(read_all(&mem), [0, 0, 7, 7, 0, 0, 0, 0]);

        let nested = slice.slice(1, 3).unwrap();
        copy(Dst::Memory(&nested, 1), Src::Host(&[9]), 1).unwrap();
        assert_eq!(read_all(&mem), [0, 0, 7, 7, 9, 0, 0, 0]);
    }

    #[test]
    fn slice_out_of_bounds() {
        let (_, device) = sim();
        let mem = Memory::new_on(device, 8).unwrap();
        assert!(matches!(
            mem.slice(4, 9),
            Err(Error::OutOfBounds { capacity: 8, .. })
        ));
        assert!(mem.slice(5, 4).is_err());
        assert_eq!(mem.slice(8, 8).unwrap().byte_len(), 0);
    }

    #[test]
    fn slices_outlive_their_parent() {
        let (sim, device) = sim();
        let mem = Memory::new_on(device, 16).unwrap();
        copy(Dst::Memory(&mem, 0), Src::Host(&[5; 16]), 16).unwrap();
        let slice = mem.slice(0, 4).unwrap();

        drop(mem);
        assert_eq!(sim.used(), 16);
        assert_eq!(read_all(&slice), [5; 4]);

        drop(slice);
        assert_eq!(sim.used(), 0);
    }

    #[test]
    fn reallocation_detaches_earlier_slices() {
        let (sim, device) = sim();
        let mem = Memory::new_on(device, 4).unwrap();
        let slice = mem.slice(0, 4).unwrap();

        mem.resize(8).unwrap();
        assert!(!slice.same_allocation(&mem));
        assert_eq!(sim.used(), 12);

        copy(Dst::Memory(&mem, 0), Src::Host(&[1; 4]), 4).unwrap();
        assert_eq!(read_all(&slice), [0; 4]);
    }

    #[test]
    fn duplicate_is_independent() {
        let (_, device) = sim();
        let mem = Memory::new_on(device, 3).unwrap();
        copy(Dst::Memory(&mem, 0), Src::Host(&[1, 2, 3]), 3).unwrap();

        let dup = mem.duplicate().unwrap();
        assert!(!dup.same_allocation(&mem));
        copy(Dst::Memory(&mem, 0), Src::Host(&[0]), 1).unwrap();
        assert_eq!(read_all(&dup), [1, 2, 3]);
    }

    #[test]
    fn ipc_requires_device_memory() {
        let host = Memory::new_on(Arc::new(Cpu), 8).unwrap();
        assert!(matches!(
            host.ipc_handle(),
            Err(Error::NotDeviceMemory {
                kind: MemoryKind::Host
            })
        ));

        let (_, device) = sim();
        let mem = Memory::new_on(device, 8).unwrap();
        let (handle, offset) = mem.slice(3, 8).unwrap().ipc_handle().unwrap();
        assert_eq!(offset, 3);
        assert_eq!(handle, mem.ipc_handle().unwrap().0);
    }
}
