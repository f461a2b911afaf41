//! The copy primitive: synchronous byte copies between host buffers and
//! device memory handles, in any combination.

use crate::{
    error::{Error, Result},
    memory::Memory,
};

/// Where a copy reads from.
#[derive(Debug, Clone, Copy)]
pub enum Src<'a> {
    Host(&'a [u8]),
    /// A handle and a byte offset into it.
    Memory(&'a Memory, usize),
}

/// Where a copy writes to.
#[derive(Debug)]
pub enum Dst<'a> {
    Host(&'a mut [u8]),
    /// A handle and a byte offset into it.
    Memory(&'a Memory, usize),
}

/// Copies `byte_len` bytes from `src` to `dst`.
///
/// Device ranges are checked against the capacity of their handle, host
/// slices must hold at least `byte_len` bytes.
pub fn copy(dst: Dst<'_>, src: Src<'_>, byte_len: usize) -> Result<()> {
    if byte_len == 0 {
        return Ok(());
    }
    tracing::trace!(bytes = byte_len, "copy");

    match (dst, src) {
        (Dst::Host(to), Src::Host(from)) => {
            check_host(to.len(), byte_len)?;
            check_host(from.len(), byte_len)?;
            to[..byte_len].copy_from_slice(&from[..byte_len]);
            Ok(())
        }
        (Dst::Memory(to, offset), Src::Host(from)) => {
            check_host(from.len(), byte_len)?;
            let (alloc, offset) = to.locate(offset, byte_len)?;
            alloc.copy_from_host(offset, &from[..byte_len])
        }
        (Dst::Host(to), Src::Memory(from, offset)) => {
            check_host(to.len(), byte_len)?;
            let (alloc, offset) = from.locate(offset, byte_len)?;
            alloc.copy_to_host(offset, &mut to[..byte_len])
        }
        (Dst::Memory(to, to_offset), Src::Memory(from, from_offset)) => {
            let (dst, to_offset) = to.locate(to_offset, byte_len)?;
            let (src, from_offset) = from.locate(from_offset, byte_len)?;
            dst.copy(to_offset, &*src, from_offset, byte_len)
        }
    }
}

fn check_host(actual: usize, needed: usize) -> Result<()> {
    if actual < needed {
        return Err(Error::HostBufferTooSmall { needed, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{copy, Dst, Src};
    use crate::{
        device::{cpu::Cpu, sim::Sim},
        error::Error,
        memory::Memory,
    };

    fn device_memory(len: usize) -> Memory {
        Memory::new_on(Arc::new(Sim::new(0)), len).unwrap()
    }

    #[test]
    fn host_to_device_to_host() {
        let mem = device_memory(4);
        copy(Dst::Memory(&mem, 1), Src::Host(&[1, 2, 3]), 3).unwrap();

        let mut out = [0; 4];
        copy(Dst::Host(&mut out), Src::Memory(&mem, 0), 4).unwrap();
        assert_eq!(out, [0, 1, 2, 3]);
    }

    #[test]
    fn copy_length_is_explicit() {
        let mem = device_memory(4);
        copy(Dst::Memory(&mem, 0), Src::Host(&[1, 2, 3, 4]), 2).unwrap();

        let mut out = [9; 4];
        copy(Dst::Host(&mut out), Src::Memory(&mem, 0), 3).unwrap();
        assert_eq!(out, [1, 2, 0, 9]);
    }

    #[test]
    fn across_memory_kinds() {
        let device = device_memory(3);
        let host = Memory::new_on(Arc::new(Cpu), 3).unwrap();
        copy(Dst::Memory(&host, 0), Src::Host(&[4, 5, 6]), 3).unwrap();
        copy(Dst::Memory(&device, 0), Src::Memory(&host, 0), 3).unwrap();

        let mut out = [0; 3];
        copy(Dst::Host(&mut out), Src::Memory(&device, 0), 3).unwrap();
        assert_eq!(out, [4, 5, 6]);
    }

    #[test]
    fn within_one_handle() {
        let mem = device_memory(5);
        copy(Dst::Memory(&mem, 0), Src::Host(&[1, 2, 3, 4, 5]), 5).unwrap();
        copy(Dst::Memory(&mem, 1), Src::Memory(&mem, 0), 4).unwrap();

        let mut out = [0; 5];
        copy(Dst::Host(&mut out), Src::Memory(&mem, 0), 5).unwrap();
        assert_eq!(out, [1, 1, 2, 3, 4]);
    }

    #[test]
    fn bounds_are_checked() {
        let mem = device_memory(4);
        assert!(matches!(
            copy(Dst::Memory(&mem, 2), Src::Host(&[0; 3]), 3),
            Err(Error::OutOfBounds {
                offset: 2,
                len: 3,
                capacity: 4
            })
        ));
        assert!(matches!(
            copy(Dst::Memory(&mem, 0), Src::Host(&[0; 2]), 3),
            Err(Error::HostBufferTooSmall {
                needed: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn empty_copies_never_touch_memory() {
        let mem = device_memory(0);
        copy(Dst::Memory(&mem, 10), Src::Host(&[]), 0).unwrap();
    }
}
