use std::{fmt, marker::PhantomData};

use bytemuck::Zeroable;
use memview_sys::{
    alloc::allocate_memory,
    copy::{copy, Dst, Src},
    IpcMemHandle, Memory,
};

use crate::{
    any::AnyView,
    element::{DType, Element},
    error::{Error, Result},
    range,
    source::{Source, Target, ViewRef, ViewTarget},
};

/// A typed window over device memory.
///
/// A view never holds element data on the host: every read or write is an
/// explicit, synchronous transfer through the copy primitive. Several views may
/// alias the same [`Memory`], and cloning a view yields another view of the same
/// bytes.
#[derive(Clone)]
pub struct MemoryView<T: Element> {
    buffer: Memory,
    byte_offset: usize,
    len: usize,
    _marker: PhantomData<T>,
}

/// Everything another process needs to map a view's bytes: the allocation's
/// ipc handle and the offset of the view's first byte within that allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcDescriptor {
    pub handle: IpcMemHandle,
    pub byte_offset: usize,
}

impl<T: Element> MemoryView<T> {
    pub const ELEMENT_SIZE: usize = T::DTYPE.byte_size();

    fn from_parts(buffer: Memory, byte_offset: usize, len: usize) -> Self {
        Self {
            buffer,
            byte_offset,
            len,
            _marker: PhantomData,
        }
    }

    /// Allocates room for `len` elements through the allocation hook.
    pub fn new(len: usize) -> Result<Self> {
        let buffer = allocate_memory(byte_len_of::<T>(len)?)?;
        Ok(Self::from_parts(buffer, 0, len))
    }

    /// Builds a view from host data, a memory handle or another view.
    ///
    /// Host data is copied into fresh memory. Handles and views are aliased
    /// without copying; a view of another dtype is reinterpreted byte for byte.
    pub fn from_source<'a>(source: impl Into<Source<'a, T>>) -> Result<Self> {
        match source.into() {
            Source::Values(values) => Self::from_host(bytemuck::cast_slice(values)),
            Source::Numbers(numbers) => {
                let values: Vec<T> = numbers.iter().map(|&n| T::from_f64(n)).collect();
                Self::from_host(bytemuck::cast_slice(&values))
            }
            Source::Bytes(bytes) => Self::from_host(bytes),
            Source::Memory(buffer) => {
                let len = buffer.byte_len() / Self::ELEMENT_SIZE;
                Ok(Self::from_parts(buffer, 0, len))
            }
            Source::View(view) => {
                let end = view.byte_offset + view.byte_len;
                let buffer = view.buffer.slice(view.byte_offset, end)?;
                Ok(Self::from_parts(buffer, 0, view.byte_len / Self::ELEMENT_SIZE))
            }
            Source::Empty => {
                tracing::warn!(dtype = T::DTYPE.name(), "unsupported view source, using an empty view");
                Ok(Self::from_parts(allocate_memory(0)?, 0, 0))
            }
        }
    }

    fn from_host(bytes: &[u8]) -> Result<Self> {
        let len = bytes.len() / Self::ELEMENT_SIZE;
        let byte_len = len * Self::ELEMENT_SIZE;
        let buffer = allocate_memory(byte_len)?;
        copy(Dst::Memory(&buffer, 0), Src::Host(bytes), byte_len)?;
        Ok(Self::from_parts(buffer, 0, len))
    }

    /// Wraps `length` elements of `buffer` starting at `byte_offset`. Nothing is
    /// allocated or copied.
    ///
    /// A length that does not convert to a non-negative count becomes 0.
    pub fn wrap<L: TryInto<usize>>(buffer: Memory, byte_offset: usize, length: L) -> Result<Self> {
        let len = length.try_into().unwrap_or_else(|_| {
            tracing::debug!(dtype = T::DTYPE.name(), "invalid view length, using 0");
            0
        });
        let byte_len = byte_len_of::<T>(len)?;
        let capacity = buffer.capacity();
        match byte_offset.checked_add(byte_len) {
            Some(end) if end <= capacity => Ok(Self::from_parts(buffer, byte_offset, len)),
            _ => Err(Error::OutOfBounds {
                byte_offset,
                byte_len,
                capacity,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    pub fn byte_len(&self) -> usize {
        self.len * Self::ELEMENT_SIZE
    }

    pub fn element_size(&self) -> usize {
        Self::ELEMENT_SIZE
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    pub fn buffer(&self) -> &Memory {
        &self.buffer
    }

    /// Capacity of the underlying buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    fn element_offset(&self, index: usize) -> usize {
        self.byte_offset + index * Self::ELEMENT_SIZE
    }

    pub(crate) fn as_view_ref(&self) -> ViewRef<'_> {
        ViewRef {
            buffer: &self.buffer,
            byte_offset: self.byte_offset,
            byte_len: self.byte_len(),
            dtype: T::DTYPE,
        }
    }

    fn as_target(&self) -> ViewTarget<'_> {
        ViewTarget {
            buffer: &self.buffer,
            byte_offset: self.byte_offset,
            len: self.len,
            dtype: T::DTYPE,
        }
    }

    /// Reads element `index` from the device. Out of range reads give `None`.
    pub fn get(&self, index: usize) -> Result<Option<T>> {
        if index >= self.len {
            return Ok(None);
        }
        let mut value = T::zeroed();
        copy(
            Dst::Host(bytemuck::bytes_of_mut(&mut value)),
            Src::Memory(&self.buffer, self.element_offset(index)),
            Self::ELEMENT_SIZE,
        )?;
        Ok(Some(value))
    }

    /// Writes element `index` to the device. Out of range writes do nothing.
    pub fn set_at(&mut self, index: usize, value: T) -> Result<()> {
        if index >= self.len {
            tracing::trace!(index, len = self.len, "ignoring out of range write");
            return Ok(());
        }
        copy(
            Dst::Memory(&self.buffer, self.element_offset(index)),
            Src::Host(bytemuck::bytes_of(&value)),
            Self::ELEMENT_SIZE,
        )?;
        Ok(())
    }

    /// Writes `source` into this view starting at element `start` (negative
    /// counts from the end). Copies as much as fits; never grows the view.
    pub fn set<'a>(&mut self, source: impl Into<Source<'a, T>>, start: isize) -> Result<()> {
        let target = self.as_target();
        match source.into() {
            Source::Values(values) => {
                let bytes = bytemuck::cast_slice(values);
                write_window(target, start, Src::Host(bytes), bytes.len())
            }
            Source::Numbers(numbers) => {
                let values: Vec<T> = numbers.iter().map(|&n| T::from_f64(n)).collect();
                let bytes = bytemuck::cast_slice(&values);
                write_window(target, start, Src::Host(bytes), bytes.len())
            }
            Source::Bytes(bytes) => {
                let usable = bytes.len() / Self::ELEMENT_SIZE * Self::ELEMENT_SIZE;
                write_window(target, start, Src::Host(bytes), usable)
            }
            source => {
                let source = Self::from_source(source)?;
                let from = Src::Memory(&source.buffer, source.byte_offset);
                write_window(target, start, from, source.byte_len())
            }
        }
    }

    /// Same as [`MemoryView::set`].
    pub fn copy_from<'a>(&mut self, source: impl Into<Source<'a, T>>, start: isize) -> Result<()> {
        self.set(source, start)
    }

    /// Copies this view into `target`.
    ///
    /// Views are written through their own `set` with `start` indexing the
    /// target. Byte buffers receive as many leading bytes as fit. Host value
    /// slices receive the elements from `start` onwards of this view.
    pub fn copy_into<'a>(&self, target: impl Into<Target<'a, T>>, start: isize) -> Result<()> {
        match target.into() {
            Target::View(target) => {
                let size = target.dtype.byte_size();
                let usable = self.byte_len() / size * size;
                write_window(target, start, Src::Memory(&self.buffer, self.byte_offset), usable)
            }
            Target::Bytes(bytes) => {
                let byte_len = self.byte_len().min(bytes.len());
                copy(Dst::Host(bytes), Src::Memory(&self.buffer, self.byte_offset), byte_len)?;
                Ok(())
            }
            Target::Values(values) => {
                let window = range::clamp(self.len, start, None);
                let count = window.len().min(values.len());
                copy(
                    Dst::Host(bytemuck::cast_slice_mut(&mut values[..count])),
                    Src::Memory(&self.buffer, self.element_offset(window.start)),
                    count * Self::ELEMENT_SIZE,
                )?;
                Ok(())
            }
        }
    }

    /// Sets every element in `start..end` (resolved like [`range::clamp`]) to `value`.
    pub fn fill(&mut self, value: T, start: isize, end: Option<isize>) -> Result<()> {
        let window = range::clamp(self.len, start, end);
        if window.is_empty() {
            return Ok(());
        }
        let staging = vec![value; window.len()];
        let bytes: &[u8] = bytemuck::cast_slice(&staging);
        copy(
            Dst::Memory(&self.buffer, self.element_offset(window.start)),
            Src::Host(bytes),
            bytes.len(),
        )?;
        Ok(())
    }

    /// A zero-copy view of `start..end` sharing this view's buffer.
    pub fn subarray(&self, start: isize, end: Option<isize>) -> Self {
        let window = range::clamp(self.len, start, end);
        Self::from_parts(
            self.buffer.clone(),
            self.element_offset(window.start),
            window.len(),
        )
    }

    /// A view of `start..end` over a new handle covering exactly that range,
    /// obtained from [`Memory::slice`].
    pub fn slice(&self, start: isize, end: Option<isize>) -> Result<Self> {
        let window = range::clamp(self.len, start, end);
        let buffer = self
            .buffer
            .slice(self.element_offset(window.start), self.element_offset(window.end))?;
        Ok(Self::from_parts(buffer, 0, window.len()))
    }

    /// Copies the elements back to the host.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); self.len];
        self.copy_into(&mut out, 0)?;
        Ok(out)
    }

    /// A view over freshly allocated memory holding a copy of this view's elements.
    pub fn to_owned_copy(&self) -> Result<Self> {
        let byte_len = self.byte_len();
        let buffer = allocate_memory(byte_len)?;
        copy(
            Dst::Memory(&buffer, 0),
            Src::Memory(&self.buffer, self.byte_offset),
            byte_len,
        )?;
        Ok(Self::from_parts(buffer, 0, self.len))
    }

    /// Describes this view for sharing with another process. Only views over
    /// device memory can be shared.
    pub fn ipc_handle(&self) -> Result<IpcDescriptor> {
        let (handle, offset) = self.buffer.ipc_handle()?;
        Ok(IpcDescriptor {
            handle,
            byte_offset: offset + self.byte_offset,
        })
    }

    pub fn into_any(self) -> AnyView {
        T::into_any(self)
    }
}

impl<T: Element> fmt::Debug for MemoryView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryView")
            .field("dtype", &T::DTYPE)
            .field("len", &self.len)
            .field("byte_offset", &self.byte_offset)
            .field("buffer", &self.buffer)
            .finish()
    }
}

fn byte_len_of<T: Element>(len: usize) -> Result<usize> {
    let element_size = T::DTYPE.byte_size();
    len.checked_mul(element_size)
        .ok_or(Error::LengthOverflow { len, element_size })
}

/// Copies up to `src_byte_len` bytes into the window of `target` that starts at
/// element `start`. The shared core of `set` and `copy_into`.
fn write_window(target: ViewTarget<'_>, start: isize, src: Src<'_>, src_byte_len: usize) -> Result<()> {
    let size = target.dtype.byte_size();
    let window = range::clamp(target.len, start, None);
    let byte_len = (window.len() * size).min(src_byte_len);
    copy(
        Dst::Memory(target.buffer, target.byte_offset + window.start * size),
        src,
        byte_len,
    )?;
    Ok(())
}
