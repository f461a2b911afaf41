//! The shapes of data a view can be built from, written from, or copied into.

use memview_sys::Memory;

use crate::{any::AnyView, element::DType, view::MemoryView, Element};

/// Anything a [`MemoryView`] can be constructed from or `set` from.
#[derive(Debug, Clone)]
pub enum Source<'a, T> {
    /// Host element values of the view's own dtype.
    Values(&'a [T]),
    /// Host numbers, converted with [`Element::from_f64`].
    Numbers(&'a [f64]),
    /// Raw host bytes; a trailing partial element is ignored.
    Bytes(&'a [u8]),
    /// A whole memory handle, wrapped without copying.
    Memory(Memory),
    /// The byte range of another view, of any dtype.
    View(ViewRef<'a>),
    /// Nothing usable: produces an empty view.
    Empty,
}

/// The byte range covered by a view, independent of its element type.
#[derive(Debug, Clone, Copy)]
pub struct ViewRef<'a> {
    pub(crate) buffer: &'a Memory,
    pub(crate) byte_offset: usize,
    pub(crate) byte_len: usize,
    pub(crate) dtype: DType,
}

impl ViewRef<'_> {
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

impl<'a, T> From<&'a [T]> for Source<'a, T> {
    fn from(values: &'a [T]) -> Self {
        Source::Values(values)
    }
}

impl<'a, T> From<&'a Vec<T>> for Source<'a, T> {
    fn from(values: &'a Vec<T>) -> Self {
        Source::Values(values)
    }
}

impl<'a, T, const N: usize> From<&'a [T; N]> for Source<'a, T> {
    fn from(values: &'a [T; N]) -> Self {
        Source::Values(values)
    }
}

impl<T> From<Memory> for Source<'_, T> {
    fn from(memory: Memory) -> Self {
        Source::Memory(memory)
    }
}

impl<T> From<&Memory> for Source<'_, T> {
    fn from(memory: &Memory) -> Self {
        Source::Memory(memory.clone())
    }
}

impl<'a, T, U: Element> From<&'a MemoryView<U>> for Source<'a, T> {
    fn from(view: &'a MemoryView<U>) -> Self {
        Source::View(view.as_view_ref())
    }
}

impl<'a, T> From<&'a AnyView> for Source<'a, T> {
    fn from(view: &'a AnyView) -> Self {
        Source::View(view.as_view_ref())
    }
}

impl<T> From<()> for Source<'_, T> {
    fn from(_: ()) -> Self {
        Source::Empty
    }
}

/// Where [`MemoryView::copy_into`] writes.
#[derive(Debug)]
pub enum Target<'a, T> {
    /// Another view of any dtype, written through its `set`.
    View(ViewTarget<'a>),
    /// A plain host byte buffer.
    Bytes(&'a mut [u8]),
    /// Host element values of the view's own dtype.
    Values(&'a mut [T]),
}

/// A destination view, independent of its element type.
#[derive(Debug)]
pub struct ViewTarget<'a> {
    pub(crate) buffer: &'a Memory,
    pub(crate) byte_offset: usize,
    pub(crate) len: usize,
    pub(crate) dtype: DType,
}

impl<'a, T, U: Element> From<&'a mut MemoryView<U>> for Target<'a, T> {
    fn from(view: &'a mut MemoryView<U>) -> Self {
        let view: &'a MemoryView<U> = view;
        Target::View(ViewTarget {
            buffer: view.buffer(),
            byte_offset: view.byte_offset(),
            len: view.len(),
            dtype: U::DTYPE,
        })
    }
}

impl<'a, T> From<&'a mut AnyView> for Target<'a, T> {
    fn from(view: &'a mut AnyView) -> Self {
        let view: &'a AnyView = view;
        Target::View(ViewTarget {
            buffer: view.buffer(),
            byte_offset: view.byte_offset(),
            len: view.len(),
            dtype: view.dtype(),
        })
    }
}

impl<'a, T> From<&'a mut [T]> for Target<'a, T> {
    fn from(values: &'a mut [T]) -> Self {
        Target::Values(values)
    }
}

impl<'a, T> From<&'a mut Vec<T>> for Target<'a, T> {
    fn from(values: &'a mut Vec<T>) -> Self {
        Target::Values(values)
    }
}
