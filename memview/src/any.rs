//! Views whose dtype is only known at runtime.

use memview_sys::Memory;

use crate::{
    element::{Clamped, DType, Element},
    error::Result,
    source::{Source, ViewRef},
    view::{IpcDescriptor, MemoryView},
};

/// A [`MemoryView`] of any of the supported dtypes.
#[derive(Debug, Clone)]
pub enum AnyView {
    Int8(MemoryView<i8>),
    Int16(MemoryView<i16>),
    Int32(MemoryView<i32>),
    Int64(MemoryView<i64>),
    Uint8(MemoryView<u8>),
    Uint8Clamped(MemoryView<Clamped>),
    Uint16(MemoryView<u16>),
    Uint32(MemoryView<u32>),
    Uint64(MemoryView<u64>),
    Float32(MemoryView<f32>),
    Float64(MemoryView<f64>),
}

/// Runs `$body` with `$v` bound to the typed view inside `$any`.
macro_rules! dispatch {
    ($any:expr, $v:ident => $body:expr) => {
        match $any {
            AnyView::Int8($v) => $body,
            AnyView::Int16($v) => $body,
            AnyView::Int32($v) => $body,
            AnyView::Int64($v) => $body,
            AnyView::Uint8($v) => $body,
            AnyView::Uint8Clamped($v) => $body,
            AnyView::Uint16($v) => $body,
            AnyView::Uint32($v) => $body,
            AnyView::Uint64($v) => $body,
            AnyView::Float32($v) => $body,
            AnyView::Float64($v) => $body,
        }
    };
}

/// Runs `$body` with the type alias `$t` naming the element type of `$dtype`.
macro_rules! with_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            DType::Int8 => {
                type $t = i8;
                $body
            }
            DType::Int16 => {
                type $t = i16;
                $body
            }
            DType::Int32 => {
                type $t = i32;
                $body
            }
            DType::Int64 => {
                type $t = i64;
                $body
            }
            DType::Uint8 => {
                type $t = u8;
                $body
            }
            DType::Uint8Clamped => {
                type $t = Clamped;
                $body
            }
            DType::Uint16 => {
                type $t = u16;
                $body
            }
            DType::Uint32 => {
                type $t = u32;
                $body
            }
            DType::Uint64 => {
                type $t = u64;
                $body
            }
            DType::Float32 => {
                type $t = f32;
                $body
            }
            DType::Float64 => {
                type $t = f64;
                $body
            }
        }
    };
}

impl AnyView {
    /// Allocates `len` zeroed elements of `dtype`.
    pub fn new(dtype: DType, len: usize) -> Result<Self> {
        with_dtype!(dtype, T => Ok(MemoryView::<T>::new(len)?.into_any()))
    }

    /// Like [`AnyView::new`], with the dtype given by tag such as `"float32"`
    /// or `"Int16Array"`.
    pub fn with_tag(tag: &str, len: usize) -> Result<Self> {
        Self::new(tag.parse()?, len)
    }

    /// Wraps `len` elements of `buffer` at `byte_offset` without copying.
    pub fn wrap(dtype: DType, buffer: Memory, byte_offset: usize, len: usize) -> Result<Self> {
        with_dtype!(dtype, T => Ok(MemoryView::<T>::wrap(buffer, byte_offset, len)?.into_any()))
    }

    /// Builds a view of `dtype` from any source. Host values are numbers and
    /// are converted to `dtype` element by element.
    pub fn from_source<'a>(dtype: DType, source: impl Into<Source<'a, f64>>) -> Result<Self> {
        let source = source.into();
        with_dtype!(dtype, T => Ok(MemoryView::<T>::from_source(retype::<T>(source))?.into_any()))
    }

    /// Uploads host numbers, converting each to `dtype`.
    pub fn from_numbers(dtype: DType, numbers: &[f64]) -> Result<Self> {
        Self::from_source(dtype, numbers)
    }

    /// Reinterprets the bytes of this view as `dtype`. The result aliases this
    /// view; a trailing partial element is dropped.
    pub fn cast(&self, dtype: DType) -> Result<Self> {
        let view = self.as_view_ref();
        with_dtype!(dtype, T => Ok(MemoryView::<T>::from_source(Source::<T>::View(view))?.into_any()))
    }

    pub fn dtype(&self) -> DType {
        dispatch!(self, v => v.dtype())
    }

    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        dispatch!(self, v => v.byte_len())
    }

    pub fn byte_offset(&self) -> usize {
        dispatch!(self, v => v.byte_offset())
    }

    pub fn buffer(&self) -> &Memory {
        dispatch!(self, v => v.buffer())
    }

    pub fn subarray(&self, start: isize, end: Option<isize>) -> Self {
        dispatch!(self, v => v.subarray(start, end).into_any())
    }

    pub fn slice(&self, start: isize, end: Option<isize>) -> Result<Self> {
        dispatch!(self, v => Ok(v.slice(start, end)?.into_any()))
    }

    /// Reads element `index` as a number.
    pub fn get_f64(&self, index: usize) -> Result<Option<f64>> {
        dispatch!(self, v => Ok(v.get(index)?.map(Element::to_f64)))
    }

    /// Stores a number at `index`, converted to this view's dtype.
    pub fn set_f64(&mut self, index: usize, value: f64) -> Result<()> {
        dispatch!(self, v => v.set_at(index, Element::from_f64(value)))
    }

    pub fn fill_f64(&mut self, value: f64, start: isize, end: Option<isize>) -> Result<()> {
        dispatch!(self, v => v.fill(Element::from_f64(value), start, end))
    }

    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        dispatch!(self, v => Ok(v.to_vec()?.into_iter().map(Element::to_f64).collect()))
    }

    pub fn downcast_ref<T: Element>(&self) -> Option<&MemoryView<T>> {
        T::from_any(self)
    }

    pub fn ipc_handle(&self) -> Result<IpcDescriptor> {
        dispatch!(self, v => v.ipc_handle())
    }

    pub(crate) fn as_view_ref(&self) -> ViewRef<'_> {
        dispatch!(self, v => v.as_view_ref())
    }
}

fn retype<T>(source: Source<'_, f64>) -> Source<'_, T> {
    match source {
        Source::Values(numbers) | Source::Numbers(numbers) => Source::Numbers(numbers),
        Source::Bytes(bytes) => Source::Bytes(bytes),
        Source::Memory(memory) => Source::Memory(memory),
        Source::View(view) => Source::View(view),
        Source::Empty => Source::Empty,
    }
}

impl<T: Element> From<MemoryView<T>> for AnyView {
    fn from(view: MemoryView<T>) -> Self {
        view.into_any()
    }
}
