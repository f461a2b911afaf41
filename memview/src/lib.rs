//! Typed, sliceable views over device memory.
//!
//! A [`MemoryView`] interprets a window of a [`sys::Memory`] handle as a
//! sequence of one of eleven numeric element types. Every element access is an
//! explicit copy between the host and the device.

pub use memview_sys as sys;

/// Runtime-typed views
pub mod any;

/// The element types a view can hold
pub mod element;

pub mod error;

/// Resolution of `start`/`end` windows
pub mod range;

/// Host and device data that views read from and write into
pub mod source;

/// The typed view itself
pub mod view;

pub use any::AnyView;
pub use element::{Clamped, DType, Element};
pub use error::{Error, Result};
pub use source::{Source, Target};
pub use view::{IpcDescriptor, MemoryView};

pub type Int8Buffer = MemoryView<i8>;
pub type Int16Buffer = MemoryView<i16>;
pub type Int32Buffer = MemoryView<i32>;
pub type Int64Buffer = MemoryView<i64>;
pub type Uint8Buffer = MemoryView<u8>;
pub type Uint8ClampedBuffer = MemoryView<Clamped>;
pub type Uint16Buffer = MemoryView<u16>;
pub type Uint32Buffer = MemoryView<u32>;
pub type Uint64Buffer = MemoryView<u64>;
pub type Float32Buffer = MemoryView<f32>;
pub type Float64Buffer = MemoryView<f64>;
