use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Failure from the memory layer, passed through unchanged.
    #[error(transparent)]
    Memory(#[from] memview_sys::Error),

    #[error("unsupported dtype: {0}")]
    UnsupportedDType(String),

    /// A view would reach past the capacity of its buffer.
    #[error("view of {byte_len} bytes at offset {byte_offset} exceeds buffer capacity {capacity}")]
    OutOfBounds {
        byte_offset: usize,
        byte_len: usize,
        capacity: usize,
    },

    #[error("{len} elements of {element_size} bytes overflow the address space")]
    LengthOverflow { len: usize, element_size: usize },
}
