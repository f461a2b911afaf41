//! Device memory management for memview: devices and their allocations,
//! shared memory handles, the host/device copy primitive and the process-wide
//! allocation hook.

pub mod alloc;
pub mod config;
pub mod copy;
pub mod device;
pub mod error;
pub mod logging;
pub mod memory;

pub use alloc::{allocate_memory, restore_default_allocator, set_default_allocator};
pub use device::{Allocation, Device, IpcMemHandle, MemoryKind};
pub use error::{Error, Result};
pub use memory::Memory;
