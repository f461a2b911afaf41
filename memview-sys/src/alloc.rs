//! The process-wide allocation hook.
//!
//! Every view constructor that needs fresh memory calls [`allocate_memory`].
//! [`set_default_allocator`] must run before the first allocation that should
//! use the replacement; views created earlier keep their memory. There is no
//! implicit reset.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::{error::Result, memory::Memory};

pub type AllocateFn = dyn Fn(usize) -> Result<Memory> + Send + Sync;

static ALLOCATOR: Lazy<RwLock<Option<Arc<AllocateFn>>>> = Lazy::new(|| RwLock::new(None));

/// Routes all future fresh allocations through `f`.
///
/// Returns the hook that was installed before, if any, so it can be handed back
/// to [`restore_default_allocator`].
pub fn set_default_allocator<F>(f: F) -> Option<Arc<AllocateFn>>
where
    F: Fn(usize) -> Result<Memory> + Send + Sync + 'static,
{
    tracing::debug!("default allocator replaced");
    let f: Arc<AllocateFn> = Arc::new(f);
    ALLOCATOR.write().replace(f)
}

/// Reinstalls a hook previously returned by [`set_default_allocator`].
/// `None` goes back to plain [`Memory::new`].
pub fn restore_default_allocator(prev: Option<Arc<AllocateFn>>) {
    tracing::debug!(custom = prev.is_some(), "default allocator restored");
    *ALLOCATOR.write() = prev;
}

/// Allocates `byte_len` bytes through the current hook.
pub fn allocate_memory(byte_len: usize) -> Result<Memory> {
    // release the lock before calling out, the hook may allocate itself
    let hook = ALLOCATOR.read().clone();
    match hook {
        Some(f) => f(byte_len),
        None => Memory::new(byte_len),
    }
}
