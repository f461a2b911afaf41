use std::{any::Any, ffi::c_void, sync::Arc};

use cust::error::{CudaError, CudaResult};
use cust_raw::{CUcontext, CUdeviceptr};

use super::{Allocation, Device, IpcMemHandle, MemoryKind};
use crate::error::{Error, Result};

/// Owns a CUDA context for one device.
#[derive(Debug)]
pub struct Context {
    inner: CUcontext,
}

// Safety: a driver context may be made current on, and used from, any thread.
unsafe impl Send for Context {}
unsafe impl Sync for Context {}

impl Context {
    /// Initialises the driver API and creates a context for device `ordinal`.
    ///
    /// **The context must be kept alive for as long as memory from the device is in use.**
    #[must_use = "The CUDA Context must be kept alive or errors will be issued for any CUDA function that is run"]
    pub fn quick_init(ordinal: u32) -> CudaResult<Self> {
        use cust::context::ContextFlags;

        cust::init(cust::CudaFlags::empty())?;
        let device = cust::device::Device::get_device(ordinal)?;

        let flags = ContextFlags::MAP_HOST | ContextFlags::SCHED_AUTO;

        unsafe {
            let mut ctx: CUcontext = std::ptr::null_mut();
            cust_raw::cuCtxCreate_v2(&mut ctx as *mut CUcontext, flags.bits(), device.as_raw())
                .to_cuda_result()?;
            Ok(Self { inner: ctx })
        }
    }

    /// Binds this context to the calling thread.
    pub fn make_current(&self) -> CudaResult<()> {
        unsafe { cust_raw::cuCtxSetCurrent(self.inner).to_cuda_result() }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.inner.is_null() {
            return;
        }

        unsafe {
            let inner = std::mem::replace(&mut self.inner, std::ptr::null_mut());
            cust_raw::cuCtxDestroy_v2(inner);
        }
    }
}

/// Device memory on a CUDA enabled GPU.
///
/// The device owns a context for its ordinal and makes it current on the
/// calling thread before every driver call, so allocations and copies work
/// from any thread.
#[derive(Debug, Clone)]
pub struct Cuda {
    ordinal: i32,
    ctx: Arc<Context>,
}

impl Cuda {
    pub fn new(ordinal: i32) -> Result<Self> {
        let raw = u32::try_from(ordinal).map_err(|_| Error::InvalidDevice {
            device: format!("cuda:{ordinal}"),
        })?;
        let ctx = Context::quick_init(raw)?;
        tracing::debug!(ordinal, "cuda context created");
        Ok(Self {
            ordinal,
            ctx: Arc::new(ctx),
        })
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }
}

impl Device for Cuda {
    fn kind(&self) -> MemoryKind {
        MemoryKind::Device
    }

    fn id(&self) -> i32 {
        self.ordinal
    }

    fn name(&self) -> String {
        format!("cuda:{}", self.ordinal)
    }

    fn allocate(&self, byte_len: usize) -> Result<Arc<dyn Allocation>> {
        let mut ptr: CUdeviceptr = 0;
        if byte_len != 0 {
            self.ctx.make_current()?;
            unsafe { cust_raw::cuMemAlloc_v2(&mut ptr, byte_len).to_cuda_result()? };
        }
        Ok(Arc::new(CudaAllocation {
            ptr,
            len: byte_len,
            ctx: Arc::clone(&self.ctx),
        }))
    }
}

/// One `cuMemAlloc` allocation. Holds its context so the memory can be freed
/// after the device itself is gone.
#[derive(Debug)]
pub struct CudaAllocation {
    ptr: CUdeviceptr,
    len: usize,
    ctx: Arc<Context>,
}

impl CudaAllocation {
    fn at(&self, offset: usize) -> CUdeviceptr {
        self.ptr + offset as CUdeviceptr
    }
}

impl Drop for CudaAllocation {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        let freed = self
            .ctx
            .make_current()
            .and_then(|()| unsafe { cust_raw::cuMemFree_v2(self.ptr).to_cuda_result() });
        if let Err(err) = freed {
            tracing::error!(%err, bytes = self.len, "cuMemFree failed");
        }
    }
}

impl Allocation for CudaAllocation {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_from_host(&self, offset: usize, from: &[u8]) -> Result<()> {
        if from.is_empty() {
            return Ok(());
        }
        self.ctx.make_current()?;
        // Safety: the caller bounds checked offset + from.len() against self.len
        unsafe {
            cust_raw::cuMemcpyHtoD_v2(self.at(offset), from.as_ptr().cast::<c_void>(), from.len())
                .to_cuda_result()?;
        }
        Ok(())
    }

    fn copy_to_host(&self, offset: usize, to: &mut [u8]) -> Result<()> {
        if to.is_empty() {
            return Ok(());
        }
        self.ctx.make_current()?;
        // Safety: the caller bounds checked offset + to.len() against self.len
        unsafe {
            cust_raw::cuMemcpyDtoH_v2(to.as_mut_ptr().cast::<c_void>(), self.at(offset), to.len())
                .to_cuda_result()?;
        }
        Ok(())
    }

    fn copy(
        &self,
        offset: usize,
        from: &dyn Allocation,
        from_offset: usize,
        len: usize,
    ) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        match from.as_any().downcast_ref::<CudaAllocation>() {
            Some(from) => {
                self.ctx.make_current()?;
                unsafe {
                    cust_raw::cuMemcpyDtoD_v2(self.at(offset), from.at(from_offset), len)
                        .to_cuda_result()?;
                }
                Ok(())
            }
            None => {
                let mut staging = vec![0; len];
                from.copy_to_host(from_offset, &mut staging)?;
                self.copy_from_host(offset, &staging)
            }
        }
    }

    fn ipc_handle(&self) -> Option<IpcMemHandle> {
        if self.len == 0 {
            return None;
        }
        let mut handle = cust_raw::CUipcMemHandle { reserved: [0; 64] };
        let res = self.ctx.make_current().and_then(|()| unsafe {
            cust_raw::cuIpcGetMemHandle(&mut handle, self.ptr).to_cuda_result()
        });
        match res {
            Ok(()) => Some(IpcMemHandle(handle.reserved.map(|b| b as u8))),
            Err(err) => {
                tracing::warn!(%err, "cuIpcGetMemHandle failed");
                None
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) trait ToCudaResult {
    fn to_cuda_result(self) -> CudaResult<()>;
}

impl ToCudaResult for cust_raw::cudaError_enum {
    fn to_cuda_result(self) -> CudaResult<()> {
        use cust_raw::cudaError_enum;
        match self {
            cudaError_enum::CUDA_SUCCESS => Ok(()),
            cudaError_enum::CUDA_ERROR_INVALID_VALUE => Err(CudaError::InvalidValue),
            cudaError_enum::CUDA_ERROR_OUT_OF_MEMORY => Err(CudaError::OutOfMemory),
            cudaError_enum::CUDA_ERROR_NOT_INITIALIZED => Err(CudaError::NotInitialized),
            cudaError_enum::CUDA_ERROR_DEINITIALIZED => Err(CudaError::Deinitialized),
            cudaError_enum::CUDA_ERROR_NO_DEVICE => Err(CudaError::NoDevice),
            cudaError_enum::CUDA_ERROR_INVALID_DEVICE => Err(CudaError::InvalidDevice),
            cudaError_enum::CUDA_ERROR_INVALID_CONTEXT => Err(CudaError::InvalidContext),
            cudaError_enum::CUDA_ERROR_INVALID_HANDLE => Err(CudaError::InvalidHandle),
            cudaError_enum::CUDA_ERROR_ILLEGAL_ADDRESS => Err(CudaError::IllegalAddress),
            cudaError_enum::CUDA_ERROR_NOT_PERMITTED => Err(CudaError::NotPermitted),
            cudaError_enum::CUDA_ERROR_NOT_SUPPORTED => Err(CudaError::NotSupported),
            _ => Err(CudaError::UnknownError),
        }
    }
}
