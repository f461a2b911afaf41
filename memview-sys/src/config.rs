//! Selection of the device that fresh allocations land on.
//!
//! # Environment Variables
//!
//! - `MEMVIEW_DEVICE`: `cpu`, `sim`, `sim:N`, `cuda` or `cuda:N` (default `sim:0`)
//! - `MEMVIEW_DEVICE_LIMIT`: optional byte limit for `sim` devices

use std::{fmt, str::FromStr, sync::Arc};

use once_cell::sync::OnceCell;

use crate::{
    device::{cpu::Cpu, sim::Sim, Device},
    error::{Error, Result},
};

const DEVICE_ENV: &str = "MEMVIEW_DEVICE";
const DEVICE_LIMIT_ENV: &str = "MEMVIEW_DEVICE_LIMIT";

static DEFAULT_DEVICE: OnceCell<Arc<dyn Device>> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceSpec {
    Cpu,
    Sim { id: i32 },
    Cuda { id: i32 },
}

impl Default for DeviceSpec {
    fn default() -> Self {
        DeviceSpec::Sim { id: 0 }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSpec::Cpu => f.write_str("cpu"),
            DeviceSpec::Sim { id } => write!(f, "sim:{id}"),
            DeviceSpec::Cuda { id } => write!(f, "cuda:{id}"),
        }
    }
}

impl FromStr for DeviceSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidDevice {
            device: s.to_string(),
        };

        let lower = s.trim().to_ascii_lowercase();
        let (name, id) = match lower.split_once(':') {
            Some((name, id)) => (name, id.parse::<i32>().map_err(|_| invalid())?),
            None => (lower.as_str(), 0),
        };
        if id < 0 {
            return Err(invalid());
        }

        match name {
            "cpu" | "host" => Ok(DeviceSpec::Cpu),
            "sim" => Ok(DeviceSpec::Sim { id }),
            "cuda" | "gpu" => Ok(DeviceSpec::Cuda { id }),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub device: DeviceSpec,
    /// Byte limit applied to `sim` devices.
    pub limit: Option<usize>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let device = match std::env::var(DEVICE_ENV) {
            Ok(spec) => spec.parse()?,
            Err(_) => DeviceSpec::default(),
        };
        let limit = match std::env::var(DEVICE_LIMIT_ENV) {
            Ok(limit) => Some(limit.trim().parse().map_err(|_| Error::InvalidDevice {
                device: format!("{device} with limit {limit:?}"),
            })?),
            Err(_) => None,
        };
        Ok(Self { device, limit })
    }

    pub fn build_device(&self) -> Result<Arc<dyn Device>> {
        match self.device {
            DeviceSpec::Cpu => Ok(Arc::new(Cpu)),
            DeviceSpec::Sim { id } => Ok(match self.limit {
                Some(limit) => Arc::new(Sim::with_limit(id, limit)),
                None => Arc::new(Sim::new(id)),
            }),
            #[cfg(feature = "cuda")]
            DeviceSpec::Cuda { id } => Ok(Arc::new(crate::device::cuda::Cuda::new(id)?)),
            #[cfg(not(feature = "cuda"))]
            DeviceSpec::Cuda { .. } => Err(Error::InvalidDevice {
                device: format!("{} (built without the `cuda` feature)", self.device),
            }),
        }
    }
}

/// The device [`crate::Memory::new`] allocates on, built from the environment on first use.
pub fn default_device() -> Result<Arc<dyn Device>> {
    DEFAULT_DEVICE
        .get_or_try_init(|| {
            let config = Config::from_env()?;
            let device = config.build_device()?;
            tracing::debug!(device = %device.name(), limit = ?config.limit, "default device selected");
            Ok(device)
        })
        .map(Arc::clone)
}
