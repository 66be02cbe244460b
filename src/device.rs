use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::OnceLock,
};

use burn::backend::wgpu::{
    init_sync, AutoGraphicsApi, GraphicsApi, MemoryConfiguration, RuntimeOptions, WgpuDevice,
};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    DiscreteGpu,
    IntegratedGpu,
    VirtualGpu,
    Cpu,
    Other,
}

impl DeviceKind {
    pub fn is_gpu(self) -> bool {
        matches!(
            self,
            DeviceKind::DiscreteGpu | DeviceKind::IntegratedGpu | DeviceKind::VirtualGpu
        )
    }
}

impl From<wgpu::DeviceType> for DeviceKind {
    fn from(device_type: wgpu::DeviceType) -> Self {
        match device_type {
            wgpu::DeviceType::DiscreteGpu => DeviceKind::DiscreteGpu,
            wgpu::DeviceType::IntegratedGpu => DeviceKind::IntegratedGpu,
            wgpu::DeviceType::VirtualGpu => DeviceKind::VirtualGpu,
            wgpu::DeviceType::Cpu => DeviceKind::Cpu,
            wgpu::DeviceType::Other => DeviceKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Position among adapters of the same kind.
    pub index: usize,
    pub name: String,
    pub kind: DeviceKind,
    pub backend: String,
}

/// Source of accelerators and the knob that lets them grow memory on demand.
pub trait DeviceProvider {
    fn physical_devices(&self) -> Vec<DeviceInfo>;

    fn enable_memory_growth(&self, device: &DeviceInfo) -> Result<()>;
}

#[derive(Debug)]
pub struct DeviceReport {
    pub physical: Vec<DeviceInfo>,
    pub logical: usize,
    pub error: Option<Error>,
}

impl fmt::Display for DeviceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.physical.is_empty() {
            return writeln!(f, "No GPUs available. Training will run on CPU.");
        }

        if let Some(err) = &self.error {
            return writeln!(f, "Error setting memory growth: {err}");
        }

        writeln!(
            f,
            "{} Physical GPUs, {} Logical GPUs available.",
            self.physical.len(),
            self.logical
        )?;
        for (i, device) in self.physical.iter().enumerate() {
            writeln!(f, "  GPU {i}: {}", device.name)?;
        }

        Ok(())
    }
}

/// Runs accelerator setup at most once and keeps the outcome.
pub struct DeviceProbe<P> {
    provider: P,
    report: OnceLock<DeviceReport>,
}

impl<P: DeviceProvider> DeviceProbe<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            report: OnceLock::new(),
        }
    }

    pub fn initialize(&self) -> &DeviceReport {
        self.report.get_or_init(|| self.configure())
    }

    fn configure(&self) -> DeviceReport {
        let physical: Vec<_> = self
            .provider
            .physical_devices()
            .into_iter()
            .filter(|device| device.kind.is_gpu())
            .collect();

        tracing::info!(gpus = physical.len(), "probed accelerators");

        let mut logical = 0;
        let mut error = None;
        for device in &physical {
            match self.provider.enable_memory_growth(device) {
                Ok(()) => {
                    tracing::debug!(name = %device.name, backend = %device.backend, "memory growth enabled");
                    logical += 1;
                }
                Err(err) => {
                    tracing::error!(name = %device.name, error = %err, "memory growth failed");
                    error = Some(err);
                    break;
                }
            }
        }

        DeviceReport {
            physical,
            logical,
            error,
        }
    }
}

#[derive(Debug, Default)]
pub struct WgpuProvider;

impl WgpuProvider {
    fn wgpu_device(device: &DeviceInfo) -> WgpuDevice {
        match device.kind {
            DeviceKind::DiscreteGpu => WgpuDevice::DiscreteGpu(device.index),
            DeviceKind::IntegratedGpu => WgpuDevice::IntegratedGpu(device.index),
            DeviceKind::VirtualGpu => WgpuDevice::VirtualGpu(device.index),
            DeviceKind::Cpu | DeviceKind::Other => WgpuDevice::Cpu,
        }
    }
}

impl DeviceProvider for WgpuProvider {
    fn physical_devices(&self) -> Vec<DeviceInfo> {
        // burn only selects adapters from the auto-selected backend, so
        // enumerating any other backend would count the same GPU twice.
        let backend = AutoGraphicsApi::backend();
        let adapters = wgpu::Instance::default()
            .enumerate_adapters(backend.into())
            .into_iter()
            .map(|adapter| {
                let info = adapter.get_info();
                (info.name, info.device_type, info.backend)
            });

        number_adapters(adapters, backend)
    }

    fn enable_memory_growth(&self, device: &DeviceInfo) -> Result<()> {
        let wgpu_device = Self::wgpu_device(device);
        let options = RuntimeOptions {
            memory_config: MemoryConfiguration::SubSlices,
            ..Default::default()
        };

        // The runtime panics when a device was already initialized elsewhere.
        catch_quietly(|| {
            let _ = init_sync::<AutoGraphicsApi>(&wgpu_device, options);
        })
        .map_err(|payload| {
            Error::DeviceConfigFailed(format!("{}: {}", device.name, panic_reason(&*payload)))
        })
    }
}

/// Keeps the adapters of `backend` and numbers them per kind, the way burn
/// resolves `WgpuDevice::DiscreteGpu(n)` and friends.
fn number_adapters(
    adapters: impl IntoIterator<Item = (String, wgpu::DeviceType, wgpu::Backend)>,
    backend: wgpu::Backend,
) -> Vec<DeviceInfo> {
    let mut devices: Vec<DeviceInfo> = Vec::new();

    for (name, device_type, adapter_backend) in adapters {
        if adapter_backend != backend {
            continue;
        }

        let kind = DeviceKind::from(device_type);
        let index = devices.iter().filter(|device| device.kind == kind).count();
        devices.push(DeviceInfo {
            index,
            name,
            kind,
            backend: format!("{adapter_backend:?}"),
        });
    }

    devices
}

/// Like `catch_unwind`, but without the panic hook writing to stderr.
fn catch_quietly<T>(f: impl FnOnce() -> T) -> std::thread::Result<T> {
    let hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    panic::set_hook(hook);
    result
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("runtime initialization panicked")
}
