use wgpu::TextureFormatFeatureFlags;

use crate::error::GpuError;
use crate::gpu::target::PresentTarget;
use crate::types::GpuOptions;

/// Identity of the selected adapter, kept for logging and the software
/// rasterizer heuristics.
#[derive(Debug, Clone)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
}

impl AdapterProfile {
    fn from_wgpu(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
        }
    }

    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
            || self.name.to_lowercase().contains("llvmpipe")
            || self.name.to_lowercase().contains("swiftshader")
    }
}

/// Owns the wgpu core objects and the presentation target binding.
///
/// Created once at initialization; the device handle is immutable
/// afterwards and every GPU object creation routes through it.
pub(crate) struct GpuContext {
    _instance: wgpu::Instance,
    target: Box<dyn PresentTarget>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    swap_format: wgpu::TextureFormat,
    sample_count: u32,
    present_mode: wgpu::PresentMode,
    desired_maximum_frame_latency: u32,
    profile: AdapterProfile,
}

impl GpuContext {
    pub fn create_instance() -> wgpu::Instance {
        // All backends, so wgpu picks the optimal platform backend.
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        })
    }

    /// Requests the adapter and device, then binds the presentation target.
    ///
    /// This is the layer's only blocking point: the adapter/device futures
    /// are resolved here, once, before any frame may begin.
    pub fn new(
        instance: wgpu::Instance,
        mut target: Box<dyn PresentTarget>,
        options: &GpuOptions,
        width: u32,
        height: u32,
    ) -> Result<Self, GpuError> {
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: options.power_preference.to_wgpu(),
            compatible_surface: target.raw_surface(),
            force_fallback_adapter: false,
        }))
        .map_err(|err| GpuError::Init(format!("no suitable GPU adapter: {err}")))?;

        let profile = AdapterProfile::from_wgpu(&adapter.get_info());
        tracing::debug!(
            name = %profile.name,
            backend = ?profile.backend,
            device_type = ?profile.device_type,
            is_software = profile.is_software(),
            "selected GPU adapter"
        );

        let swap_format = target.select_format(&adapter, options.swap_format)?;
        let sample_count = effective_sample_count(&adapter, &profile, swap_format, options);

        let mut required_features = options.required_features;
        if sample_count > 4 {
            required_features |= wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        }

        let (device, queue) =
            pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
                label: Some("easel device"),
                required_features,
                required_limits: options.required_limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::default(),
            }))
            .map_err(|err| GpuError::Init(format!("failed to create GPU device: {err}")))?;

        target.configure(
            &device,
            swap_format,
            width,
            height,
            options.present_mode,
            options.desired_maximum_frame_latency,
        );

        Ok(Self {
            _instance: instance,
            target,
            device,
            queue,
            swap_format,
            sample_count,
            present_mode: options.present_mode,
            desired_maximum_frame_latency: options.desired_maximum_frame_latency,
            profile,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn swap_format(&self) -> wgpu::TextureFormat {
        self.swap_format
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn profile(&self) -> &AdapterProfile {
        &self.profile
    }

    /// Rebinds the presentation target after a size change.
    ///
    /// Zero-sized requests are deferred until a real size arrives.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.target.configure(
            &self.device,
            self.swap_format,
            width,
            height,
            self.present_mode,
            self.desired_maximum_frame_latency,
        );
    }

    /// Fresh view of the current swap image.
    pub fn acquire(&mut self) -> Result<wgpu::TextureView, GpuError> {
        self.target.acquire(&self.device)
    }

    /// Presents the acquired swap image, if any, advancing the rotation.
    pub fn present(&mut self) {
        self.target.present();
    }
}

/// Clamps the requested MSAA setting to what the device supports for the
/// swap format; multisampling also requires resolve support and is demoted
/// on software rasterizers.
fn effective_sample_count(
    adapter: &wgpu::Adapter,
    profile: &AdapterProfile,
    format: wgpu::TextureFormat,
    options: &GpuOptions,
) -> u32 {
    if !options.antialiasing {
        return 1;
    }

    let format_features = adapter.get_texture_format_features(format);
    let supported = format_features.flags.supported_sample_counts();
    let requested = options.sample_count.max(1);

    let mut sample_count = if supported.contains(&requested) {
        requested
    } else {
        let fallback = supported
            .iter()
            .copied()
            .filter(|&count| count <= requested)
            .max()
            .unwrap_or(1);
        tracing::warn!(
            requested,
            fallback,
            ?supported,
            "requested MSAA sample count not supported; falling back"
        );
        fallback
    };

    if sample_count > 1
        && !format_features
            .flags
            .contains(TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE)
    {
        tracing::warn!(
            ?format,
            "swap format does not support MSAA resolve; disabling MSAA"
        );
        sample_count = 1;
    }

    if sample_count > 1 && profile.is_software() {
        tracing::warn!(
            sample_count,
            "software rasterizer detected; disabling MSAA for performance"
        );
        sample_count = 1;
    }

    sample_count
}
