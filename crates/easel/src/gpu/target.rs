use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::GpuError;

/// Usage every swap image is bound with: attachable output plus copy
/// source, so frames can be read back.
const SWAP_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::COPY_SRC);

/// Number of images in the offscreen swap ring.
const OFFSCREEN_RING: usize = 3;

/// Presentation-surface boundary.
///
/// The layer only ever sees a rotating set of renderable images: a fresh
/// view per frame via [`acquire`](Self::acquire), handed back through
/// [`present`](Self::present) after submission. Window-backed and
/// offscreen implementations live below; anything that honors the rotation
/// contract can present frames.
pub trait PresentTarget {
    /// Underlying swapchain surface, when one exists, so adapter selection
    /// can require compatibility with it.
    fn raw_surface(&self) -> Option<&wgpu::Surface<'static>> {
        None
    }

    /// Picks the swap format, preferring `requested` when supported.
    fn select_format(
        &mut self,
        adapter: &wgpu::Adapter,
        requested: Option<wgpu::TextureFormat>,
    ) -> Result<wgpu::TextureFormat, GpuError>;

    /// (Re)binds the target to `device` at the given extent. Zero-sized
    /// requests are deferred until a real size arrives.
    fn configure(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        present_mode: wgpu::PresentMode,
        desired_maximum_frame_latency: u32,
    );

    /// Returns a view of the current swap image. The image rotates once per
    /// presented frame; within a frame the same image is handed out.
    fn acquire(&mut self, device: &wgpu::Device) -> Result<wgpu::TextureView, GpuError>;

    /// Presents the image handed out by the last `acquire`, advancing the
    /// rotation. No-op when nothing was acquired.
    fn present(&mut self);
}

/// Swapchain surface created from raw window/display handles.
pub struct WindowTarget {
    surface: wgpu::Surface<'static>,
    caps: Option<wgpu::SurfaceCapabilities>,
    config: Option<wgpu::SurfaceConfiguration>,
    pending: Option<wgpu::SurfaceTexture>,
}

impl WindowTarget {
    /// Wraps a window in a presentation target.
    ///
    /// The caller must keep the window alive for as long as this target is
    /// used; the handles are taken raw.
    pub fn new<T>(instance: &wgpu::Instance, window: &T) -> Result<Self, GpuError>
    where
        T: HasWindowHandle + HasDisplayHandle,
    {
        let window_handle = window
            .window_handle()
            .map_err(|err| GpuError::Init(format!("failed to acquire window handle: {err}")))?;
        let display_handle = window
            .display_handle()
            .map_err(|err| GpuError::Init(format!("failed to acquire display handle: {err}")))?;

        // SAFETY: the raw handles stay valid for the lifetime of the window,
        // which the caller guarantees outlives this target.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .map_err(|err| GpuError::Init(format!("failed to create rendering surface: {err}")))?;

        Ok(Self {
            surface,
            caps: None,
            config: None,
            pending: None,
        })
    }
}

impl PresentTarget for WindowTarget {
    fn raw_surface(&self) -> Option<&wgpu::Surface<'static>> {
        Some(&self.surface)
    }

    fn select_format(
        &mut self,
        adapter: &wgpu::Adapter,
        requested: Option<wgpu::TextureFormat>,
    ) -> Result<wgpu::TextureFormat, GpuError> {
        let caps = self.surface.get_capabilities(adapter);
        if caps.formats.is_empty() {
            return Err(GpuError::Init(
                "surface reports no supported formats".to_string(),
            ));
        }

        let format = match requested {
            Some(format) if caps.formats.contains(&format) => format,
            Some(format) => {
                let fallback = caps.formats[0];
                tracing::warn!(
                    ?format,
                    ?fallback,
                    "requested swap format unsupported by the surface; falling back"
                );
                fallback
            }
            None => caps
                .formats
                .iter()
                .copied()
                .find(|format| format.is_srgb())
                .unwrap_or(caps.formats[0]),
        };

        self.caps = Some(caps);
        Ok(format)
    }

    fn configure(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        present_mode: wgpu::PresentMode,
        desired_maximum_frame_latency: u32,
    ) {
        if width == 0 || height == 0 {
            return;
        }

        let (usage, present_mode, alpha_mode) = match &self.caps {
            Some(caps) => {
                let usage = if caps.usages.contains(wgpu::TextureUsages::COPY_SRC) {
                    SWAP_USAGE
                } else {
                    tracing::warn!(
                        "surface does not advertise COPY_SRC; frame readback will be unavailable"
                    );
                    wgpu::TextureUsages::RENDER_ATTACHMENT
                };
                let present_mode = if caps.present_modes.contains(&present_mode) {
                    present_mode
                } else {
                    caps.present_modes[0]
                };
                (usage, present_mode, caps.alpha_modes[0])
            }
            None => (
                wgpu::TextureUsages::RENDER_ATTACHMENT,
                present_mode,
                wgpu::CompositeAlphaMode::Auto,
            ),
        };

        let config = wgpu::SurfaceConfiguration {
            usage,
            format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: desired_maximum_frame_latency.clamp(1, 3),
        };
        self.surface.configure(device, &config);
        self.config = Some(config);
    }

    fn acquire(&mut self, device: &wgpu::Device) -> Result<wgpu::TextureView, GpuError> {
        // An unpresented image from an abandoned frame is discarded.
        drop(self.pending.take());

        let texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                tracing::warn!("surface lost or outdated; reconfiguring");
                if let Some(config) = &self.config {
                    self.surface.configure(device, config);
                }
                self.surface.get_current_texture()?
            }
            Err(err) => return Err(GpuError::Surface(err)),
        };

        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.pending = Some(texture);
        Ok(view)
    }

    fn present(&mut self) {
        if let Some(texture) = self.pending.take() {
            texture.present();
        }
    }
}

/// Headless presentation target: a small ring of textures standing in for
/// the swapchain, with the same attachable + copy-source usage so rendered
/// frames can be read back.
#[derive(Default)]
pub struct OffscreenTarget {
    ring: Vec<wgpu::Texture>,
    cursor: usize,
}

impl OffscreenTarget {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresentTarget for OffscreenTarget {
    fn select_format(
        &mut self,
        _adapter: &wgpu::Adapter,
        requested: Option<wgpu::TextureFormat>,
    ) -> Result<wgpu::TextureFormat, GpuError> {
        Ok(requested.unwrap_or(wgpu::TextureFormat::Rgba8UnormSrgb))
    }

    fn configure(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        _present_mode: wgpu::PresentMode,
        _desired_maximum_frame_latency: u32,
    ) {
        for texture in self.ring.drain(..) {
            texture.destroy();
        }
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        self.ring = (0..OFFSCREEN_RING)
            .map(|_| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("offscreen swap image"),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: SWAP_USAGE,
                    view_formats: &[],
                })
            })
            .collect();
        self.cursor = 0;
    }

    fn acquire(&mut self, _device: &wgpu::Device) -> Result<wgpu::TextureView, GpuError> {
        let texture = self
            .ring
            .get(self.cursor)
            .ok_or(GpuError::InvalidState("offscreen target is not configured"))?;
        Ok(texture.create_view(&wgpu::TextureViewDescriptor::default()))
    }

    fn present(&mut self) {
        if !self.ring.is_empty() {
            self.cursor = (self.cursor + 1) % self.ring.len();
        }
    }
}
