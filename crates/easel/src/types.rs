use std::fmt;

use wgpu::naga::ShaderStage;

/// Adapter selection hint handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerProfile {
    /// Prefer an integrated/low-power adapter.
    Low,
    /// Prefer a discrete/high-performance adapter.
    High,
}

impl PowerProfile {
    pub(crate) fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            PowerProfile::Low => wgpu::PowerPreference::LowPower,
            PowerProfile::High => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Immutable configuration consumed once at construction.
///
/// `antialiasing` toggles the offscreen multisampled color target plus the
/// per-pass resolve into the swap image; `support_compute` decides whether
/// `end_frame` tears down the compute pass and whether `dispatch` is ever
/// meaningful for the session.
#[derive(Debug, Clone)]
pub struct GpuOptions {
    /// Adapter power preference.
    pub power_preference: PowerProfile,

    /// Features requested from the logical device.
    ///
    /// Favor an empty set for portability unless a feature is strictly
    /// necessary.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Swap format to bind the presentation target with.
    ///
    /// `None` selects an sRGB format among the target's capabilities.
    pub swap_format: Option<wgpu::TextureFormat>,

    /// Render into an offscreen multisampled target and resolve per pass.
    pub antialiasing: bool,

    /// MSAA sample count used when `antialiasing` is set (clamped to what
    /// the device supports for the swap format).
    pub sample_count: u32,

    /// Whether this session records and submits compute work.
    pub support_compute: bool,

    /// Present mode (swap behavior). FIFO is broadly supported.
    pub present_mode: wgpu::PresentMode,

    /// Desired maximum frame latency for the swapchain; a hint.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            power_preference: PowerProfile::High,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            swap_format: None,
            antialiasing: false,
            sample_count: 4,
            support_compute: true,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
        }
    }
}

/// Shader stage a source string compiles as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Vertex,
    Fragment,
    Compute,
}

impl StageKind {
    pub(crate) fn to_naga(self) -> ShaderStage {
        match self {
            StageKind::Vertex => ShaderStage::Vertex,
            StageKind::Fragment => ShaderStage::Fragment,
            StageKind::Compute => ShaderStage::Compute,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
            StageKind::Compute => f.write_str("compute"),
        }
    }
}

/// One shader stage: GLSL source plus the defines prepended ahead of it.
///
/// The fixed version header and the define block are injected by this layer
/// before the text reaches the compiler; sources should not carry their own
/// `#version` (a leading one is stripped).
#[derive(Debug, Clone, Default)]
pub struct StageDesc {
    pub source: String,
    pub defines: Vec<(String, String)>,
}

impl StageDesc {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            defines: Vec::new(),
        }
    }
}

/// Vertex buffer layout description owned by the caller.
#[derive(Debug, Clone)]
pub struct VertexBufferDesc {
    pub stride: wgpu::BufferAddress,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

/// Description used to compile a render pipeline on first use of a name.
///
/// Rasterization, depth/stencil, and color-target state are merged over the
/// layer's documented defaults when absent. A description missing either
/// stage is "not ready": draws referencing it are skipped, not errors.
#[derive(Debug, Clone, Default)]
pub struct RenderPipelineDesc {
    pub vertex: Option<StageDesc>,
    pub fragment: Option<StageDesc>,
    pub vertex_buffers: Vec<VertexBufferDesc>,
    /// Explicit bind group layouts; empty derives the layout from the shaders.
    pub bind_group_layouts: Vec<wgpu::BindGroupLayout>,
    pub primitive: Option<wgpu::PrimitiveState>,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
    pub targets: Option<Vec<Option<wgpu::ColorTargetState>>>,
}

/// Description used to compile a compute pipeline on first use of a name.
///
/// Taken as-is; no defaults are merged.
#[derive(Debug, Clone, Default)]
pub struct ComputePipelineDesc {
    pub stage: StageDesc,
    /// Explicit bind group layouts; empty derives the layout from the shader.
    pub bind_group_layouts: Vec<wgpu::BindGroupLayout>,
}

/// Index buffer binding for indexed draws.
#[derive(Debug, Clone)]
pub struct IndexBinding {
    pub buffer: wgpu::Buffer,
    pub offset: wgpu::BufferAddress,
    pub format: wgpu::IndexFormat,
}

/// Vertex buffer binding at one slot.
#[derive(Debug, Clone)]
pub struct VertexBinding {
    pub buffer: wgpu::Buffer,
    pub offset: wgpu::BufferAddress,
}

/// Vertex/index inputs bound as a group.
///
/// `buffers` occupies consecutive slots starting at `first_slot`; `None`
/// holes are skipped without disturbing the slot numbering.
#[derive(Debug, Clone, Default)]
pub struct VertexInputs {
    pub index: Option<IndexBinding>,
    pub first_slot: u32,
    pub buffers: Vec<Option<VertexBinding>>,
}
