//! A thin frame/pipeline orchestration layer over `wgpu`.
//!
//! The crate manages the pieces of a real-time rendering or compute
//! session that have awkward lifetimes under the raw API: the rotating
//! swap image, the multisampled color target and its per-pass resolve, the
//! depth/stencil target, transient upload buffers that must outlive the
//! submission that references them, and pipeline objects cached by name.
//!
//! The flow per frame:
//!
//! ```text
//!   Gpu::begin_frame ─▶ three command streams (upload, render, compute)
//!        │
//!        ├─ clear / draw / bind / dispatch / bundles  (Command Surface)
//!        ▼
//!   Gpu::end_frame ──▶ submit [upload, render, compute] ─▶ release staging ─▶ present
//! ```
//!
//! Shader stages are plain GLSL strings; the layer prepends its version
//! header and define block and hands them to wgpu's GLSL frontend. A
//! pipeline description missing a stage is not an error: draws that
//! reference it are skipped until both stages are present, which keeps
//! incremental setup code free of ordering ceremony.

mod compile;
mod error;
mod gpu;
mod types;

pub use error::GpuError;
pub use gpu::{AdapterProfile, Gpu, OffscreenTarget, PipelineStats, PresentTarget, WindowTarget};
pub use types::{
    ComputePipelineDesc, GpuOptions, IndexBinding, PowerProfile, RenderPipelineDesc, StageDesc,
    StageKind, VertexBinding, VertexBufferDesc, VertexInputs,
};

// The wgpu types embedded in descriptors and bindings are part of this
// crate's API surface.
pub use wgpu;
