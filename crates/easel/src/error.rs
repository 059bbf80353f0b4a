use thiserror::Error;

use crate::types::StageKind;

/// Errors surfaced by the orchestration layer.
///
/// Recovery policy lives with the caller: nothing in this crate retries,
/// except the single swapchain reconfigure on a lost/outdated surface that
/// happens before `Surface` is ever returned.
#[derive(Debug, Error)]
pub enum GpuError {
    /// No adapter or logical device could be obtained. Fatal; there is no
    /// built-in retry.
    #[error("GPU initialization failed: {0}")]
    Init(String),

    /// The operation requires frame/pass/bundle state that is not currently
    /// held (e.g. stopping a bundle recording that was never started).
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Shader text failed to compile. The named pipeline is left uncached,
    /// so a corrected description can be retried under the same name.
    #[error("{stage} shader failed to compile: {message}")]
    Compilation {
        stage: StageKind,
        message: String,
    },

    /// Acquiring the swapchain image failed even after the reconfigure
    /// path for lost/outdated surfaces.
    #[error("swapchain image unavailable: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}
