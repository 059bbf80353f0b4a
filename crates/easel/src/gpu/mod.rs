//! GPU orchestration: the device context, per-frame command streams, and
//! the caches that feed them.
//!
//! - `context` owns the wgpu instance/adapter/device wiring and the
//!   presentation target binding.
//! - `target` is the presentation-surface boundary: a window swapchain or
//!   an offscreen ring, behind one trait.
//! - `attachments` materializes the multisampled color target and the
//!   depth/stencil target, recreating them on resize.
//! - `staging` pools transient upload buffers and destroys them only after
//!   the frame that referenced them has been submitted.
//! - `pipeline` memoizes compiled render/compute pipelines by name.
//! - `bundle` records replayable draw sequences off to the side of the
//!   live pass.
//! - `frame` holds the per-frame state machine: three command streams and
//!   the open render/compute passes.
//! - `state` glues everything together and exposes the `Gpu` facade.

mod attachments;
mod bundle;
mod context;
mod frame;
mod pipeline;
mod staging;
mod state;
mod target;

pub use context::AdapterProfile;
pub use pipeline::PipelineStats;
pub use state::Gpu;
pub use target::{OffscreenTarget, PresentTarget, WindowTarget};
