use crate::error::GpuError;
use crate::gpu::attachments::AttachmentSet;
use crate::gpu::bundle::BundleRecorder;

/// Clear values staged by `clear(...)`; consumed by the next pass open.
/// Load-vs-clear is a per-pass decision made once at open time.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ClearValues {
    pub color: Option<wgpu::Color>,
    pub depth: Option<f32>,
}

/// Per-frame encoding state: the three command streams, the pass state
/// machine, and the bookkeeping the Command Surface routes through.
///
/// The open render/compute passes are stored across calls with their
/// encoder borrow erased (`forget_lifetime`); the state machine guarantees
/// each pass is finalized exactly once, before its stream is finished.
pub(crate) struct FrameState {
    // Passes are declared ahead of their encoders: an abandoned frame must
    // drop the open passes before the streams they record into.
    pub pass: Option<wgpu::RenderPass<'static>>,
    pub compute_pass: Option<wgpu::ComputePass<'static>>,
    upload: wgpu::CommandEncoder,
    render: wgpu::CommandEncoder,
    compute: wgpu::CommandEncoder,
    pub swap_view: Option<wgpu::TextureView>,
    pub bundle: Option<BundleRecorder>,
    pub pending_clear: ClearValues,
    pub scissor: Option<(u32, u32, u32, u32)>,
    pub index_bound: bool,
}

impl FrameState {
    /// Opens the frame's three command streams.
    pub fn new(device: &wgpu::Device) -> Self {
        let descriptor = |label| wgpu::CommandEncoderDescriptor { label: Some(label) };
        Self {
            pass: None,
            compute_pass: None,
            upload: device.create_command_encoder(&descriptor("upload stream")),
            render: device.create_command_encoder(&descriptor("render stream")),
            compute: device.create_command_encoder(&descriptor("compute stream")),
            swap_view: None,
            bundle: None,
            pending_clear: ClearValues::default(),
            scissor: None,
            index_bound: false,
        }
    }

    /// Opens a render pass on the render stream, ending the open one first.
    ///
    /// The color attachment is captured fresh: with multisampling the
    /// offscreen target is rendered into and the swap image becomes the
    /// resolve target; otherwise the swap image is rendered into directly.
    /// Staged clear values are consumed here; a stored scissor rectangle is
    /// re-applied.
    pub fn open_render_pass(&mut self, attachments: &AttachmentSet) -> Result<(), GpuError> {
        self.close_render_pass();

        let swap_view = self
            .swap_view
            .as_ref()
            .ok_or(GpuError::InvalidState("no swap image acquired for this frame"))?;
        let depth_view = attachments
            .depth_view()
            .ok_or(GpuError::InvalidState("attachments are disposed"))?;

        let clear = std::mem::take(&mut self.pending_clear);
        let color_load = match clear.color {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };
        let (depth_load, stencil_load) = match clear.depth {
            Some(depth) => (wgpu::LoadOp::Clear(depth), wgpu::LoadOp::Clear(0)),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };

        let (view, resolve_target) = match attachments.msaa_view() {
            Some(msaa) => (msaa, Some(swap_view)),
            None => (swap_view, None),
        };

        let mut pass = self
            .render
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: stencil_load,
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            })
            .forget_lifetime();

        if let Some((x, y, width, height)) = self.scissor {
            pass.set_scissor_rect(x, y, width, height);
        }

        self.pass = Some(pass);
        self.index_bound = false;
        Ok(())
    }

    /// Finalizes the open render pass; no-op when none is open.
    pub fn close_render_pass(&mut self) {
        // Dropping the pass records its end into the render stream.
        self.pass = None;
    }

    /// Opens a compute pass on the compute stream, ending the open one
    /// first.
    pub fn open_compute_pass(&mut self) {
        self.close_compute_pass();
        let pass = self
            .compute
            .begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("compute pass"),
                timestamp_writes: None,
            })
            .forget_lifetime();
        self.compute_pass = Some(pass);
    }

    /// Finalizes the open compute pass; no-op when none is open.
    pub fn close_compute_pass(&mut self) {
        self.compute_pass = None;
    }

    /// Records a staging copy on the upload stream.
    pub fn copy_on_upload(
        &mut self,
        staging: &wgpu::Buffer,
        dst: &wgpu::Buffer,
        offset: wgpu::BufferAddress,
        size: wgpu::BufferAddress,
    ) {
        self.upload
            .copy_buffer_to_buffer(staging, 0, dst, offset, size);
    }

    /// Finishes the three streams in fixed slot order.
    ///
    /// All passes must be closed first; the returned buffers are submitted
    /// together as one batch.
    pub fn finish(self) -> [wgpu::CommandBuffer; 3] {
        debug_assert!(self.pass.is_none() && self.compute_pass.is_none());
        [
            self.upload.finish(),
            self.render.finish(),
            self.compute.finish(),
        ]
    }
}
