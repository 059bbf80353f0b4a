use std::ops::Range;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::GpuError;
use crate::gpu::attachments::{AttachmentSet, DEPTH_FORMAT};
use crate::gpu::bundle::{BundleCommand, BundleRecorder};
use crate::gpu::context::{AdapterProfile, GpuContext};
use crate::gpu::frame::{ClearValues, FrameState};
use crate::gpu::pipeline::{PipelineCache, PipelineEnv, PipelineStats};
use crate::gpu::staging::{align_copy_size, StagingPool};
use crate::gpu::target::{OffscreenTarget, PresentTarget, WindowTarget};
use crate::types::{ComputePipelineDesc, GpuOptions, RenderPipelineDesc, VertexInputs};

/// The orchestration facade: device context, attachment cache, pipeline
/// cache, staging pool, and the per-frame command surface.
///
/// All calls within one frame must be sequenced by the caller; nothing here
/// is safe for concurrent mutation. Submission is fire-and-forget per
/// frame; [`end_frame`](Self::end_frame) does not block for completion.
pub struct Gpu {
    ctx: GpuContext,
    attachments: AttachmentSet,
    pipelines: PipelineCache,
    staging: StagingPool,
    frame: Option<FrameState>,
    support_compute: bool,
}

impl Gpu {
    /// Initializes against a window's surface.
    ///
    /// The caller must keep the window alive for the lifetime of the
    /// returned context.
    pub fn for_window<T>(
        window: &T,
        width: u32,
        height: u32,
        options: GpuOptions,
    ) -> Result<Self, GpuError>
    where
        T: HasWindowHandle + HasDisplayHandle,
    {
        let instance = GpuContext::create_instance();
        let target = WindowTarget::new(&instance, window)?;
        Self::with_target(instance, Box::new(target), width, height, options)
    }

    /// Initializes against an offscreen swap ring; no window required.
    pub fn headless(width: u32, height: u32, options: GpuOptions) -> Result<Self, GpuError> {
        let instance = GpuContext::create_instance();
        Self::with_target(
            instance,
            Box::new(OffscreenTarget::new()),
            width,
            height,
            options,
        )
    }

    /// Initializes against a caller-provided presentation target.
    pub fn with_target(
        instance: wgpu::Instance,
        target: Box<dyn PresentTarget>,
        width: u32,
        height: u32,
        options: GpuOptions,
    ) -> Result<Self, GpuError> {
        let ctx = GpuContext::new(instance, target, &options, width, height)?;
        let mut attachments = AttachmentSet::new(ctx.swap_format(), ctx.sample_count());
        attachments.configure(ctx.device(), width, height);
        Ok(Self {
            ctx,
            attachments,
            pipelines: PipelineCache::new(),
            staging: StagingPool::new(),
            frame: None,
            support_compute: options.support_compute,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        self.ctx.device()
    }

    pub fn queue(&self) -> &wgpu::Queue {
        self.ctx.queue()
    }

    pub fn swap_format(&self) -> wgpu::TextureFormat {
        self.ctx.swap_format()
    }

    /// Effective MSAA sample count (1 when antialiasing is off or was
    /// demoted at init).
    pub fn sample_count(&self) -> u32 {
        self.ctx.sample_count()
    }

    pub fn extent(&self) -> (u32, u32) {
        let extent = self.attachments.extent();
        (extent.width, extent.height)
    }

    pub fn supports_compute(&self) -> bool {
        self.support_compute
    }

    /// Identity of the adapter selected at init.
    pub fn adapter_profile(&self) -> &AdapterProfile {
        self.ctx.profile()
    }

    pub fn pipeline_stats(&self) -> PipelineStats {
        self.pipelines.stats()
    }

    /// Rebinds the presentation target and recreates the attachment
    /// textures at the new size. Call between frames.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
        if width == 0 || height == 0 {
            return;
        }
        self.attachments.configure(self.ctx.device(), width, height);
    }

    /// Destroys the owned attachment textures. Idempotent; safe when they
    /// were never created.
    pub fn dispose(&mut self) {
        self.attachments.dispose();
    }

    /// Opens the frame's three command streams (upload, render, compute).
    ///
    /// Valid only when no frame is open.
    pub fn begin_frame(&mut self) -> Result<(), GpuError> {
        if self.frame.is_some() {
            return Err(GpuError::InvalidState(
                "begin_frame while a frame is already open",
            ));
        }
        self.frame = Some(FrameState::new(self.ctx.device()));
        Ok(())
    }

    /// Closes open passes, finishes the three streams in fixed order
    /// (upload, render, compute), submits them as one batch, releases the
    /// frame's staging buffers, and presents the swap image.
    pub fn end_frame(&mut self) -> Result<(), GpuError> {
        let mut frame = self
            .frame
            .take()
            .ok_or(GpuError::InvalidState("end_frame without an open frame"))?;

        if frame.bundle.take().is_some() {
            tracing::warn!("bundle recording still open at end_frame; discarded");
        }
        frame.close_render_pass();
        if self.support_compute {
            frame.close_compute_pass();
        }

        let buffers = frame.finish();
        self.ctx.queue().submit(buffers);
        tracing::trace!(
            staging = self.staging.pending(),
            "frame submitted; releasing transient buffers"
        );
        self.staging.release_deferred();
        self.ctx.present();
        Ok(())
    }

    /// Stages clear values and (re)starts the render pass so they take
    /// effect: load-vs-clear is decided once, at pass open.
    pub fn clear(
        &mut self,
        color: Option<wgpu::Color>,
        depth: Option<f32>,
    ) -> Result<(), GpuError> {
        let frame = self
            .frame
            .as_mut()
            .ok_or(GpuError::InvalidState("clear requires an open frame"))?;
        frame.pending_clear = ClearValues { color, depth };
        if frame.swap_view.is_none() {
            frame.swap_view = Some(self.ctx.acquire()?);
        }
        frame.open_render_pass(&self.attachments)
    }

    /// Starts a render pass, implicitly ending the open one first.
    pub fn begin_render_pass(&mut self) -> Result<(), GpuError> {
        let frame = self
            .frame
            .as_mut()
            .ok_or(GpuError::InvalidState("no frame is open"))?;
        if frame.swap_view.is_none() {
            frame.swap_view = Some(self.ctx.acquire()?);
        }
        frame.open_render_pass(&self.attachments)
    }

    /// Ends the render pass; no-op when none is open.
    pub fn end_render_pass(&mut self) {
        if let Some(frame) = self.frame.as_mut() {
            frame.close_render_pass();
        }
    }

    /// Starts a compute pass, implicitly ending the open one first.
    /// Ignored when compute support is disabled for the session.
    pub fn begin_compute_pass(&mut self) -> Result<(), GpuError> {
        if !self.support_compute {
            tracing::debug!("compute support disabled; compute pass ignored");
            return Ok(());
        }
        let frame = self
            .frame
            .as_mut()
            .ok_or(GpuError::InvalidState("no frame is open"))?;
        frame.open_compute_pass();
        Ok(())
    }

    /// Ends the compute pass; no-op when none is open.
    pub fn end_compute_pass(&mut self) {
        if let Some(frame) = self.frame.as_mut() {
            frame.close_compute_pass();
        }
    }

    /// Opens a bundle recording. While one is open, draw and bind calls
    /// target it instead of the live render pass.
    pub fn start_bundle_recording(&mut self) -> Result<(), GpuError> {
        let color_format = self.ctx.swap_format();
        let sample_count = self.attachments.sample_count();
        let frame = self
            .frame
            .as_mut()
            .ok_or(GpuError::InvalidState("no frame is open"))?;
        if frame.bundle.is_some() {
            return Err(GpuError::InvalidState(
                "a bundle recording is already open",
            ));
        }
        frame.bundle = Some(BundleRecorder::new(color_format, DEPTH_FORMAT, sample_count));
        Ok(())
    }

    /// Finalizes the open recording into a replayable bundle.
    pub fn stop_bundle_recording(&mut self) -> Result<wgpu::RenderBundle, GpuError> {
        let frame = self
            .frame
            .as_mut()
            .ok_or(GpuError::InvalidState("no frame is open"))?;
        let recorder = frame
            .bundle
            .take()
            .ok_or(GpuError::InvalidState("no bundle recording is open"))?;
        Ok(recorder.finish(self.ctx.device()))
    }

    /// Replays prerecorded bundles into the render pass, opening it first
    /// when none is open.
    pub fn execute_bundles(&mut self, bundles: &[wgpu::RenderBundle]) -> Result<(), GpuError> {
        self.ensure_render_pass()?;
        if let Some(frame) = self.frame.as_mut() {
            if let Some(pass) = frame.pass.as_mut() {
                pass.execute_bundles(bundles.iter());
            }
        }
        Ok(())
    }

    /// Issues a non-indexed draw with the named pipeline.
    ///
    /// Targets the open bundle recording if any, else the open render
    /// pass. The pipeline is resolved through the cache; while its
    /// description is missing a stage the draw is skipped silently.
    pub fn draw(
        &mut self,
        vertices: Range<u32>,
        instances: u32,
        name: &str,
        desc: &RenderPipelineDesc,
    ) -> Result<(), GpuError> {
        self.require_draw_target()?;
        let env = self.pipeline_env();
        let Some(pipeline) =
            self.pipelines
                .get_or_create_render(self.ctx.device(), name, desc, &env)?
        else {
            tracing::debug!(name, "draw skipped; pipeline stages are not ready");
            return Ok(());
        };

        let frame = self
            .frame
            .as_mut()
            .ok_or(GpuError::InvalidState("no frame is open"))?;
        if let Some(bundle) = frame.bundle.as_mut() {
            bundle.push(BundleCommand::SetPipeline(pipeline));
            bundle.push(BundleCommand::Draw {
                vertices,
                instances: 0..instances,
            });
        } else if let Some(pass) = frame.pass.as_mut() {
            pass.set_pipeline(&pipeline);
            pass.draw(vertices, 0..instances);
        }
        Ok(())
    }

    /// Issues an indexed draw with the named pipeline. Requires an index
    /// buffer bound to the active target beforehand.
    pub fn draw_indexed(
        &mut self,
        indices: Range<u32>,
        base_vertex: i32,
        instances: u32,
        name: &str,
        desc: &RenderPipelineDesc,
    ) -> Result<(), GpuError> {
        self.require_draw_target()?;
        {
            let frame = self
                .frame
                .as_ref()
                .ok_or(GpuError::InvalidState("no frame is open"))?;
            let index_bound = match &frame.bundle {
                Some(bundle) => bundle.index_bound(),
                None => frame.index_bound,
            };
            if !index_bound {
                return Err(GpuError::InvalidState(
                    "indexed draw requires a bound index buffer",
                ));
            }
        }

        let env = self.pipeline_env();
        let Some(pipeline) =
            self.pipelines
                .get_or_create_render(self.ctx.device(), name, desc, &env)?
        else {
            tracing::debug!(name, "indexed draw skipped; pipeline stages are not ready");
            return Ok(());
        };

        let frame = self
            .frame
            .as_mut()
            .ok_or(GpuError::InvalidState("no frame is open"))?;
        if let Some(bundle) = frame.bundle.as_mut() {
            bundle.push(BundleCommand::SetPipeline(pipeline));
            bundle.push(BundleCommand::DrawIndexed {
                indices,
                base_vertex,
                instances: 0..instances,
            });
        } else if let Some(pass) = frame.pass.as_mut() {
            pass.set_pipeline(&pipeline);
            pass.draw_indexed(indices, base_vertex, 0..instances);
        }
        Ok(())
    }

    /// Binds resource sets at consecutive slots starting at 0, to the open
    /// bundle recording or render pass.
    pub fn set_bind_groups(&mut self, groups: &[wgpu::BindGroup]) -> Result<(), GpuError> {
        let frame = self
            .frame
            .as_mut()
            .ok_or(GpuError::InvalidState("no frame is open"))?;
        if let Some(bundle) = frame.bundle.as_mut() {
            for (slot, group) in groups.iter().enumerate() {
                bundle.push(BundleCommand::SetBindGroup {
                    index: slot as u32,
                    group: group.clone(),
                });
            }
        } else if let Some(pass) = frame.pass.as_mut() {
            for (slot, group) in groups.iter().enumerate() {
                pass.set_bind_group(slot as u32, group, &[]);
            }
        } else {
            return Err(GpuError::InvalidState(
                "bind groups require an open render pass or bundle recording",
            ));
        }
        Ok(())
    }

    /// Binds resource sets on the open compute pass; inert when no compute
    /// pass is open.
    pub fn set_compute_bind_groups(&mut self, groups: &[wgpu::BindGroup]) {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let Some(pass) = frame.compute_pass.as_mut() else {
            tracing::debug!("compute bind groups ignored; no compute pass open");
            return;
        };
        for (slot, group) in groups.iter().enumerate() {
            pass.set_bind_group(slot as u32, group, &[]);
        }
    }

    /// Binds the optional index buffer and the vertex buffers of `inputs`
    /// to the open bundle recording or render pass. Holes in the buffer
    /// sequence are skipped without erroring.
    pub fn bind_vertex_inputs(&mut self, inputs: &VertexInputs) -> Result<(), GpuError> {
        let frame = self
            .frame
            .as_mut()
            .ok_or(GpuError::InvalidState("no frame is open"))?;
        if let Some(bundle) = frame.bundle.as_mut() {
            if let Some(index) = &inputs.index {
                bundle.push(BundleCommand::SetIndexBuffer {
                    buffer: index.buffer.clone(),
                    offset: index.offset,
                    format: index.format,
                });
            }
            for (position, binding) in inputs.buffers.iter().enumerate() {
                let Some(binding) = binding else { continue };
                bundle.push(BundleCommand::SetVertexBuffer {
                    slot: inputs.first_slot + position as u32,
                    buffer: binding.buffer.clone(),
                    offset: binding.offset,
                });
            }
        } else if let Some(pass) = frame.pass.as_mut() {
            if let Some(index) = &inputs.index {
                pass.set_index_buffer(index.buffer.slice(index.offset..), index.format);
                frame.index_bound = true;
            }
            for (position, binding) in inputs.buffers.iter().enumerate() {
                let Some(binding) = binding else { continue };
                pass.set_vertex_buffer(
                    inputs.first_slot + position as u32,
                    binding.buffer.slice(binding.offset..),
                );
            }
        } else {
            return Err(GpuError::InvalidState(
                "vertex inputs require an open render pass or bundle recording",
            ));
        }
        Ok(())
    }

    /// Dispatches the named compute pipeline over the given workgroup
    /// counts. Inert unless a compute pass is open; compute is an
    /// optional capability, not an error path.
    pub fn dispatch(
        &mut self,
        workgroups: [u32; 3],
        name: &str,
        desc: &ComputePipelineDesc,
    ) -> Result<(), GpuError> {
        let Some(frame) = self.frame.as_mut() else {
            tracing::debug!(name, "dispatch ignored; no frame open");
            return Ok(());
        };
        if frame.compute_pass.is_none() {
            tracing::debug!(name, "dispatch ignored; no compute pass open");
            return Ok(());
        }

        let pipeline = self
            .pipelines
            .get_or_create_compute(self.ctx.device(), name, desc)?;
        if let Some(pass) = frame.compute_pass.as_mut() {
            pass.set_pipeline(&pipeline);
            pass.dispatch_workgroups(workgroups[0], workgroups[1], workgroups[2]);
        }
        Ok(())
    }

    /// Constrains rasterization to a rectangle, opening the render pass if
    /// none is open. The rectangle is re-applied on later pass opens.
    pub fn set_scissor(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<(), GpuError> {
        {
            let frame = self
                .frame
                .as_mut()
                .ok_or(GpuError::InvalidState("no frame is open"))?;
            frame.scissor = Some((x, y, width, height));
        }
        self.ensure_render_pass()?;
        if let Some(frame) = self.frame.as_mut() {
            if let Some(pass) = frame.pass.as_mut() {
                pass.set_scissor_rect(x, y, width, height);
            }
        }
        Ok(())
    }

    /// Resets the scissor rectangle to the full extent, opening the render
    /// pass if none is open.
    pub fn clear_scissor(&mut self) -> Result<(), GpuError> {
        let extent = self.attachments.extent();
        {
            let frame = self
                .frame
                .as_mut()
                .ok_or(GpuError::InvalidState("no frame is open"))?;
            frame.scissor = None;
        }
        self.ensure_render_pass()?;
        if let Some(frame) = self.frame.as_mut() {
            if let Some(pass) = frame.pass.as_mut() {
                pass.set_scissor_rect(0, 0, extent.width, extent.height);
            }
        }
        Ok(())
    }

    /// Creates a transient copy-source buffer holding `bytes` and registers
    /// it for release after this frame's submission.
    pub fn stage_bytes(&mut self, bytes: &[u8]) -> Result<wgpu::Buffer, GpuError> {
        if self.frame.is_none() {
            return Err(GpuError::InvalidState("staging requires an open frame"));
        }
        Ok(self.staging.allocate(self.ctx.device(), bytes))
    }

    /// Records a copy of `bytes` into `dst` at `offset` on the upload
    /// stream, through a transient staging buffer.
    ///
    /// The copy size is the aligned rounding of the byte length; `dst`
    /// must have room for it past the offset.
    pub fn upload_buffer(
        &mut self,
        dst: &wgpu::Buffer,
        offset: wgpu::BufferAddress,
        bytes: &[u8],
    ) -> Result<(), GpuError> {
        let frame = self
            .frame
            .as_mut()
            .ok_or(GpuError::InvalidState("upload requires an open frame"))?;
        let staging = self.staging.allocate(self.ctx.device(), bytes);
        frame.copy_on_upload(&staging, dst, offset, align_copy_size(bytes.len() as u64));
        Ok(())
    }

    /// Typed variant of [`upload_buffer`](Self::upload_buffer).
    pub fn upload_slice<T: bytemuck::NoUninit>(
        &mut self,
        dst: &wgpu::Buffer,
        offset: wgpu::BufferAddress,
        data: &[T],
    ) -> Result<(), GpuError> {
        self.upload_buffer(dst, offset, bytemuck::cast_slice(data))
    }

    fn pipeline_env(&self) -> PipelineEnv {
        PipelineEnv {
            color_format: self.ctx.swap_format(),
            depth_format: DEPTH_FORMAT,
            sample_count: self.attachments.sample_count(),
        }
    }

    /// Opens the render pass when neither it nor a bundle recording exists
    /// to receive commands yet.
    fn ensure_render_pass(&mut self) -> Result<(), GpuError> {
        let frame = self
            .frame
            .as_mut()
            .ok_or(GpuError::InvalidState("no frame is open"))?;
        if frame.pass.is_some() {
            return Ok(());
        }
        if frame.swap_view.is_none() {
            frame.swap_view = Some(self.ctx.acquire()?);
        }
        frame.open_render_pass(&self.attachments)
    }

    /// A draw needs the bundle recording or the live render pass; opening
    /// the default pass implicitly is the caller's job via `clear` or an
    /// explicit pass start.
    fn require_draw_target(&self) -> Result<(), GpuError> {
        let frame = self
            .frame
            .as_ref()
            .ok_or(GpuError::InvalidState("no frame is open"))?;
        if frame.bundle.is_none() && frame.pass.is_none() {
            return Err(GpuError::InvalidState(
                "draw requires an open render pass or bundle recording",
            ));
        }
        Ok(())
    }
}
