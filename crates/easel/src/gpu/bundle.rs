use std::ops::Range;

/// One buffered bundle command. Resource handles are cloned in; wgpu
/// handles are reference-counted, so the clones keep the resources alive
/// until the bundle is finalized.
#[derive(Debug, Clone)]
pub(crate) enum BundleCommand {
    SetPipeline(wgpu::RenderPipeline),
    SetBindGroup {
        index: u32,
        group: wgpu::BindGroup,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: wgpu::Buffer,
        offset: wgpu::BufferAddress,
    },
    SetIndexBuffer {
        buffer: wgpu::Buffer,
        offset: wgpu::BufferAddress,
        format: wgpu::IndexFormat,
    },
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
}

/// Records a replayable draw sequence off to the side of the live pass.
///
/// Commands are buffered and encoded in one go when the recording stops;
/// the recorder is parameterized up front by the attachment formats and
/// sample count the replay target will have.
pub(crate) struct BundleRecorder {
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    sample_count: u32,
    commands: Vec<BundleCommand>,
    index_bound: bool,
}

impl BundleRecorder {
    pub fn new(
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        Self {
            color_format,
            depth_format,
            sample_count,
            commands: Vec::new(),
            index_bound: false,
        }
    }

    /// Whether an index buffer has been bound since recording started.
    pub fn index_bound(&self) -> bool {
        self.index_bound
    }

    pub fn push(&mut self, command: BundleCommand) {
        if matches!(command, BundleCommand::SetIndexBuffer { .. }) {
            self.index_bound = true;
        }
        self.commands.push(command);
    }

    #[cfg(test)]
    pub fn commands(&self) -> &[BundleCommand] {
        &self.commands
    }

    /// Encodes the buffered sequence and finalizes it into a replayable
    /// bundle.
    pub fn finish(self, device: &wgpu::Device) -> wgpu::RenderBundle {
        let mut encoder =
            device.create_render_bundle_encoder(&wgpu::RenderBundleEncoderDescriptor {
                label: Some("bundle recording"),
                color_formats: &[Some(self.color_format)],
                depth_stencil: Some(wgpu::RenderBundleDepthStencil {
                    format: self.depth_format,
                    depth_read_only: false,
                    stencil_read_only: false,
                }),
                sample_count: self.sample_count,
                multiview: None,
            });

        for command in &self.commands {
            match command {
                BundleCommand::SetPipeline(pipeline) => encoder.set_pipeline(pipeline),
                BundleCommand::SetBindGroup { index, group } => {
                    encoder.set_bind_group(*index, group, &[]);
                }
                BundleCommand::SetVertexBuffer {
                    slot,
                    buffer,
                    offset,
                } => encoder.set_vertex_buffer(*slot, buffer.slice(*offset..)),
                BundleCommand::SetIndexBuffer {
                    buffer,
                    offset,
                    format,
                } => encoder.set_index_buffer(buffer.slice(*offset..), *format),
                BundleCommand::Draw {
                    vertices,
                    instances,
                } => encoder.draw(vertices.clone(), instances.clone()),
                BundleCommand::DrawIndexed {
                    indices,
                    base_vertex,
                    instances,
                } => encoder.draw_indexed(indices.clone(), *base_vertex, instances.clone()),
            }
        }

        encoder.finish(&wgpu::RenderBundleDescriptor {
            label: Some("recorded bundle"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> BundleRecorder {
        BundleRecorder::new(
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Depth24PlusStencil8,
            1,
        )
    }

    #[test]
    fn draws_are_buffered_in_call_order() {
        let mut rec = recorder();
        rec.push(BundleCommand::Draw {
            vertices: 0..3,
            instances: 0..1,
        });
        rec.push(BundleCommand::Draw {
            vertices: 3..9,
            instances: 0..2,
        });

        let commands = rec.commands();
        assert_eq!(commands.len(), 2);
        let BundleCommand::Draw { vertices, .. } = &commands[0] else {
            panic!("expected a draw");
        };
        assert_eq!(*vertices, 0..3);
        let BundleCommand::Draw { instances, .. } = &commands[1] else {
            panic!("expected a draw");
        };
        assert_eq!(*instances, 0..2);
    }

    #[test]
    fn index_binding_is_tracked() {
        let Some((device, _queue)) = crate::testutil::device() else {
            return;
        };
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size: 4,
            usage: wgpu::BufferUsages::INDEX,
            mapped_at_creation: false,
        });

        let mut rec = recorder();
        assert!(!rec.index_bound());
        rec.push(BundleCommand::SetIndexBuffer {
            buffer,
            offset: 0,
            format: wgpu::IndexFormat::Uint16,
        });
        assert!(rec.index_bound());
    }
}
