use std::collections::HashMap;

use crate::compile;
use crate::error::GpuError;
use crate::types::{ComputePipelineDesc, RenderPipelineDesc, StageKind};

/// Formats and sampling the cache compiles against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PipelineEnv {
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
    pub sample_count: u32,
}

/// Number of pipelines held per mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub render: usize,
    pub compute: usize,
}

/// Name-keyed pipeline memoization: two disjoint mappings, one for render
/// and one for compute pipelines, owned here rather than ambient.
///
/// Once a name is cached its pipeline is immutable; later calls return the
/// cached object without looking at the description. There is no
/// invalidation path; reusing a name with a different description is a
/// caller error this layer does not detect.
pub(crate) struct PipelineCache {
    render: HashMap<String, wgpu::RenderPipeline>,
    compute: HashMap<String, wgpu::ComputePipeline>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self {
            render: HashMap::new(),
            compute: HashMap::new(),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            render: self.render.len(),
            compute: self.compute.len(),
        }
    }

    /// Resolves `name`, compiling on first use.
    ///
    /// Returns `Ok(None)` while the description is missing its vertex or
    /// fragment stage: the pipeline is not ready and the draw should be
    /// skipped. Compilation failures leave the name uncached.
    pub fn get_or_create_render(
        &mut self,
        device: &wgpu::Device,
        name: &str,
        desc: &RenderPipelineDesc,
        env: &PipelineEnv,
    ) -> Result<Option<wgpu::RenderPipeline>, GpuError> {
        if let Some(pipeline) = self.render.get(name) {
            return Ok(Some(pipeline.clone()));
        }

        let (Some(vertex), Some(fragment)) = (&desc.vertex, &desc.fragment) else {
            return Ok(None);
        };

        let vertex_module =
            compile::create_shader_module(device, name, StageKind::Vertex, vertex)?;
        let fragment_module =
            compile::create_shader_module(device, name, StageKind::Fragment, fragment)?;

        let layout = explicit_layout(device, name, &desc.bind_group_layouts);
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = desc
            .vertex_buffers
            .iter()
            .map(|buffer| wgpu::VertexBufferLayout {
                array_stride: buffer.stride,
                step_mode: buffer.step_mode,
                attributes: &buffer.attributes,
            })
            .collect();

        let targets = match &desc.targets {
            Some(targets) => targets.clone(),
            None => vec![Some(default_color_target(env.color_format))],
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(name),
            layout: layout.as_ref(),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: desc.primitive.unwrap_or_else(default_primitive),
            depth_stencil: Some(
                desc.depth_stencil
                    .clone()
                    .unwrap_or_else(|| default_depth_stencil(env.depth_format)),
            ),
            multisample: wgpu::MultisampleState {
                count: env.sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        tracing::debug!(name, sample_count = env.sample_count, "render pipeline compiled");
        self.render.insert(name.to_string(), pipeline.clone());
        Ok(Some(pipeline))
    }

    /// Resolves `name`, compiling on first use. The descriptor is taken
    /// as-is; same memoization and sharp edge as the render mapping.
    pub fn get_or_create_compute(
        &mut self,
        device: &wgpu::Device,
        name: &str,
        desc: &ComputePipelineDesc,
    ) -> Result<wgpu::ComputePipeline, GpuError> {
        if let Some(pipeline) = self.compute.get(name) {
            return Ok(pipeline.clone());
        }

        let module = compile::create_shader_module(device, name, StageKind::Compute, &desc.stage)?;
        let layout = explicit_layout(device, name, &desc.bind_group_layouts);

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(name),
            layout: layout.as_ref(),
            module: &module,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        tracing::debug!(name, "compute pipeline compiled");
        self.compute.insert(name.to_string(), pipeline.clone());
        Ok(pipeline)
    }
}

fn explicit_layout(
    device: &wgpu::Device,
    name: &str,
    bind_group_layouts: &[wgpu::BindGroupLayout],
) -> Option<wgpu::PipelineLayout> {
    if bind_group_layouts.is_empty() {
        return None;
    }
    let refs: Vec<&wgpu::BindGroupLayout> = bind_group_layouts.iter().collect();
    Some(
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(name),
            bind_group_layouts: &refs,
            push_constant_ranges: &[],
        }),
    )
}

/// Counter-clockwise front face, no culling, no bias.
fn default_primitive() -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: None,
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

/// Depth test always passes with writes off; stencil always passes keeping
/// every value, with full read/write masks.
fn default_depth_stencil(format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
    let face = wgpu::StencilFaceState {
        compare: wgpu::CompareFunction::Always,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op: wgpu::StencilOperation::Keep,
    };
    wgpu::DepthStencilState {
        format,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil: wgpu::StencilState {
            front: face,
            back: face,
            read_mask: !0,
            write_mask: !0,
        },
        bias: wgpu::DepthBiasState::default(),
    }
}

/// One target in the swap format with (one, zero, add) blending and a
/// full write mask: blending effectively off, but well-formed.
fn default_color_target(format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::Zero,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::ColorTargetState {
        format,
        blend: Some(wgpu::BlendState {
            color: component,
            alpha: component,
        }),
        write_mask: wgpu::ColorWrites::ALL,
    }
}
