//! Frame lifecycle and command-surface tests against the offscreen
//! presentation target.
//!
//! Every test skips (with a note on stderr) when the environment has no
//! usable GPU adapter.

use std::sync::mpsc::channel;
use std::sync::Once;

use easel::{
    ComputePipelineDesc, Gpu, GpuError, GpuOptions, IndexBinding, RenderPipelineDesc, StageDesc,
    VertexInputs,
};

const TRIANGLE_VERTEX: &str = r"
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

const TRIANGLE_FRAGMENT: &str = r"
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

void main() {
    outColor = vec4(v_uv, 0.25, 1.0);
}
";

const SOLID_FRAGMENT: &str = r"
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

void main() {
    outColor = vec4(1.0, 0.0, 0.0, 1.0);
}
";

const NOOP_COMPUTE: &str = r"
layout(local_size_x = 1) in;

void main() {}
";

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_target(false)
            .try_init();
    });
}

fn headless(width: u32, height: u32, options: GpuOptions) -> Option<Gpu> {
    init_tracing();
    match Gpu::headless(width, height, options) {
        Ok(gpu) => Some(gpu),
        Err(GpuError::Init(reason)) => {
            eprintln!("skipping test: {reason}");
            None
        }
        Err(err) => panic!("unexpected initialization failure: {err}"),
    }
}

fn triangle_desc() -> RenderPipelineDesc {
    RenderPipelineDesc {
        vertex: Some(StageDesc::new(TRIANGLE_VERTEX)),
        fragment: Some(StageDesc::new(TRIANGLE_FRAGMENT)),
        ..RenderPipelineDesc::default()
    }
}

#[test]
fn basic_triangle_frame_caches_one_pipeline() {
    let options = GpuOptions {
        antialiasing: false,
        support_compute: false,
        ..GpuOptions::default()
    };
    let Some(mut gpu) = headless(800, 600, options) else {
        return;
    };

    gpu.begin_frame().unwrap();
    gpu.clear(Some(wgpu::Color::BLACK), Some(1.0)).unwrap();
    gpu.draw(0..3, 1, "basic", &triangle_desc()).unwrap();
    gpu.end_frame().unwrap();

    let stats = gpu.pipeline_stats();
    assert_eq!(stats.render, 1);
    assert_eq!(stats.compute, 0);
}

#[test]
fn memoization_wins_over_later_descriptions() {
    let Some(mut gpu) = headless(256, 256, GpuOptions::default()) else {
        return;
    };

    gpu.begin_frame().unwrap();
    gpu.clear(Some(wgpu::Color::BLACK), None).unwrap();
    gpu.draw(0..3, 1, "basic", &triangle_desc()).unwrap();

    // Same name, different fragment stage: the cached pipeline wins and no
    // second compile happens.
    let replacement = RenderPipelineDesc {
        vertex: Some(StageDesc::new(TRIANGLE_VERTEX)),
        fragment: Some(StageDesc::new(SOLID_FRAGMENT)),
        ..RenderPipelineDesc::default()
    };
    gpu.draw(0..3, 1, "basic", &replacement).unwrap();
    gpu.end_frame().unwrap();

    assert_eq!(gpu.pipeline_stats().render, 1);
}

#[test]
fn incomplete_stage_pair_skips_the_draw() {
    let Some(mut gpu) = headless(128, 128, GpuOptions::default()) else {
        return;
    };

    let not_ready = RenderPipelineDesc {
        vertex: Some(StageDesc::new(TRIANGLE_VERTEX)),
        ..RenderPipelineDesc::default()
    };

    gpu.begin_frame().unwrap();
    gpu.clear(Some(wgpu::Color::BLACK), None).unwrap();
    gpu.draw(0..3, 1, "pending", &not_ready).unwrap();
    gpu.end_frame().unwrap();

    assert_eq!(gpu.pipeline_stats().render, 0);
}

#[test]
fn draw_without_a_pass_is_an_invalid_state() {
    let Some(mut gpu) = headless(128, 128, GpuOptions::default()) else {
        return;
    };

    gpu.begin_frame().unwrap();
    let err = gpu.draw(0..3, 1, "basic", &triangle_desc()).unwrap_err();
    assert!(matches!(err, GpuError::InvalidState(_)));
    gpu.end_frame().unwrap();
}

#[test]
fn frame_lifecycle_is_guarded() {
    let Some(mut gpu) = headless(64, 64, GpuOptions::default()) else {
        return;
    };

    assert!(matches!(gpu.end_frame(), Err(GpuError::InvalidState(_))));
    gpu.begin_frame().unwrap();
    assert!(matches!(gpu.begin_frame(), Err(GpuError::InvalidState(_))));
    gpu.end_frame().unwrap();
}

#[test]
fn empty_frames_still_submit_all_three_streams() {
    let Some(mut gpu) = headless(64, 64, GpuOptions::default()) else {
        return;
    };

    // Nothing recorded: the upload/render/compute streams are still
    // finalized and submitted as one batch every frame.
    for _ in 0..3 {
        gpu.begin_frame().unwrap();
        gpu.end_frame().unwrap();
    }
}

#[test]
fn implicit_pass_switch_closes_the_previous_pass() {
    let Some(mut gpu) = headless(64, 64, GpuOptions::default()) else {
        return;
    };

    gpu.begin_frame().unwrap();
    gpu.clear(Some(wgpu::Color::BLACK), Some(1.0)).unwrap();
    gpu.begin_render_pass().unwrap();
    gpu.begin_render_pass().unwrap();
    gpu.draw(0..3, 1, "basic", &triangle_desc()).unwrap();
    // A mishandled switch would leave an unfinished pass behind and fail
    // validation when the render stream is finalized here.
    gpu.end_frame().unwrap();
}

#[test]
fn dispatch_outside_a_compute_pass_is_inert() {
    let Some(mut gpu) = headless(64, 64, GpuOptions::default()) else {
        return;
    };

    let desc = ComputePipelineDesc {
        stage: StageDesc::new(NOOP_COMPUTE),
        ..ComputePipelineDesc::default()
    };

    gpu.begin_frame().unwrap();
    gpu.dispatch([1, 1, 1], "noop", &desc).unwrap();
    gpu.end_frame().unwrap();
    assert_eq!(gpu.pipeline_stats().compute, 0);

    // With compute support off the pass itself never opens, so dispatch
    // stays inert even after a begin_compute_pass call.
    let options = GpuOptions {
        support_compute: false,
        ..GpuOptions::default()
    };
    let Some(mut gpu) = headless(64, 64, options) else {
        return;
    };
    gpu.begin_frame().unwrap();
    gpu.begin_compute_pass().unwrap();
    gpu.dispatch([1, 1, 1], "noop", &desc).unwrap();
    gpu.end_frame().unwrap();
    assert_eq!(gpu.pipeline_stats().compute, 0);
}

#[test]
fn dispatch_inside_a_compute_pass_compiles_the_pipeline() {
    let Some(mut gpu) = headless(64, 64, GpuOptions::default()) else {
        return;
    };

    let desc = ComputePipelineDesc {
        stage: StageDesc::new(NOOP_COMPUTE),
        ..ComputePipelineDesc::default()
    };

    gpu.begin_frame().unwrap();
    gpu.begin_compute_pass().unwrap();
    gpu.dispatch([4, 1, 1], "noop", &desc).unwrap();
    gpu.end_compute_pass();
    gpu.end_frame().unwrap();

    assert_eq!(gpu.pipeline_stats().compute, 1);
}

#[test]
fn bundles_record_and_replay() {
    let Some(mut gpu) = headless(128, 128, GpuOptions::default()) else {
        return;
    };

    gpu.begin_frame().unwrap();
    gpu.clear(Some(wgpu::Color::BLACK), Some(1.0)).unwrap();

    gpu.start_bundle_recording().unwrap();
    gpu.draw(0..3, 1, "basic", &triangle_desc()).unwrap();
    let bundle = gpu.stop_bundle_recording().unwrap();

    gpu.execute_bundles(&[bundle.clone()]).unwrap();
    gpu.end_frame().unwrap();

    // Replay again in a later frame without re-recording.
    gpu.begin_frame().unwrap();
    gpu.clear(Some(wgpu::Color::BLACK), Some(1.0)).unwrap();
    gpu.execute_bundles(&[bundle]).unwrap();
    gpu.end_frame().unwrap();
}

#[test]
fn stopping_without_a_recording_is_an_invalid_state() {
    let Some(mut gpu) = headless(64, 64, GpuOptions::default()) else {
        return;
    };

    gpu.begin_frame().unwrap();
    let err = gpu.stop_bundle_recording().unwrap_err();
    assert!(matches!(err, GpuError::InvalidState(_)));
    gpu.end_frame().unwrap();
}

#[test]
fn indexed_draws_require_a_bound_index_buffer() {
    let Some(mut gpu) = headless(128, 128, GpuOptions::default()) else {
        return;
    };

    gpu.begin_frame().unwrap();
    gpu.clear(Some(wgpu::Color::BLACK), None).unwrap();

    let err = gpu
        .draw_indexed(0..3, 0, 1, "basic", &triangle_desc())
        .unwrap_err();
    assert!(matches!(err, GpuError::InvalidState(_)));

    let indices: [u16; 4] = [0, 1, 2, 0];
    let index_buffer = gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("triangle indices"),
        size: std::mem::size_of_val(&indices) as u64,
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    gpu.queue()
        .write_buffer(&index_buffer, 0, bytemuck::cast_slice(&indices));

    gpu.bind_vertex_inputs(&VertexInputs {
        index: Some(IndexBinding {
            buffer: index_buffer,
            offset: 0,
            format: wgpu::IndexFormat::Uint16,
        }),
        ..VertexInputs::default()
    })
    .unwrap();
    gpu.draw_indexed(0..3, 0, 1, "basic", &triangle_desc())
        .unwrap();
    gpu.end_frame().unwrap();
}

#[test]
fn vertex_input_holes_are_skipped() {
    let Some(mut gpu) = headless(64, 64, GpuOptions::default()) else {
        return;
    };

    gpu.begin_frame().unwrap();
    gpu.clear(Some(wgpu::Color::BLACK), None).unwrap();
    gpu.bind_vertex_inputs(&VertexInputs {
        index: None,
        first_slot: 0,
        buffers: vec![None, None],
    })
    .unwrap();
    gpu.end_frame().unwrap();
}

#[test]
fn uploads_route_through_the_upload_stream() -> anyhow::Result<()> {
    let Some(mut gpu) = headless(64, 64, GpuOptions::default()) else {
        return Ok(());
    };

    let dst = gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("upload destination"),
        size: 16,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    gpu.begin_frame()?;
    gpu.upload_slice::<u32>(&dst, 0, &[11, 22, 33, 44])?;
    gpu.end_frame()?;

    let slice = dst.slice(..);
    let (sender, receiver) = channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        drop(sender.send(result));
    });
    loop {
        let _ = gpu.device().poll(wgpu::PollType::Wait);
        if let Ok(result) = receiver.try_recv() {
            result?;
            break;
        }
    }
    let mapped = slice.get_mapped_range();
    let words: &[u32] = bytemuck::cast_slice(&mapped);
    assert_eq!(words, &[11, 22, 33, 44]);
    drop(mapped);
    dst.unmap();
    Ok(())
}

#[test]
fn resize_recreates_attachments_at_the_new_extent() {
    let options = GpuOptions {
        antialiasing: true,
        sample_count: 4,
        ..GpuOptions::default()
    };
    let Some(mut gpu) = headless(800, 600, options) else {
        return;
    };

    assert_eq!(gpu.extent(), (800, 600));

    gpu.resize(400, 300);
    assert_eq!(gpu.extent(), (400, 300));

    // The next pass renders against the recreated attachments.
    gpu.begin_frame().unwrap();
    gpu.clear(Some(wgpu::Color::BLACK), Some(1.0)).unwrap();
    gpu.draw(0..3, 1, "basic", &triangle_desc()).unwrap();
    gpu.end_frame().unwrap();
}

#[test]
fn scissor_calls_open_the_render_pass() {
    let Some(mut gpu) = headless(64, 64, GpuOptions::default()) else {
        return;
    };

    gpu.begin_frame().unwrap();
    gpu.set_scissor(0, 0, 32, 32).unwrap();
    gpu.draw(0..3, 1, "basic", &triangle_desc()).unwrap();
    gpu.clear_scissor().unwrap();
    gpu.end_frame().unwrap();
}

#[test]
fn shader_compilation_failures_surface_diagnostics() {
    let Some(mut gpu) = headless(64, 64, GpuOptions::default()) else {
        return;
    };

    let broken = RenderPipelineDesc {
        vertex: Some(StageDesc::new(TRIANGLE_VERTEX)),
        fragment: Some(StageDesc::new("void main() { this is not glsl }")),
        ..RenderPipelineDesc::default()
    };

    gpu.begin_frame().unwrap();
    gpu.clear(Some(wgpu::Color::BLACK), None).unwrap();
    let err = gpu.draw(0..3, 1, "broken", &broken).unwrap_err();
    assert!(matches!(err, GpuError::Compilation { .. }));
    // Nothing was cached, so a corrected description can reuse the name.
    assert_eq!(gpu.pipeline_stats().render, 0);
    gpu.end_frame().unwrap();
}
