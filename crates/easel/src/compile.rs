use std::borrow::Cow;

use crate::error::GpuError;
use crate::types::{StageDesc, StageKind};

/// Version directive injected ahead of every stage source.
const VERSION_HEADER: &str = "#version 450";

/// Produces the compilable GLSL for one stage.
///
/// Steps performed:
///
/// 1. Strip a leading `#version` directive from the caller source so our
///    own header wins.
/// 2. Prepend [`VERSION_HEADER`] and one `#define` line per entry in the
///    stage's define list.
/// 3. Emit `#line 1` so compiler diagnostics keep the caller's line
///    numbering.
pub(crate) fn assemble_stage_source(source: &str, defines: &[(String, String)]) -> String {
    let mut assembled = String::with_capacity(source.len() + 64);
    assembled.push_str(VERSION_HEADER);
    assembled.push('\n');
    for (name, value) in defines {
        assembled.push_str("#define ");
        assembled.push_str(name);
        if !value.is_empty() {
            assembled.push(' ');
            assembled.push_str(value);
        }
        assembled.push('\n');
    }
    assembled.push_str("#line 1\n");

    let mut skipped_version = false;
    for line in source.lines() {
        if !skipped_version && line.trim_start().starts_with("#version") {
            skipped_version = true;
            continue;
        }
        assembled.push_str(line);
        assembled.push('\n');
    }
    assembled
}

/// Compiles one stage through wgpu's GLSL frontend.
///
/// Validation failures are captured with an error scope around module
/// creation and surfaced as [`GpuError::Compilation`] with the compiler's
/// diagnostic text; nothing is created or cached on failure.
pub(crate) fn create_shader_module(
    device: &wgpu::Device,
    label: &str,
    stage: StageKind,
    desc: &StageDesc,
) -> Result<wgpu::ShaderModule, GpuError> {
    let assembled = assemble_stage_source(&desc.source, &desc.defines);

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(assembled),
            stage: stage.to_naga(),
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(GpuError::Compilation {
            stage,
            message: error.to_string(),
        });
    }
    Ok(module)
}
