//! Image based lighting generation
//!
//! Converts an equirectangular source into the prefiltered environment and
//! irradiance cube maps the forward pass samples. Runs once per environment
//! change, never per frame.

use super::context::RenderContext;
use super::{push_constant_block, shader_names};
use crate::error::FrameGraphResult;
use crate::foundation::math::Vec4;
use crate::rhi::{
    DescriptorDesc, DescriptorSetHandle, PipelineDesc, RenderDevice, ShaderHandle, TextureBinding, TextureDesc, TextureFormat,
    TextureHandle, UniformValue,
};
use log::info;

/// Inputs for [`create_cube_map`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeMapParams {
    /// Shader parameters passed through as `u_Parameters`
    pub parameters: Vec4,
    /// Environment face size
    pub environment_map_size: u32,
    /// Irradiance face size
    pub irradiance_map_size: u32,
    /// Importance samples for the irradiance convolution
    pub irradiance_samples: i32,
}

impl Default for CubeMapParams {
    fn default() -> Self {
        Self {
            parameters: Vec4::zeros(),
            environment_map_size: 512,
            irradiance_map_size: 32,
            irradiance_samples: 512,
        }
    }
}

/// Roughness the prefilter uses for a mip
pub fn mip_roughness(mip: u32, levels: u32) -> f32 {
    let delta = 1.0 / (levels as f32 - 1.0).max(1.0);
    (mip as f32 * delta).max(0.05)
}

fn draw_faces(
    device: &mut dyn RenderDevice,
    shader: ShaderHandle,
    desc: &PipelineDesc,
    set: DescriptorSetHandle,
    roughness: Option<f32>,
) -> FrameGraphResult<()> {
    let mut push = push_constant_block(device, shader)?;
    for face in 0..6_u32 {
        let mut face_desc = desc.clone();
        face_desc.cube_map_index = face;
        let pipeline = device.get_pipeline(&face_desc)?;
        device.bind_pipeline(pipeline, Some(face))?;

        if let Some(block) = push.as_mut() {
            if let Some(roughness) = roughness {
                block.set_field("Roughness", &roughness)?;
            }
            block.set_field("cubeFaceIndex", &(face as i32))?;
            device.push_constants(pipeline, block.bytes())?;
        }

        device.bind_descriptor_sets(pipeline, &[set])?;
        device.draw(3)?;
        device.end_pipeline(pipeline)?;
    }
    Ok(())
}

/// Render `source` (or `default_texture`) into environment and irradiance
/// cube maps.
///
/// Returns `(environment, irradiance)`; the unfiltered intermediate cube is
/// released. Returns `None` when one of the generation shaders is missing.
pub fn create_cube_map(
    device: &mut dyn RenderDevice,
    context: &mut RenderContext,
    source: Option<TextureHandle>,
    default_texture: TextureHandle,
    params: &CubeMapParams,
) -> FrameGraphResult<Option<(TextureHandle, TextureHandle)>> {
    let (Some(create), Some(filter), Some(irradiance_shader)) = (
        context.compiled_shader(device, shader_names::CREATE_ENVIRONMENT_MAP),
        context.compiled_shader(device, shader_names::ENVIRONMENT_MIP_FILTER),
        context.compiled_shader(device, shader_names::ENVIRONMENT_IRRADIANCE),
    ) else {
        return Ok(None);
    };

    let raw = device.create_texture(&TextureDesc::cube("Environment Raw", TextureFormat::Rgba16F, params.environment_map_size, true))?;
    let filtered = device.create_texture(&TextureDesc::cube("Environment", TextureFormat::Rgba16F, params.environment_map_size, true))?;
    let irradiance = device.create_texture(&TextureDesc::cube("Irradiance", TextureFormat::Rgba16F, params.irradiance_map_size, true))?;

    // Equirectangular to cube
    let set = device.create_descriptor_set(&DescriptorDesc::new(create, 0))?;
    device.set_texture(set, "u_Texture", TextureBinding::Single(source.unwrap_or(default_texture)))?;
    device.set_uniform(set, "UniformBuffer", "u_Parameters", UniformValue::Vec4(params.parameters))?;
    device.update_descriptor_set(set)?;

    let mut desc = PipelineDesc::new(create, "Create Cubemap");
    desc.cube_map_target = Some(raw);
    draw_faces(device, create, &desc, set, None)?;
    device.destroy_descriptor_set(set);
    device.generate_mips(raw)?;

    // Roughness prefilter, one pass per mip
    let set = device.create_descriptor_set(&DescriptorDesc::new(filter, 0))?;
    device.set_texture(set, "u_Texture", TextureBinding::Single(raw))?;
    device.update_descriptor_set(set)?;

    let levels = device.texture_mip_levels(filtered)?;
    for mip in 0..levels {
        let mut desc = PipelineDesc::new(filter, "Mip Generation");
        desc.cube_map_target = Some(filtered);
        desc.mip_index = mip;
        draw_faces(device, filter, &desc, set, Some(mip_roughness(mip, levels)))?;
    }
    device.destroy_descriptor_set(set);

    // Diffuse irradiance
    let set = device.create_descriptor_set(&DescriptorDesc::new(irradiance_shader, 0))?;
    device.set_texture(set, "u_Texture", TextureBinding::Single(filtered))?;
    device.set_uniform(set, "UniformBuffer", "Samples", UniformValue::Int(params.irradiance_samples))?;
    device.update_descriptor_set(set)?;

    let mut desc = PipelineDesc::new(irradiance_shader, "Irradiance");
    desc.cube_map_target = Some(irradiance);
    draw_faces(device, irradiance_shader, &desc, set, None)?;
    device.destroy_descriptor_set(set);
    device.generate_mips(irradiance)?;

    device.destroy_texture(raw);
    info!(
        "Generated environment cube map ({} px, {} mips) and irradiance map ({} px)",
        params.environment_map_size, levels, params.irradiance_map_size
    );
    Ok(Some((filtered, irradiance)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::headless::{HeadlessDevice, RecordedCommand};
    use crate::rhi::DeviceCapabilities;
    use approx::assert_relative_eq;

    fn setup() -> (HeadlessDevice, RenderContext, TextureHandle) {
        let mut device = HeadlessDevice::with_standard_shaders(DeviceCapabilities::default(), 64, 64);
        let default_texture = device
            .create_texture(&TextureDesc::colour("Default", TextureFormat::Rgba8, 1, 1))
            .unwrap();
        (device, RenderContext::new(), default_texture)
    }

    #[test]
    fn test_mip_roughness() {
        assert_relative_eq!(mip_roughness(0, 10), 0.05);
        assert_relative_eq!(mip_roughness(9, 10), 1.0);
        assert_relative_eq!(mip_roughness(0, 1), 0.05);
    }

    #[test]
    fn test_cube_map_draw_counts() {
        let (mut device, mut context, default_texture) = setup();
        let params = CubeMapParams { environment_map_size: 16, irradiance_map_size: 4, ..CubeMapParams::default() };

        let (environment, irradiance) = create_cube_map(&mut device, &mut context, None, default_texture, &params)
            .unwrap()
            .unwrap();

        // 6 faces for the conversion, 6 per mip of a 16 px cube (5 mips), 6 for irradiance
        assert_eq!(device.draw_call_count(), 6 + 6 * 5 + 6);
        assert!(device.texture_exists(environment));
        assert!(device.texture_exists(irradiance));
        assert_eq!(device.live_descriptor_sets(), 0);
        let mips = device
            .commands()
            .iter()
            .filter(|c| matches!(c, RecordedCommand::GenerateMips { .. }))
            .count();
        assert_eq!(mips, 2);
    }

    #[test]
    fn test_missing_shader_skips_generation() {
        let (mut device, mut context, default_texture) = setup();
        device.remove_shader(shader_names::ENVIRONMENT_IRRADIANCE);
        let result = create_cube_map(&mut device, &mut context, None, default_texture, &CubeMapParams::default()).unwrap();
        assert!(result.is_none());
        assert_eq!(device.draw_call_count(), 0);
    }
}
