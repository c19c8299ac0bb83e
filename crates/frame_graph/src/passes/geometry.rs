//! 3D passes: BRDF lookup, depth prepass, SSAO, shadow cascades, forward
//! lighting and the skybox.

use super::context::RenderContext;
use super::graph::RenderTargets;
use super::queue::{ForwardData, RenderCommand};
use super::shadow::ShadowData;
use super::{push_constant_block, shader_names};
use crate::error::FrameGraphResult;
use crate::foundation::math::{Mat4, Vec2};
use crate::rhi::{
    CullMode, DescriptorDesc, DescriptorSetHandle, PipelineDesc, PipelineHandle, PushConstantBlock, RenderDevice, ShaderHandle,
    TextureBinding, TextureHandle, UniformValue,
};
use crate::scene::{CameraView, MaterialFlags, SceneRenderSettings};
use crate::settings::RenderPassesStats;
use log::trace;

const SKYBOX_EXPOSURE_SCALE: f32 = 120_000.0;

/// Tracks the bound pipeline so consecutive commands sharing one skip the rebind
#[derive(Debug, Default)]
struct PipelineBinder {
    bound: Option<(PipelineHandle, Option<u32>)>,
}

impl PipelineBinder {
    fn bind(&mut self, device: &mut dyn RenderDevice, pipeline: PipelineHandle, layer: Option<u32>) -> FrameGraphResult<()> {
        if self.bound == Some((pipeline, layer)) {
            return Ok(());
        }
        self.finish(device)?;
        device.bind_pipeline(pipeline, layer)?;
        self.bound = Some((pipeline, layer));
        Ok(())
    }

    fn finish(&mut self, device: &mut dyn RenderDevice) -> FrameGraphResult<()> {
        if let Some((pipeline, _)) = self.bound.take() {
            device.end_pipeline(pipeline)?;
        }
        Ok(())
    }
}

fn material_set(command: &RenderCommand, forward: &ForwardData) -> DescriptorSetHandle {
    command.material.descriptor_set.unwrap_or(forward.default_material_set)
}

fn push_transform(
    device: &mut dyn RenderDevice,
    pipeline: PipelineHandle,
    block: Option<&mut PushConstantBlock>,
    transform: &Mat4,
) -> FrameGraphResult<()> {
    if let Some(block) = block {
        block.set_field("transform", transform)?;
        device.push_constants(pipeline, block.bytes())?;
    }
    Ok(())
}

/// Descriptor sets owned by the geometry passes
#[derive(Debug, Default)]
pub(super) struct GeometryPasses {
    ssao_set: Option<DescriptorSetHandle>,
    ssao_blur_sets: Option<[DescriptorSetHandle; 2]>,
    skybox_set: Option<DescriptorSetHandle>,
}

impl GeometryPasses {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Render the split-sum BRDF lookup table once
    pub(super) fn brdf_lut(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        targets: &RenderTargets,
        stats: &mut RenderPassesStats,
    ) -> FrameGraphResult<()> {
        let Some(shader) = context.compiled_shader(device, shader_names::BRDF_LUT) else {
            return Ok(());
        };
        let desc = PipelineDesc::new(shader, "BRDF Generation").with_colour_target(targets.brdf_lut);
        let pipeline = device.get_pipeline(&desc)?;
        device.bind_pipeline(pipeline, None)?;
        device.draw(3)?;
        device.end_pipeline(pipeline)?;
        stats.num_draw_calls += 1;
        context.brdf_generated = true;
        Ok(())
    }

    /// Depth and view-space normals for depth-tested commands
    pub(super) fn depth_prepass(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        forward: &ForwardData,
        targets: &RenderTargets,
        stats: &mut RenderPassesStats,
    ) -> FrameGraphResult<()> {
        if forward.command_queue.is_empty() {
            return Ok(());
        }
        let opaque = context.compiled_shader(device, shader_names::DEPTH_PRE_PASS);
        let alpha = context.compiled_shader(device, shader_names::DEPTH_PRE_PASS_ALPHA);
        let mut opaque_push = opaque.map(|s| push_constant_block(device, s)).transpose()?.flatten();
        let mut alpha_push = alpha.map(|s| push_constant_block(device, s)).transpose()?.flatten();

        let mut binder = PipelineBinder::default();
        for command in forward.command_queue.iter().filter(|c| c.depth_tested) {
            let flags = command.flags();
            let is_alpha = flags.contains(MaterialFlags::ALPHA_BLEND);
            let (shader, push) = if is_alpha { (alpha, alpha_push.as_mut()) } else { (opaque, opaque_push.as_mut()) };
            let Some(shader) = shader else { continue };

            let cull = if flags.contains(MaterialFlags::TWO_SIDED) { CullMode::None } else { CullMode::Back };
            let desc = PipelineDesc::new(shader, "Depth Prepass")
                .with_colour_target(targets.normal)
                .with_depth_target(Some(targets.depth))
                .with_cull_mode(cull)
                .with_samples(targets.samples, None);
            let pipeline = device.get_pipeline(&desc)?;
            binder.bind(device, pipeline, None)?;
            push_transform(device, pipeline, push, &command.transform)?;
            device.bind_descriptor_sets(pipeline, &[forward.scene_set, material_set(command, forward)])?;
            device.draw_mesh(command.mesh)?;
            stats.num_draw_calls += 1;
        }
        binder.finish(device)
    }

    /// Ambient occlusion into the half size target, optionally blurred
    pub(super) fn ssao(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        camera: &CameraView,
        settings: &SceneRenderSettings,
        targets: &RenderTargets,
        stats: &mut RenderPassesStats,
    ) -> FrameGraphResult<()> {
        let Some(shader) = context.compiled_shader(device, shader_names::SSAO) else {
            return Ok(());
        };
        let set = match self.ssao_set {
            Some(set) => set,
            None => *self.ssao_set.insert(device.create_descriptor_set(&DescriptorDesc::new(shader, 0))?),
        };

        let projection = camera.camera.projection();
        let view = camera.view();
        let block = "UniformBuffer";
        device.set_uniform(set, block, "invProj", UniformValue::Mat4(projection.try_inverse().unwrap_or_else(Mat4::identity)))?;
        device.set_uniform(set, block, "projection", UniformValue::Mat4(projection))?;
        device.set_uniform(set, block, "view", UniformValue::Mat4(view))?;
        device.set_uniform(set, block, "samples", UniformValue::Vec4Array(context.ssao_kernel().to_vec()))?;
        device.set_uniform(set, block, "ssaoRadius", UniformValue::Float(settings.ssao_sample_radius))?;
        device.set_uniform(set, block, "near", UniformValue::Float(camera.camera.near))?;
        device.set_uniform(set, block, "far", UniformValue::Float(camera.camera.far))?;
        device.set_uniform(set, block, "strength", UniformValue::Float(settings.ssao_strength))?;
        device.set_texture(set, "in_Depth", TextureBinding::Single(targets.depth))?;
        device.set_texture(set, "in_Noise", TextureBinding::Single(targets.ssao_noise))?;
        device.set_texture(set, "in_Normal", TextureBinding::Single(targets.normal))?;
        device.update_descriptor_set(set)?;

        let mut desc = PipelineDesc::new(shader, "SSAO").with_colour_target(targets.ssao);
        desc.clear_targets = true;
        let pipeline = device.get_pipeline(&desc)?;
        device.bind_pipeline(pipeline, None)?;
        device.bind_descriptor_sets(pipeline, &[set])?;
        device.draw(3)?;
        device.end_pipeline(pipeline)?;
        stats.num_draw_calls += 1;

        if settings.ssao_blur {
            self.ssao_blur(device, context, &view, settings, targets, stats)?;
        }
        Ok(())
    }

    /// Separable blur: horizontal into the blur target, vertical back
    fn ssao_blur(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        view: &Mat4,
        settings: &SceneRenderSettings,
        targets: &RenderTargets,
        stats: &mut RenderPassesStats,
    ) -> FrameGraphResult<()> {
        let Some(shader) = context.compiled_shader(device, shader_names::SSAO_BLUR) else {
            return Ok(());
        };
        let sets = match self.ssao_blur_sets {
            Some(sets) => sets,
            None => {
                let horizontal = device.create_descriptor_set(&DescriptorDesc::new(shader, 0))?;
                let vertical = device.create_descriptor_set(&DescriptorDesc::new(shader, 0))?;
                *self.ssao_blur_sets.insert([horizontal, vertical])
            }
        };

        let (width, height) = device.texture_size(targets.ssao, 0)?;
        let steps = [
            (sets[0], Vec2::new(2.0 / width as f32, 0.0), targets.ssao, targets.ssao_blur),
            (sets[1], Vec2::new(0.0, 2.0 / height as f32), targets.ssao_blur, targets.ssao),
        ];
        for (set, offset, input, output) in steps {
            device.set_uniform(set, "UniformBuffer", "view", UniformValue::Mat4(*view))?;
            device.set_uniform(set, "UniformBuffer", "ssaoTexelOffset", UniformValue::Vec2(offset))?;
            device.set_uniform(set, "UniformBuffer", "ssaoBlurRadius", UniformValue::Int(settings.ssao_blur_radius))?;
            device.set_texture(set, "in_Depth", TextureBinding::Single(targets.depth))?;
            device.set_texture(set, "in_SSAO", TextureBinding::Single(input))?;
            device.set_texture(set, "in_Normal", TextureBinding::Single(targets.normal))?;
            device.transition_images(set)?;
            device.update_descriptor_set(set)?;

            let mut desc = PipelineDesc::new(shader, "SSAO Blur").with_colour_target(output);
            desc.clear_targets = true;
            let pipeline = device.get_pipeline(&desc)?;
            device.bind_pipeline(pipeline, None)?;
            device.bind_descriptor_sets(pipeline, &[set])?;
            device.draw(3)?;
            device.end_pipeline(pipeline)?;
            stats.num_draw_calls += 1;
        }
        Ok(())
    }

    /// Draw every cascade's casters into its layer of the shadow array
    pub(super) fn shadow(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        shadow: &ShadowData,
        forward: &ForwardData,
        stats: &mut RenderPassesStats,
    ) -> FrameGraphResult<()> {
        if !shadow.valid || !shadow.has_casters() {
            return Ok(());
        }
        let opaque = context.compiled_shader(device, shader_names::SHADOW);
        let alpha = context.compiled_shader(device, shader_names::SHADOW_ALPHA);
        let mut opaque_push = opaque.map(|s| push_constant_block(device, s)).transpose()?.flatten();
        let mut alpha_push = alpha.map(|s| push_constant_block(device, s)).transpose()?.flatten();

        let mut binder = PipelineBinder::default();
        for (layer, queue) in shadow.queues.iter().enumerate() {
            let proj_view = shadow.proj_view[layer];
            for command in queue {
                let is_alpha = command.flags().contains(MaterialFlags::ALPHA_BLEND);
                let (shader, push, set_index) =
                    if is_alpha { (alpha, alpha_push.as_mut(), 1) } else { (opaque, opaque_push.as_mut(), 0) };
                if shader.is_none() {
                    continue;
                }
                let Some(&shadow_set) = shadow.descriptor_sets.get(set_index) else { continue };

                binder.bind(device, command.pipeline, Some(layer as u32))?;
                if let Some(block) = push {
                    block.set_field("transform", &(proj_view * command.transform))?;
                    block.set_field("layer", &(layer as u32))?;
                    device.push_constants(command.pipeline, block.bytes())?;
                }
                device.bind_descriptor_sets(command.pipeline, &[shadow_set, material_set(command, forward)])?;
                device.draw_mesh(command.mesh)?;
                stats.num_shadow_objects += 1;
                stats.num_draw_calls += 1;
            }
        }
        binder.finish(device)?;
        trace!("Shadow pass drew {} casters", stats.num_shadow_objects);
        Ok(())
    }

    /// Lit forward pass over the sorted command queue
    pub(super) fn forward(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        forward: &ForwardData,
        stats: &mut RenderPassesStats,
    ) -> FrameGraphResult<()> {
        if forward.command_queue.is_empty() {
            return Ok(());
        }
        let Some(shader) = context.compiled_shader(device, shader_names::FORWARD_PBR) else {
            return Ok(());
        };
        let mut push = push_constant_block(device, shader)?;
        device.transition_images(forward.lighting_set)?;

        let mut binder = PipelineBinder::default();
        for command in &forward.command_queue {
            binder.bind(device, command.pipeline, None)?;
            push_transform(device, command.pipeline, push.as_mut(), &command.transform)?;
            device.bind_descriptor_sets(
                command.pipeline,
                &[forward.scene_set, material_set(command, forward), forward.lighting_set],
            )?;
            device.draw_mesh(command.mesh)?;
            stats.num_rendered_objects += 1;
            stats.num_draw_calls += 1;
        }
        binder.finish(device)
    }

    /// Full-screen environment behind the scene
    pub(super) fn skybox(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        camera: &CameraView,
        settings: &SceneRenderSettings,
        targets: &RenderTargets,
        cube_map: Option<TextureHandle>,
        stats: &mut RenderPassesStats,
    ) -> FrameGraphResult<()> {
        let Some(cube_map) = cube_map else {
            return Ok(());
        };
        let Some(shader) = context.compiled_shader(device, shader_names::SKYBOX) else {
            return Ok(());
        };
        let set = self.skybox_set(device, shader)?;

        let projection = camera.camera.projection();
        device.set_uniform(set, "UBO", "invProjection", UniformValue::Mat4(projection.try_inverse().unwrap_or_else(Mat4::identity)))?;
        device.set_uniform(set, "UBO", "invView", UniformValue::Mat4(camera.world))?;
        device.set_uniform(set, "UniformBuffer", "Mode", UniformValue::Int(0))?;
        device.set_uniform(
            set,
            "UniformBuffer",
            "Exposure",
            UniformValue::Float(camera.camera.exposure * SKYBOX_EXPOSURE_SCALE),
        )?;
        device.set_uniform(set, "UniformBuffer", "BlurLevel", UniformValue::Float(settings.skybox_mip_level))?;
        device.set_texture(set, "u_CubeMap", TextureBinding::Single(cube_map))?;
        device.update_descriptor_set(set)?;

        let desc = PipelineDesc::new(shader, "Skybox")
            .with_colour_target(targets.main)
            .with_depth_target(Some(targets.depth))
            .with_cull_mode(CullMode::None)
            .with_samples(targets.samples, Some(targets.resolve));
        let pipeline = device.get_pipeline(&desc)?;
        device.bind_pipeline(pipeline, None)?;
        device.bind_descriptor_sets(pipeline, &[set])?;
        device.draw(3)?;
        device.end_pipeline(pipeline)?;
        stats.num_draw_calls += 1;
        Ok(())
    }

    fn skybox_set(&mut self, device: &mut dyn RenderDevice, shader: ShaderHandle) -> FrameGraphResult<DescriptorSetHandle> {
        if let Some(set) = self.skybox_set {
            return Ok(set);
        }
        let set = device.create_descriptor_set(&DescriptorDesc::new(shader, 0))?;
        self.skybox_set = Some(set);
        Ok(set)
    }

    /// Drop the skybox set so the next frame builds a fresh one
    pub(super) fn reset_skybox(&mut self, device: &mut dyn RenderDevice) {
        if let Some(set) = self.skybox_set.take() {
            device.destroy_descriptor_set(set);
        }
    }

    /// Release every descriptor set
    pub(super) fn destroy(&mut self, device: &mut dyn RenderDevice) {
        self.reset_skybox(device);
        if let Some(set) = self.ssao_set.take() {
            device.destroy_descriptor_set(set);
        }
        for set in self.ssao_blur_sets.take().into_iter().flatten() {
            device.destroy_descriptor_set(set);
        }
    }
}
