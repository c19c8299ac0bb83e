//! # Post Processing
//!
//! Full-screen passes that run after geometry, 2D and text have been drawn.
//!
//! ## Architecture
//!
//! - **PingPong**: the two colour targets stages alternate between
//! - **POST_PROCESS_CHAIN**: the ordered stage list; [`active_stages`] gates it
//! - **BloomPlan**: the mip-chain schedule bloom dispatches
//! - **PostProcessor**: owns per-stage descriptor sets and records the chain

pub mod bloom;
pub mod chain;
pub mod ping_pong;

pub use bloom::{BloomPlan, BloomStep};
pub use chain::{active_stages, ChainGate, PostStage, StageDesc, POST_PROCESS_CHAIN};
pub use ping_pong::PingPong;

use crate::error::FrameGraphResult;
use crate::foundation::math::Vec2;
use crate::passes::{push_constant_block, RenderContext};
use crate::rhi::{
    DescriptorDesc, DescriptorSetHandle, PipelineDesc, RenderDevice, ShaderHandle, TextureBinding, TextureHandle, UniformValue,
};
use crate::scene::{CameraView, SceneRenderSettings};
use bloom::BloomInput;
use log::trace;
use std::collections::HashMap;

const UNIFORM_BLOCK: &str = "UniformBuffer";
const COMPUTE_GROUP_SIZE: u32 = 4;
const CHROMATIC_ABERRATION_INTENSITY: f32 = 100.0;
const FILMIC_GRAIN_INTENSITY: f32 = 0.02;

/// Textures the chain reads besides the ping-pong pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostTargets {
    /// Scene depth, sampled by depth of field
    pub depth: TextureHandle,
    /// The three bloom mip-chain textures
    pub bloom: [TextureHandle; 3],
    /// Neutral texture used when bloom did not run
    pub default_texture: TextureHandle,
}

/// Per-frame inputs of the chain
#[derive(Debug, Clone, Copy)]
pub struct PostFrame<'a> {
    /// Scene toggles and parameters
    pub settings: &'a SceneRenderSettings,
    /// Active camera
    pub camera: Option<&'a CameraView>,
    /// Graph-wide switches
    pub gate: ChainGate,
    /// Seconds since start
    pub elapsed: f32,
}

/// Records the post-process chain
#[derive(Debug, Default)]
pub struct PostProcessor {
    stage_sets: HashMap<&'static str, DescriptorSetHandle>,
    bloom_sets: Vec<DescriptorSetHandle>,
    bloom_shader: Option<ShaderHandle>,
    bloom_last: Option<TextureHandle>,
    draw_calls: u32,
}

impl PostProcessor {
    /// Empty processor; descriptor sets are created on first use
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every enabled stage on `chain`.
    ///
    /// Each stage that writes the pair reads `chain.current()`, writes
    /// `chain.previous()` and swaps. Returns the texture holding this frame's
    /// bloom contribution, the default texture when bloom did not run.
    pub fn run(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        chain: &mut PingPong<TextureHandle>,
        targets: &PostTargets,
        frame: &PostFrame<'_>,
    ) -> FrameGraphResult<TextureHandle> {
        self.draw_calls = 0;
        self.bloom_last = None;

        for stage in active_stages(frame.settings, frame.gate) {
            trace!("Post-process stage {:?}", stage.stage);
            if stage.stage == PostStage::Bloom {
                self.bloom(device, context, stage, chain.current(), targets, frame)?;
            } else if self.full_screen(device, context, stage, chain, targets, frame)? && stage.swaps {
                chain.swap();
            }
        }

        Ok(self.bloom_texture(targets))
    }

    /// Bloom contribution of the last run
    pub fn bloom_texture(&self, targets: &PostTargets) -> TextureHandle {
        self.bloom_last.unwrap_or(targets.default_texture)
    }

    /// Draws and dispatches recorded by the last run
    pub fn draw_calls(&self) -> u32 {
        self.draw_calls
    }

    /// Descriptor sets currently held for bloom
    pub fn bloom_descriptor_count(&self) -> usize {
        self.bloom_sets.len()
    }

    /// Release every descriptor set
    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        for (_, set) in self.stage_sets.drain() {
            device.destroy_descriptor_set(set);
        }
        for set in self.bloom_sets.drain(..) {
            device.destroy_descriptor_set(set);
        }
        self.bloom_shader = None;
    }

    fn stage_set(&mut self, device: &mut dyn RenderDevice, name: &'static str, shader: ShaderHandle) -> FrameGraphResult<DescriptorSetHandle> {
        if let Some(set) = self.stage_sets.get(name) {
            return Ok(*set);
        }
        let set = device.create_descriptor_set(&DescriptorDesc::new(shader, 0))?;
        self.stage_sets.insert(name, set);
        Ok(set)
    }

    fn full_screen(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        stage: &StageDesc,
        chain: &PingPong<TextureHandle>,
        targets: &PostTargets,
        frame: &PostFrame<'_>,
    ) -> FrameGraphResult<bool> {
        let name = stage.shader_for(device.capabilities().support_compute);
        let Some(shader) = context.compiled_shader(device, name) else {
            return Ok(false);
        };
        let needs_camera = matches!(stage.stage, PostStage::DepthOfField | PostStage::ChromaticAberration);
        if needs_camera && frame.camera.is_none() {
            return Ok(false);
        }

        let input = chain.current();
        let output = chain.previous();
        let set = self.stage_set(device, name, shader)?;
        device.set_texture(set, "u_Texture", TextureBinding::Single(input))?;

        match stage.stage {
            PostStage::DepthOfField => {
                if let Some(camera) = frame.camera {
                    let projection = camera.camera.projection();
                    let depth_mul = -projection[(2, 3)];
                    let mut depth_add = projection[(2, 2)];
                    if depth_mul * depth_add < 0.0 {
                        depth_add = -depth_add;
                    }
                    device.set_uniform(set, UNIFORM_BLOCK, "DepthConsts", UniformValue::Vec2(Vec2::new(depth_mul, depth_add)))?;
                }
                let params = Vec2::new(frame.settings.depth_of_field_distance, frame.settings.depth_of_field_strength);
                device.set_uniform(set, UNIFORM_BLOCK, "DOFParams", UniformValue::Vec2(params))?;
                device.set_texture(set, "u_DepthTexture", TextureBinding::Single(targets.depth))?;
            }
            PostStage::ToneMapping => {
                let settings = frame.settings;
                let intensity = if settings.bloom_enabled { settings.bloom_intensity } else { 0.0 };
                device.set_uniform(set, UNIFORM_BLOCK, "BloomIntensity", UniformValue::Float(intensity))?;
                device.set_uniform(set, UNIFORM_BLOCK, "ToneMapIndex", UniformValue::Int(settings.tone_map_index))?;
                device.set_uniform(set, UNIFORM_BLOCK, "Brightness", UniformValue::Float(settings.brightness))?;
                device.set_uniform(set, UNIFORM_BLOCK, "Contrast", UniformValue::Float(settings.contrast))?;
                device.set_uniform(set, UNIFORM_BLOCK, "Saturation", UniformValue::Float(settings.saturation))?;
                device.set_texture(set, "u_BloomTexture", TextureBinding::Single(self.bloom_texture(targets)))?;
            }
            PostStage::ChromaticAberration => {
                let aperture = frame.camera.map_or(1.0, |camera| camera.camera.aperture);
                device.set_uniform(
                    set,
                    UNIFORM_BLOCK,
                    "chromaticAberrationIntensity",
                    UniformValue::Float(CHROMATIC_ABERRATION_INTENSITY),
                )?;
                device.set_uniform(set, UNIFORM_BLOCK, "cameraAperture", UniformValue::Float(aperture))?;
            }
            PostStage::Bloom | PostStage::Debanding | PostStage::Sharpen | PostStage::Fxaa | PostStage::FilmicGrain => {}
        }

        let compute = device.reflect(shader)?.compute;
        if compute {
            device.set_texture(set, "o_Image", TextureBinding::Storage { texture: output, mip: 0 })?;
            device.transition_images(set)?;
        }
        device.update_descriptor_set(set)?;

        let mut desc = PipelineDesc::new(shader, stage.debug_name);
        if !compute {
            desc = desc.with_colour_target(output);
        }
        desc.clear_targets = matches!(
            stage.stage,
            PostStage::Debanding | PostStage::ChromaticAberration | PostStage::FilmicGrain
        );

        let pipeline = device.get_pipeline(&desc)?;
        device.bind_pipeline(pipeline, None)?;

        if stage.stage == PostStage::FilmicGrain {
            if let Some(mut block) = push_constant_block(device, shader)? {
                block.set_field("Time", &frame.elapsed)?;
                block.set_field("Intensity", &FILMIC_GRAIN_INTENSITY)?;
                device.push_constants(pipeline, block.bytes())?;
            }
        }

        device.bind_descriptor_sets(pipeline, &[set])?;
        if compute {
            let (width, height) = device.texture_size(output, 0)?;
            device.dispatch(width.div_ceil(COMPUTE_GROUP_SIZE), height.div_ceil(COMPUTE_GROUP_SIZE), 1)?;
        } else {
            device.draw(3)?;
        }
        device.end_pipeline(pipeline)?;
        self.draw_calls += 1;
        Ok(true)
    }

    fn bloom(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        stage: &StageDesc,
        source: TextureHandle,
        targets: &PostTargets,
        frame: &PostFrame<'_>,
    ) -> FrameGraphResult<()> {
        let name = stage.shader_for(device.capabilities().support_compute);
        let Some(shader) = context.compiled_shader(device, name) else {
            return Ok(());
        };
        let (width, height) = device.texture_size(targets.bloom[0], 0)?;
        if width == 0 || height == 0 {
            return Ok(());
        }
        let Some(plan) = BloomPlan::new(device.texture_mip_levels(targets.bloom[0])?) else {
            return Ok(());
        };

        // One set per step; rebuilt when the mip count or shader changes
        if self.bloom_sets.len() != plan.descriptor_count() || self.bloom_shader != Some(shader) {
            for set in self.bloom_sets.drain(..) {
                device.destroy_descriptor_set(set);
            }
            for _ in 0..plan.descriptor_count() {
                self.bloom_sets.push(device.create_descriptor_set(&DescriptorDesc::new(shader, 0))?);
            }
            self.bloom_shader = Some(shader);
        }

        let compute = device.reflect(shader)?.compute;
        let mut push = push_constant_block(device, shader)?;
        let threshold = bloom::threshold_params(frame.settings.bloom_threshold, frame.settings.bloom_knee);
        let resolve = |input: BloomInput| match input {
            BloomInput::Source => source,
            BloomInput::Bloom(index) => targets.bloom[index],
        };

        for (step, set) in plan.steps().iter().zip(self.bloom_sets.iter().copied()) {
            let output = targets.bloom[step.output];
            device.set_texture(set, "u_Texture", TextureBinding::Single(resolve(step.input)))?;
            device.set_texture(set, "u_BloomTexture", TextureBinding::Single(resolve(step.combine)))?;
            if compute {
                device.set_texture(set, "o_Image", TextureBinding::Storage { texture: output, mip: step.output_mip })?;
                device.transition_images(set)?;
            }
            device.update_descriptor_set(set)?;

            let (mip_width, mip_height) = device.texture_size(output, step.output_mip)?;
            let mut desc = PipelineDesc::new(shader, step.mode.debug_name());
            if !compute {
                desc = desc.with_colour_target(output);
                desc.mip_index = step.output_mip;
            }
            let pipeline = device.get_pipeline(&desc)?;
            device.bind_pipeline(pipeline, None)?;

            if let Some(block) = push.as_mut() {
                block.set_field("Params", &threshold)?;
                block.set_field("Params2", &bloom::step_params(step, mip_width, mip_height))?;
                device.push_constants(pipeline, block.bytes())?;
            }

            device.bind_descriptor_sets(pipeline, &[set])?;
            if compute {
                device.dispatch(mip_width.div_ceil(COMPUTE_GROUP_SIZE), mip_height.div_ceil(COMPUTE_GROUP_SIZE), 1)?;
            } else {
                device.draw(3)?;
            }
            device.end_pipeline(pipeline)?;
            self.draw_calls += 1;
        }

        self.bloom_last = Some(targets.bloom[plan.final_output()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::shader_names;
    use crate::rhi::headless::{HeadlessDevice, RecordedCommand};
    use crate::rhi::{DeviceCapabilities, TextureDesc, TextureFormat};

    struct Fixture {
        device: HeadlessDevice,
        context: RenderContext,
        main: TextureHandle,
        scratch: TextureHandle,
        targets: PostTargets,
    }

    fn fixture(support_compute: bool) -> Fixture {
        let capabilities = DeviceCapabilities { support_compute, ..DeviceCapabilities::default() };
        let mut device = HeadlessDevice::with_standard_shaders(capabilities, 256, 128);
        let colour = |name: &str, device: &mut HeadlessDevice| {
            device
                .create_texture(&TextureDesc::colour(name, TextureFormat::Rgba16F, 256, 128).with_storage())
                .unwrap()
        };
        let main = colour("Main", &mut device);
        let scratch = colour("PostProcess", &mut device);
        let bloom = [0, 1, 2].map(|i| {
            device
                .create_texture(&TextureDesc::colour(&format!("Bloom{i}"), TextureFormat::Rgba16F, 256, 128).with_mips().with_storage())
                .unwrap()
        });
        let depth = device.create_texture(&TextureDesc::depth("Depth", 256, 128)).unwrap();
        let default_texture = device
            .create_texture(&TextureDesc::colour("Default", TextureFormat::Rgba8, 1, 1))
            .unwrap();
        Fixture {
            device,
            context: RenderContext::new(),
            main,
            scratch,
            targets: PostTargets { depth, bloom, default_texture },
        }
    }

    fn gate() -> ChainGate {
        ChainGate { disable_post_process: false, post_process_pass: true, msaa: false }
    }

    fn run(fx: &mut Fixture, post: &mut PostProcessor, settings: &SceneRenderSettings) -> (PingPong<TextureHandle>, TextureHandle) {
        let mut chain = PingPong::new(fx.main, fx.scratch);
        let frame = PostFrame { settings, camera: None, gate: gate(), elapsed: 2.0 };
        let bloom = post.run(&mut fx.device, &mut fx.context, &mut chain, &fx.targets, &frame).unwrap();
        (chain, bloom)
    }

    fn tone_mapping_set(device: &HeadlessDevice) -> DescriptorSetHandle {
        device
            .commands()
            .iter()
            .find_map(|c| match c {
                RecordedCommand::SetTexture { set, name, .. } if name == "u_BloomTexture" => {
                    (device.shader_name(device.descriptor_desc(*set)?.shader)? == shader_names::TONE_MAPPING).then_some(*set)
                }
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_swap_count_matches_chain_stages() {
        let mut fx = fixture(true);
        let mut post = PostProcessor::new();
        let settings = SceneRenderSettings { sharpen_enabled: true, ..SceneRenderSettings::default() };
        let (chain, _) = run(&mut fx, &mut post, &settings);

        // Debanding, tone mapping, sharpen, FXAA
        assert_eq!(chain.swap_count(), 4);
        assert_eq!(chain.current(), fx.main);
        assert_eq!(chain.previous(), fx.scratch);
    }

    #[test]
    fn test_last_stage_output_is_current() {
        let mut fx = fixture(false);
        let mut post = PostProcessor::new();
        let settings = SceneRenderSettings { debanding_enabled: false, fxaa_enabled: false, bloom_enabled: false, ..SceneRenderSettings::default() };
        let (chain, _) = run(&mut fx, &mut post, &settings);

        assert_eq!(chain.swap_count(), 1);
        assert_eq!(chain.current(), fx.scratch);
        let pipeline = fx
            .device
            .commands()
            .iter()
            .rev()
            .find_map(|c| match c {
                RecordedCommand::BindPipeline { pipeline, .. } => Some(*pipeline),
                _ => None,
            })
            .unwrap();
        assert_eq!(fx.device.pipeline_desc(pipeline).unwrap().colour_targets, vec![fx.scratch]);
    }

    #[test]
    fn test_bloom_disabled_uses_default_texture() {
        let mut fx = fixture(true);
        let mut post = PostProcessor::new();

        let (_, bloom) = run(&mut fx, &mut post, &SceneRenderSettings::default());
        assert_ne!(bloom, fx.targets.default_texture);

        fx.device.clear_commands();
        let settings = SceneRenderSettings { bloom_enabled: false, ..SceneRenderSettings::default() };
        let (_, bloom) = run(&mut fx, &mut post, &settings);
        assert_eq!(bloom, fx.targets.default_texture);

        let set = tone_mapping_set(&fx.device);
        assert_eq!(
            fx.device.texture_binding(set, "u_BloomTexture"),
            Some(&TextureBinding::Single(fx.targets.default_texture))
        );
        assert_eq!(fx.device.uniform(set, UNIFORM_BLOCK, "BloomIntensity"), Some(&UniformValue::Float(0.0)));
    }

    #[test]
    fn test_missing_bloom_shader_is_skipped() {
        let mut fx = fixture(true);
        fx.device.remove_shader(shader_names::BLOOM_COMPUTE);
        let mut post = PostProcessor::new();
        let (chain, bloom) = run(&mut fx, &mut post, &SceneRenderSettings::default());

        assert_eq!(bloom, fx.targets.default_texture);
        assert_eq!(post.bloom_descriptor_count(), 0);
        assert_eq!(chain.swap_count(), 3);
        assert!(!fx.device.bound_pipeline_names().iter().any(|n| n.starts_with("Bloom")));
    }

    #[test]
    fn test_bloom_descriptor_sets_follow_mip_count() {
        let mut fx = fixture(true);
        let mut post = PostProcessor::new();
        run(&mut fx, &mut post, &SceneRenderSettings::default());

        // 256 px wide: 9 levels, 7 processed
        assert_eq!(post.bloom_descriptor_count(), 3 * 7 - 2);
        let dispatches = fx.device.commands().iter().filter(|c| matches!(c, RecordedCommand::Dispatch { .. })).count();
        // Bloom steps plus compute FXAA
        assert_eq!(dispatches, 3 * 7 - 2 + 1);

        for texture in fx.targets.bloom {
            fx.device.resize_texture(texture, 64, 32).unwrap();
        }
        run(&mut fx, &mut post, &SceneRenderSettings::default());
        assert_eq!(post.bloom_descriptor_count(), 3 * 5 - 2);
    }

    #[test]
    fn test_raster_fallback_without_compute() {
        let mut fx = fixture(false);
        let mut post = PostProcessor::new();
        run(&mut fx, &mut post, &SceneRenderSettings::default());

        assert!(!fx.device.commands().iter().any(|c| matches!(c, RecordedCommand::Dispatch { .. })));
        assert_eq!(post.draw_calls() as usize, fx.device.draw_call_count());
        let names = fx.device.bound_pipeline_names();
        assert_eq!(names.first().copied(), Some("Bloom-Prefilter"));
        assert_eq!(names.last().copied(), Some("FXAA"));
    }

    #[test]
    fn test_filmic_grain_pushes_time() {
        let mut fx = fixture(true);
        let mut post = PostProcessor::new();
        let settings = SceneRenderSettings { filmic_grain_enabled: true, bloom_enabled: false, ..SceneRenderSettings::default() };
        run(&mut fx, &mut post, &settings);

        let data = fx
            .device
            .commands()
            .iter()
            .find_map(|c| match c {
                RecordedCommand::PushConstants { data, .. } => Some(data.clone()),
                _ => None,
            })
            .unwrap();
        let time = f32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        assert_eq!(time, 2.0);
    }

    #[test]
    fn test_destroy_releases_sets() {
        let mut fx = fixture(true);
        let mut post = PostProcessor::new();
        run(&mut fx, &mut post, &SceneRenderSettings::default());
        assert!(fx.device.live_descriptor_sets() > 0);

        post.destroy(&mut fx.device);
        assert_eq!(fx.device.live_descriptor_sets(), 0);
    }
}
