//! Pass executor
//!
//! [`RenderPasses`] owns every persistent GPU resource of a frame and records
//! the passes in a fixed order:
//!
//! 1. clear the main, normal and depth targets
//! 2. BRDF lookup table, once
//! 3. depth prepass, SSAO and blur, shadow cascades, forward lighting
//! 4. skybox
//! 5. sprites, then text
//! 6. post-process chain
//! 7. debug overlay on the chain output
//! 8. final blit to the render target or swapchain
//!
//! Each pass is gated by a graph setting and a scene toggle. A missing or
//! uncompiled shader skips its pass and is reported once.

use super::context::RenderContext;
use super::environment::{create_cube_map, CubeMapParams};
use super::geometry::GeometryPasses;
use super::overlay::DebugPass;
use super::queue::{collect_lights, forward_pipeline_desc, light_direction, shadow_pipeline_desc, sort_forward_queue};
use super::queue::{ForwardData, ForwardTargets, RenderCommand};
use super::shadow::{CascadeInput, ShadowData};
use super::sprites::{SpritePasses, SpriteTargets};
use super::{shader_names, ssao};
use crate::error::{FrameGraphError, FrameGraphResult};
use crate::foundation::math::{utils, Mat4, Vec3, Vec4};
use crate::post::{ChainGate, PingPong, PostFrame, PostProcessor, PostTargets};
use crate::rhi::{
    CullMode, DescriptorDesc, DescriptorSetHandle, PipelineDesc, RenderDevice, ShaderHandle, TextureBinding, TextureDesc,
    TextureFormat, TextureHandle, TextureWrap, UniformValue,
};
use crate::scene::{CameraView, Environment, Material, MaterialFlags, Scene, SceneRenderSettings};
use crate::settings::{RenderPassesSettings, RenderPassesStats};
use crate::spatial::Frustum;
use crate::text::FontGeometry;
use log::{debug, info, trace};
use std::sync::Arc;

const SCENE_LAYOUT: u32 = 0;
const MATERIAL_LAYOUT: u32 = 1;
const LIGHTING_LAYOUT: u32 = 2;

/// Textures owned by the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargets {
    /// Scene colour, multisampled under MSAA
    pub main: TextureHandle,
    /// Single-sample resolve of `main`
    pub resolve: TextureHandle,
    /// Post-process scratch, the other half of the ping-pong pair
    pub post_process: TextureHandle,
    /// Scene depth
    pub depth: TextureHandle,
    /// View-space normals from the depth prepass
    pub normal: TextureHandle,
    /// Ambient occlusion, half size
    pub ssao: TextureHandle,
    /// Ambient occlusion blur scratch, half size
    pub ssao_blur: TextureHandle,
    /// Tiling SSAO rotation noise
    pub ssao_noise: TextureHandle,
    /// Bloom mip chains
    pub bloom: [TextureHandle; 3],
    /// Split-sum BRDF lookup
    pub brdf_lut: TextureHandle,
    /// Layered cascade depth
    pub shadow: TextureHandle,
    /// 1x1 black texture bound wherever an input is absent
    pub default_texture: TextureHandle,
    /// 1x1 black cube bound when the scene has no environment
    pub default_cube: TextureHandle,
    /// Internal width
    pub width: u32,
    /// Internal height
    pub height: u32,
    /// MSAA samples of the main, depth and normal targets
    pub samples: u8,
}

fn half(extent: u32) -> u32 {
    (extent / 2).max(1)
}

fn main_desc(width: u32, height: u32, samples: u8) -> TextureDesc {
    let desc = TextureDesc::colour("Main", TextureFormat::Rgba16F, width, height).with_samples(samples);
    // Written by compute post stages only when it is part of the ping-pong pair
    if samples > 1 { desc } else { desc.with_storage() }
}

impl RenderTargets {
    /// Allocate every target at the given internal size
    pub fn create(
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        settings: &RenderPassesSettings,
        width: u32,
        height: u32,
        samples: u8,
    ) -> FrameGraphResult<Self> {
        let samples = samples.max(1);
        let main = device.create_texture(&main_desc(width, height, samples))?;
        let resolve = device.create_texture(&TextureDesc::colour("Resolve", TextureFormat::Rgba16F, width, height).with_storage())?;
        let post_process =
            device.create_texture(&TextureDesc::colour("PostProcess", TextureFormat::Rgba16F, width, height).with_storage())?;
        let depth = device.create_texture(&TextureDesc::depth("Depth", width, height).with_samples(samples))?;
        let normal =
            device.create_texture(&TextureDesc::colour("Normal", TextureFormat::Rgba16F, width, height).with_samples(samples))?;
        let ssao = device.create_texture(&TextureDesc::colour("SSAO", TextureFormat::R8, half(width), half(height)))?;
        let ssao_blur = device.create_texture(&TextureDesc::colour("SSAO Blur", TextureFormat::R8, half(width), half(height)))?;

        let ssao_noise = device.create_texture(
            &TextureDesc::colour("SSAO Noise", TextureFormat::Rgba32F, ssao::NOISE_DIM, ssao::NOISE_DIM).with_wrap(TextureWrap::Repeat),
        )?;
        let noise = ssao::generate_noise(context.rng());
        device.upload_texture(ssao_noise, bytemuck::cast_slice(&noise))?;

        let mut bloom = [main; 3];
        for (i, texture) in bloom.iter_mut().enumerate() {
            let desc = TextureDesc::colour(&format!("Bloom {i}"), TextureFormat::Rgba16F, width, height)
                .with_mips()
                .with_storage();
            *texture = device.create_texture(&desc)?;
        }

        let brdf_lut =
            device.create_texture(&TextureDesc::colour("BRDF LUT", TextureFormat::Rg16F, settings.brdf_lut_size, settings.brdf_lut_size))?;
        let shadow = device.create_texture(&TextureDesc::depth_array(
            "Shadow",
            settings.quality.shadow_quality.map_size(),
            settings.shadow.cascade_count.max(1) as u32,
        ))?;

        let default_texture = device.create_texture(&TextureDesc::colour("Default", TextureFormat::Rgba8, 1, 1))?;
        device.upload_texture(default_texture, &[0_u8, 0, 0, 255])?;
        let default_cube = device.create_texture(&TextureDesc::cube("Default Cube", TextureFormat::Rgba8, 1, false))?;
        device.upload_texture(default_cube, &[0_u8, 0, 0, 255].repeat(6))?;

        Ok(Self {
            main,
            resolve,
            post_process,
            depth,
            normal,
            ssao,
            ssao_blur,
            ssao_noise,
            bloom,
            brdf_lut,
            shadow,
            default_texture,
            default_cube,
            width,
            height,
            samples,
        })
    }

    /// Resize every screen-sized target
    pub fn resize(&mut self, device: &mut dyn RenderDevice, width: u32, height: u32) -> FrameGraphResult<()> {
        for texture in [self.main, self.resolve, self.post_process, self.depth, self.normal] {
            device.resize_texture(texture, width, height)?;
        }
        for texture in self.bloom {
            device.resize_texture(texture, width, height)?;
        }
        for texture in [self.ssao, self.ssao_blur] {
            device.resize_texture(texture, half(width), half(height))?;
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Recreate the multisampled targets and the SSAO pair for a new sample count
    pub fn set_samples(&mut self, device: &mut dyn RenderDevice, samples: u8) -> FrameGraphResult<()> {
        let samples = samples.max(1);
        for texture in [self.main, self.depth, self.normal, self.ssao] {
            device.destroy_texture(texture);
        }
        let (width, height) = (self.width, self.height);
        self.main = device.create_texture(&main_desc(width, height, samples))?;
        self.depth = device.create_texture(&TextureDesc::depth("Depth", width, height).with_samples(samples))?;
        self.normal =
            device.create_texture(&TextureDesc::colour("Normal", TextureFormat::Rgba16F, width, height).with_samples(samples))?;
        self.ssao = device.create_texture(&TextureDesc::colour("SSAO", TextureFormat::R8, half(width), half(height)))?;
        self.samples = samples;
        Ok(())
    }

    /// First texture of the post-process chain
    pub fn chain_start(&self) -> TextureHandle {
        if self.samples > 1 { self.resolve } else { self.main }
    }

    fn destroy(&self, device: &mut dyn RenderDevice) {
        let textures = [
            self.main,
            self.resolve,
            self.post_process,
            self.depth,
            self.normal,
            self.ssao,
            self.ssao_blur,
            self.ssao_noise,
            self.brdf_lut,
            self.shadow,
            self.default_texture,
            self.default_cube,
        ];
        for texture in textures.into_iter().chain(self.bloom) {
            device.destroy_texture(texture);
        }
    }
}

fn homogeneous(position: Vec3) -> Vec4 {
    Vec4::new(position.x, position.y, position.z, 1.0)
}

/// Window size to internal size: odd dimensions round down to even, then scale
pub fn internal_extent(width: u32, height: u32, renderer_scale: f32) -> (u32, u32) {
    let even = |extent: u32| (extent - extent % 2).max(2);
    let scale = |extent: u32| ((extent as f32 * renderer_scale) as u32).max(1);
    (scale(even(width)), scale(even(height)))
}

/// The frame render graph
#[derive(Debug)]
pub struct RenderPasses {
    settings: RenderPassesSettings,
    context: RenderContext,
    targets: RenderTargets,
    forward: ForwardData,
    shadow: ShadowData,
    geometry: GeometryPasses,
    sprites: SpritePasses,
    post: PostProcessor,
    debug: DebugPass,
    stats: RenderPassesStats,
    forward_shader: ShaderHandle,
    camera: Option<CameraView>,
    override_camera: Option<CameraView>,
    render_target: Option<TextureHandle>,
    final_set: Option<DescriptorSetHandle>,
    chain: Option<PingPong<TextureHandle>>,
    last_render_target: TextureHandle,
    bloom_texture: TextureHandle,
}

impl RenderPasses {
    /// Create the graph and its targets for a window of `width` by `height`.
    ///
    /// Fails if the device has no forward lighting shader at all; every other
    /// shader may be missing and only disables its pass.
    pub fn new(device: &mut dyn RenderDevice, settings: RenderPassesSettings, width: u32, height: u32) -> FrameGraphResult<Self> {
        let forward_shader = device
            .shader(shader_names::FORWARD_PBR)
            .ok_or(FrameGraphError::MissingResource("ForwardPBR shader"))?;

        let mut context = RenderContext::new();
        let (internal_width, internal_height) = internal_extent(width, height, settings.quality.renderer_scale);
        let targets = RenderTargets::create(device, &mut context, &settings, internal_width, internal_height, 1)?;

        let forward = ForwardData {
            depth_texture: targets.depth,
            normal_texture: targets.normal,
            brdf_lut: targets.brdf_lut,
            environment_map: targets.default_cube,
            irradiance_map: targets.default_cube,
            bound_environment: None,
            default_material: Arc::new(Material::default()),
            default_material_set: device.create_descriptor_set(&DescriptorDesc::new(forward_shader, MATERIAL_LAYOUT))?,
            scene_set: device.create_descriptor_set(&DescriptorDesc::new(forward_shader, SCENE_LAYOUT))?,
            lighting_set: device.create_descriptor_set(&DescriptorDesc::new(forward_shader, LIGHTING_LAYOUT))?,
            command_queue: Vec::new(),
            frustum: Frustum::default(),
            render_mode: 0,
            light_count: 0,
        };

        let mut shadow = ShadowData::new(settings.shadow.clone(), settings.quality.shadow_quality.map_size(), targets.shadow);
        if let (Some(opaque), Some(alpha)) = (device.shader(shader_names::SHADOW), device.shader(shader_names::SHADOW_ALPHA)) {
            for shader in [opaque, alpha] {
                shadow.descriptor_sets.push(device.create_descriptor_set(&DescriptorDesc::new(shader, 0))?);
            }
        }

        info!(
            "Created render passes at {}x{} ({} cascades, {} px shadow map)",
            internal_width,
            internal_height,
            shadow.cascade_count(),
            shadow.map_size
        );

        Ok(Self {
            sprites: SpritePasses::new(&settings.batch),
            last_render_target: targets.main,
            bloom_texture: targets.default_texture,
            settings,
            context,
            targets,
            forward,
            shadow,
            geometry: GeometryPasses::new(),
            post: PostProcessor::new(),
            debug: DebugPass::default(),
            stats: RenderPassesStats::default(),
            forward_shader,
            camera: None,
            override_camera: None,
            render_target: None,
            final_set: None,
            chain: None,
        })
    }

    /// Resize the screen targets for a new window size
    pub fn on_resize(&mut self, device: &mut dyn RenderDevice, width: u32, height: u32) -> FrameGraphResult<()> {
        let (width, height) = internal_extent(width, height, self.settings.quality.renderer_scale);
        if (width, height) == (self.targets.width, self.targets.height) {
            return Ok(());
        }
        self.targets.resize(device, width, height)?;
        info!("Render passes resized to {}x{}", width, height);
        Ok(())
    }

    /// Blit the final image into `target` instead of the swapchain
    pub fn set_render_target(&mut self, target: Option<TextureHandle>) {
        self.render_target = target;
    }

    /// Create or release the debug overlay
    pub fn enable_debug_renderer(&mut self, device: &mut dyn RenderDevice, enabled: bool) {
        self.debug.enable(device, enabled, self.settings.batch.max_textures);
    }

    /// Font for debug labels and for scene text without its own font
    pub fn set_debug_font(&mut self, font: Option<Arc<FontGeometry>>) {
        self.debug.set_font(font);
    }

    /// Render from this camera instead of the scene's
    pub fn set_override_camera(&mut self, camera: Option<CameraView>) {
        self.override_camera = camera;
    }

    /// Turn SSAO and every optional post-process stage off
    pub fn set_disable_post_process(&mut self, disabled: bool) {
        self.settings.disable_post_process = disabled;
    }

    /// Forget the previous scene's environment
    pub fn on_new_scene(&mut self, device: &mut dyn RenderDevice) -> FrameGraphResult<()> {
        self.reset_environment(device)?;
        info!("Render passes reset for new scene");
        Ok(())
    }

    /// Generate environment and irradiance cube maps from an equirectangular source
    pub fn create_cube_map(
        &mut self,
        device: &mut dyn RenderDevice,
        source: Option<TextureHandle>,
        parameters: Vec4,
    ) -> FrameGraphResult<Option<Environment>> {
        let params = CubeMapParams {
            parameters,
            environment_map_size: self.settings.environment_map_size,
            irradiance_map_size: self.settings.irradiance_map_size,
            irradiance_samples: self.settings.irradiance_samples,
        };
        let maps = create_cube_map(device, &mut self.context, source, self.targets.default_texture, &params)?;
        Ok(maps.map(|(environment_map, irradiance_map)| Environment { environment_map, irradiance_map }))
    }

    /// Cull and queue the scene, fit shadow cascades and upload per-frame uniforms
    pub fn begin_scene(&mut self, device: &mut dyn RenderDevice, scene: &Scene) -> FrameGraphResult<()> {
        self.stats.reset();
        self.forward.command_queue.clear();
        self.shadow.clear_queues();

        let samples = scene.settings.msaa_samples.max(1);
        if samples != self.targets.samples {
            self.targets.set_samples(device, samples)?;
            self.forward.depth_texture = self.targets.depth;
            self.forward.normal_texture = self.targets.normal;
            info!("MSAA set to {} samples", samples);
        }

        self.select_environment(device, scene.environment)?;

        self.camera = self.override_camera.or_else(|| scene.cameras.first().copied());
        let Some(camera) = self.camera else {
            debug!("No camera, skipping scene queues");
            return Ok(());
        };

        let projection = camera.camera.projection();
        let view = camera.view();
        self.forward.frustum = Frustum::from_matrix(&(projection * view));

        let lights = collect_lights(&scene.lights, &self.forward.frustum, camera.camera.exposure, self.settings.max_lights);
        self.forward.light_count = lights.lights.len();

        if let Some(directional) = lights.directional.filter(|_| self.settings.shadow_pass && scene.settings.shadows_enabled) {
            self.shadow.update(&CascadeInput {
                near: camera.camera.near,
                fov: camera.camera.fov,
                aspect: camera.camera.aspect,
                camera_world: camera.world,
                light_direction: light_direction(&directional),
            });
        }

        self.queue_meshes(device, scene, &camera);

        if scene.settings.renderer_2d_enabled {
            self.sprites.queue(scene, &self.forward.frustum);
        }

        self.write_scene_uniforms(device, &scene.settings, &camera, &projection, &view)?;
        self.write_lighting_uniforms(device, &scene.settings, &camera, &view, bytemuck::cast_slice(&lights.lights))?;

        debug!(
            "Queued {} forward commands, {} shadow casters, {} sprites, {} lights",
            self.forward.command_queue.len(),
            self.shadow.caster_count(),
            self.sprites.sprite_count(),
            self.forward.light_count
        );
        Ok(())
    }

    fn queue_meshes(&mut self, device: &mut dyn RenderDevice, scene: &Scene, camera: &CameraView) {
        let forward_shader = self.context.compiled_shader(device, shader_names::FORWARD_PBR);
        let shadow_shaders = if self.shadow.valid {
            (
                self.context.compiled_shader(device, shader_names::SHADOW),
                self.context.compiled_shader(device, shader_names::SHADOW_ALPHA),
            )
        } else {
            (None, None)
        };
        let targets = ForwardTargets {
            colour: self.targets.main,
            depth: self.targets.depth,
            resolve: (self.targets.samples > 1).then_some(self.targets.resolve),
            samples: self.targets.samples,
            depth_test: self.settings.depth_test,
        };

        for mesh in scene.meshes.iter().filter(|mesh| mesh.active) {
            let bounds = mesh.bounds.transformed(&mesh.transform);
            let material = mesh.material.clone().unwrap_or_else(|| Arc::clone(&self.forward.default_material));
            let flags = material.flags;
            let depth_tested = self.settings.depth_test && flags.contains(MaterialFlags::DEPTH_TEST);

            if self.shadow.valid && !flags.contains(MaterialFlags::NO_SHADOW) {
                let shader = if flags.contains(MaterialFlags::ALPHA_BLEND) { shadow_shaders.1 } else { shadow_shaders.0 };
                if let Some(shader) = shader {
                    let desc = shadow_pipeline_desc(shader, flags, self.shadow.shadow_texture);
                    if let Ok(pipeline) = device.get_pipeline(&desc) {
                        for (cascade, queue) in self.shadow.frustums.iter().zip(self.shadow.queues.iter_mut()) {
                            if cascade.intersects_box(&bounds) {
                                queue.push(RenderCommand {
                                    mesh: mesh.mesh,
                                    transform: mesh.transform,
                                    material: Arc::clone(&material),
                                    pipeline,
                                    depth_tested,
                                });
                            }
                        }
                    }
                }
            }

            let Some(shader) = forward_shader else { continue };
            if !self.forward.frustum.intersects_box(&bounds) {
                continue;
            }
            if let Ok(pipeline) = device.get_pipeline(&forward_pipeline_desc(shader, flags, &targets)) {
                self.forward.command_queue.push(RenderCommand {
                    mesh: mesh.mesh,
                    transform: mesh.transform,
                    material,
                    pipeline,
                    depth_tested,
                });
            }
        }

        sort_forward_queue(&mut self.forward.command_queue, camera.position());
    }

    fn write_scene_uniforms(
        &self,
        device: &mut dyn RenderDevice,
        settings: &SceneRenderSettings,
        camera: &CameraView,
        projection: &Mat4,
        view: &Mat4,
    ) -> FrameGraphResult<()> {
        let set = self.forward.scene_set;
        device.set_uniform(set, "UBO", "projView", UniformValue::Mat4(projection * view))?;
        device.set_uniform(set, "UBO", "view", UniformValue::Mat4(*view))?;
        device.set_uniform(set, "UBO", "projection", UniformValue::Mat4(*projection))?;
        device.set_uniform(set, "UBO", "cameraPosition", UniformValue::Vec4(homogeneous(camera.position())))?;
        device.set_uniform(set, "UBO", "exposure", UniformValue::Float(camera.camera.exposure))?;
        device.set_uniform(set, "UBO", "msaaSamples", UniformValue::Int(i32::from(settings.msaa_samples.max(1))))?;
        device.update_descriptor_set(set)?;

        if self.shadow.valid {
            for &set in &self.shadow.descriptor_sets {
                device.set_uniform(set, "ShadowData", "DirLightMatrices", UniformValue::Mat4Array(self.shadow.proj_view.clone()))?;
                device.update_descriptor_set(set)?;
            }
        }
        Ok(())
    }

    fn write_lighting_uniforms(
        &self,
        device: &mut dyn RenderDevice,
        settings: &SceneRenderSettings,
        camera: &CameraView,
        view: &Mat4,
        lights: &[u8],
    ) -> FrameGraphResult<()> {
        let set = self.forward.lighting_set;
        let block = "UBOLight";
        let shadow = &self.shadow;
        let config = &shadow.config;
        let shadows_on = shadow.valid && self.settings.shadow_pass && settings.shadows_enabled;
        let ssao_on = settings.ssao_enabled && !self.settings.disable_post_process;
        let split_depths = shadow.split_depths.iter().map(|depth| Vec4::new(*depth, 0.0, 0.0, 0.0)).collect();

        device.set_uniform(set, block, "lights", UniformValue::Bytes(lights.to_vec()))?;
        device.set_uniform(set, block, "cameraPosition", UniformValue::Vec4(homogeneous(camera.position())))?;
        device.set_uniform(set, block, "viewMatrix", UniformValue::Mat4(*view))?;
        device.set_uniform(set, block, "lightView", UniformValue::Mat4(shadow.light_matrix))?;
        device.set_uniform(set, block, "uShadowTransform", UniformValue::Mat4Array(shadow.proj_view.clone()))?;
        device.set_uniform(set, block, "uSplitDepths", UniformValue::Vec4Array(split_depths))?;
        device.set_uniform(set, block, "biasMat", UniformValue::Mat4(utils::bias_matrix()))?;
        device.set_uniform(set, block, "LightSize", UniformValue::Float(config.light_size))?;
        device.set_uniform(set, block, "ShadowFade", UniformValue::Float(config.shadow_fade))?;
        device.set_uniform(set, block, "CascadeFade", UniformValue::Float(config.cascade_fade))?;
        device.set_uniform(set, block, "MaxShadowDistance", UniformValue::Float(config.max_shadow_distance))?;
        device.set_uniform(set, block, "InitialBias", UniformValue::Float(config.initial_bias))?;
        device.set_uniform(set, block, "Width", UniformValue::Float(self.targets.width as f32))?;
        device.set_uniform(set, block, "Height", UniformValue::Float(self.targets.height as f32))?;
        device.set_uniform(set, block, "shadowEnabled", UniformValue::Int(i32::from(shadows_on)))?;
        device.set_uniform(set, block, "LightCount", UniformValue::Int(self.forward.light_count as i32))?;
        device.set_uniform(set, block, "ShadowCount", UniformValue::Int(shadow.cascade_count() as i32))?;
        device.set_uniform(set, block, "RenderMode", UniformValue::Int(self.forward.render_mode))?;
        let mips = device.texture_mip_levels(self.forward.environment_map)?;
        device.set_uniform(set, block, "cubemapMipLevels", UniformValue::Int(mips as i32))?;

        let ssao_map = if ssao_on { self.targets.ssao } else { self.targets.default_texture };
        device.set_texture(set, "uBRDFLUT", TextureBinding::Single(self.forward.brdf_lut))?;
        device.set_texture(set, "uSSAOMap", TextureBinding::Single(ssao_map))?;
        device.set_texture(set, "uEnvMap", TextureBinding::Single(self.forward.environment_map))?;
        device.set_texture(set, "uIrrMap", TextureBinding::Single(self.forward.irradiance_map))?;
        device.set_texture(set, "uShadowMap", TextureBinding::Single(shadow.shadow_texture))?;
        device.update_descriptor_set(set)?;
        Ok(())
    }

    fn select_environment(&mut self, device: &mut dyn RenderDevice, environment: Option<Environment>) -> FrameGraphResult<()> {
        match environment {
            None if self.forward.bound_environment.is_some() => self.reset_environment(device),
            Some(environment) if self.forward.bound_environment != Some(environment.environment_map) => {
                self.recreate_lighting_set(device)?;
                self.forward.environment_map = environment.environment_map;
                self.forward.irradiance_map = environment.irradiance_map;
                self.forward.bound_environment = Some(environment.environment_map);
                self.geometry.reset_skybox(device);
                info!("Scene environment map changed");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn reset_environment(&mut self, device: &mut dyn RenderDevice) -> FrameGraphResult<()> {
        self.recreate_lighting_set(device)?;
        self.forward.environment_map = self.targets.default_cube;
        self.forward.irradiance_map = self.targets.default_cube;
        self.forward.bound_environment = None;
        self.geometry.reset_skybox(device);
        Ok(())
    }

    fn recreate_lighting_set(&mut self, device: &mut dyn RenderDevice) -> FrameGraphResult<()> {
        device.destroy_descriptor_set(self.forward.lighting_set);
        self.forward.lighting_set = device.create_descriptor_set(&DescriptorDesc::new(self.forward_shader, LIGHTING_LAYOUT))?;
        Ok(())
    }

    /// Record the frame queued by [`RenderPasses::begin_scene`]
    pub fn on_render(&mut self, device: &mut dyn RenderDevice, scene: &Scene) -> FrameGraphResult<()> {
        let settings = &scene.settings;
        let camera = self.camera;
        let ssao_on = settings.ssao_enabled && !self.settings.disable_post_process;

        device.clear_render_target(self.targets.main, Vec4::zeros())?;
        if ssao_on {
            device.clear_render_target(self.targets.normal, Vec4::zeros())?;
        }
        device.clear_render_target(self.targets.depth, Vec4::new(1.0, 0.0, 0.0, 0.0))?;

        if !self.context.brdf_generated {
            self.geometry.brdf_lut(device, &mut self.context, &self.targets, &mut self.stats)?;
        }

        if let Some(camera) = camera.filter(|_| self.settings.geom_pass && settings.renderer_3d_enabled) {
            trace!("Geometry passes");
            if settings.depth_prepass {
                self.geometry
                    .depth_prepass(device, &mut self.context, &self.forward, &self.targets, &mut self.stats)?;
            }
            if ssao_on {
                self.geometry
                    .ssao(device, &mut self.context, &camera, settings, &self.targets, &mut self.stats)?;
            }
            if self.settings.shadow_pass && settings.shadows_enabled {
                self.geometry
                    .shadow(device, &mut self.context, &self.shadow, &self.forward, &mut self.stats)?;
            }
            self.geometry.forward(device, &mut self.context, &self.forward, &mut self.stats)?;
        }

        if let Some(camera) = camera.filter(|_| self.settings.skybox_pass && settings.skybox_render_enabled) {
            self.geometry.skybox(
                device,
                &mut self.context,
                &camera,
                settings,
                &self.targets,
                self.forward.bound_environment,
                &mut self.stats,
            )?;
        }

        if let Some(camera) = camera.filter(|_| settings.renderer_2d_enabled) {
            let proj_view = camera.camera.projection() * camera.view();
            let targets = SpriteTargets {
                colour: self.targets.main,
                depth: self.targets.depth,
                resolve: self.targets.resolve,
                samples: self.targets.samples,
                default_texture: self.targets.default_texture,
            };
            self.sprites
                .render_2d(device, &mut self.context, &proj_view, &targets, &mut self.stats)?;
            self.sprites.render_text(
                device,
                &mut self.context,
                &proj_view,
                &targets,
                self.debug.font(),
                &mut self.stats,
            )?;
        }

        self.last_render_target = self.targets.chain_start();
        let mut chain = PingPong::new(self.last_render_target, self.targets.post_process);
        let post_targets = PostTargets {
            depth: self.targets.depth,
            bloom: self.targets.bloom,
            default_texture: self.targets.default_texture,
        };
        let frame = PostFrame {
            settings,
            camera: camera.as_ref(),
            gate: ChainGate {
                disable_post_process: self.settings.disable_post_process,
                post_process_pass: self.settings.post_process_pass,
                msaa: self.targets.samples > 1,
            },
            elapsed: scene.elapsed,
        };
        self.bloom_texture = self.post.run(device, &mut self.context, &mut chain, &post_targets, &frame)?;
        self.stats.num_draw_calls += self.post.draw_calls();
        self.last_render_target = chain.current();

        if self.settings.debug_pass && settings.debug_renderer_enabled {
            if let Some(camera) = camera.as_ref() {
                let depth = (self.targets.samples == 1).then_some(self.targets.depth);
                self.debug.render(
                    device,
                    &mut self.context,
                    &scene.debug,
                    camera,
                    chain.current(),
                    depth,
                    self.targets.default_texture,
                    &mut self.stats,
                )?;
            }
        }

        self.final_pass(device, settings, &chain)?;
        self.chain = Some(chain);

        debug!(
            "Frame recorded: {} objects, {} shadow casters, {} draw calls",
            self.stats.num_rendered_objects, self.stats.num_shadow_objects, self.stats.num_draw_calls
        );
        Ok(())
    }

    /// Texture the final pass shows for a debug view mode
    fn final_texture(&self, debug_mode: i32, chain: &PingPong<TextureHandle>) -> TextureHandle {
        match debug_mode {
            1 => self.targets.ssao,
            2 => self.targets.ssao_blur,
            3 => self.targets.normal,
            4 => self.bloom_texture,
            5 => self.targets.ssao_noise,
            6 => chain.previous(),
            _ => chain.current(),
        }
    }

    fn final_pass(
        &mut self,
        device: &mut dyn RenderDevice,
        settings: &SceneRenderSettings,
        chain: &PingPong<TextureHandle>,
    ) -> FrameGraphResult<()> {
        let Some(shader) = self.context.compiled_shader(device, shader_names::FINAL_PASS) else {
            return Ok(());
        };
        let set = match self.final_set {
            Some(set) => set,
            None => *self.final_set.insert(device.create_descriptor_set(&DescriptorDesc::new(shader, 0))?),
        };
        let texture = self.final_texture(settings.debug_mode, chain);
        device.set_texture(set, "u_Texture", TextureBinding::Single(texture))?;
        device.update_descriptor_set(set)?;

        let mut desc = PipelineDesc::new(shader, "Final Pass").with_cull_mode(CullMode::None);
        match self.render_target {
            Some(target) => desc = desc.with_colour_target(target),
            None => desc.swapchain_target = true,
        }
        let pipeline = device.get_pipeline(&desc)?;
        device.bind_pipeline(pipeline, None)?;
        device.bind_descriptor_sets(pipeline, &[set])?;
        device.draw(3)?;
        device.end_pipeline(pipeline)?;
        self.stats.num_draw_calls += 1;
        Ok(())
    }

    /// Counters of the last frame
    pub fn stats(&self) -> &RenderPassesStats {
        &self.stats
    }

    /// Graph settings
    pub fn settings(&self) -> &RenderPassesSettings {
        &self.settings
    }

    /// Owned textures
    pub fn targets(&self) -> &RenderTargets {
        &self.targets
    }

    /// Forward pass state and queue
    pub fn forward_data(&self) -> &ForwardData {
        &self.forward
    }

    /// Cascade state and queues
    pub fn shadow_data(&self) -> &ShadowData {
        &self.shadow
    }

    /// Camera used by the last `begin_scene`
    pub fn camera(&self) -> Option<&CameraView> {
        self.camera.as_ref()
    }

    /// Output of the last post-process stage, the texture the final pass blits
    pub fn last_render_target(&self) -> TextureHandle {
        self.last_render_target
    }

    /// Bloom contribution tone mapping sampled last frame
    pub fn bloom_texture(&self) -> TextureHandle {
        self.bloom_texture
    }

    /// Ping-pong pair as the last frame left it
    pub fn post_process_chain(&self) -> Option<&PingPong<TextureHandle>> {
        self.chain.as_ref()
    }

    /// Whether the BRDF lookup table has been rendered
    pub fn brdf_generated(&self) -> bool {
        self.context.brdf_generated
    }

    /// Release every resource the graph owns
    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        self.geometry.destroy(device);
        self.sprites.destroy(device);
        self.post.destroy(device);
        self.debug.destroy(device);
        let sets = [self.forward.scene_set, self.forward.lighting_set, self.forward.default_material_set];
        for set in sets.into_iter().chain(self.shadow.descriptor_sets.drain(..)).chain(self.final_set.take()) {
            device.destroy_descriptor_set(set);
        }
        self.targets.destroy(device);
        info!("Render passes destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Transform, Vec2};
    use crate::rhi::headless::{HeadlessDevice, RecordedCommand};
    use crate::rhi::{DeviceCapabilities, MeshHandle};
    use crate::scene::{Camera, Light, Sprite};
    use crate::spatial::BoundingBox;

    const WIDTH: u32 = 640;
    const HEIGHT: u32 = 360;

    fn device() -> HeadlessDevice {
        HeadlessDevice::with_standard_shaders(DeviceCapabilities::default(), WIDTH, HEIGHT)
    }

    fn camera() -> CameraView {
        let camera = Camera { aspect: WIDTH as f32 / HEIGHT as f32, ..Camera::default() };
        CameraView::new(camera, Transform::from_position(Vec3::new(0.0, 1.0, 8.0)).to_matrix())
    }

    fn sun() -> Transform {
        let rotation = Quat::from_axis_angle(&Vec3::x_axis(), -std::f32::consts::FRAC_PI_3);
        Transform::from_position_rotation(Vec3::new(0.0, 20.0, 0.0), rotation)
    }

    fn cube_scene() -> Scene {
        Scene::new()
            .with_camera(camera())
            .with_light(Light::directional(Vec4::repeat(1.0), 3.0), sun())
            .with_mesh(MeshHandle(1), BoundingBox::unit(), Mat4::identity(), None)
    }

    fn frame(passes: &mut RenderPasses, device: &mut HeadlessDevice, scene: &Scene) {
        device.clear_commands();
        passes.begin_scene(device, scene).unwrap();
        passes.on_render(device, scene).unwrap();
    }

    fn position(names: &[&str], name: &str) -> usize {
        names.iter().position(|n| *n == name).unwrap_or_else(|| panic!("{name} not bound in {names:?}"))
    }

    #[test]
    fn test_new_requires_forward_shader() {
        let mut device = device();
        device.remove_shader(shader_names::FORWARD_PBR);
        let result = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT);
        assert!(matches!(result, Err(FrameGraphError::MissingResource(_))));
    }

    #[test]
    fn test_single_cube_queued_once_per_containing_cascade() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let scene = cube_scene();
        frame(&mut passes, &mut device, &scene);

        assert_eq!(passes.forward_data().command_queue.len(), 1);

        let shadow = passes.shadow_data();
        assert!(shadow.valid);
        let bounds = BoundingBox::unit();
        for (frustum, queue) in shadow.frustums.iter().zip(&shadow.queues) {
            let expected = usize::from(frustum.intersects_box(&bounds));
            assert_eq!(queue.len(), expected);
        }
        assert!(shadow.caster_count() >= 1);
        assert_eq!(passes.stats().num_shadow_objects as usize, shadow.caster_count());
        assert_eq!(passes.stats().num_rendered_objects, 1);
    }

    #[test]
    fn test_mesh_outside_every_frustum_is_not_queued() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let scene = Scene::new()
            .with_camera(camera())
            .with_light(Light::directional(Vec4::repeat(1.0), 3.0), sun())
            .with_mesh(MeshHandle(7), BoundingBox::unit(), Mat4::new_translation(&Vec3::new(0.0, 0.0, 5000.0)), None);
        frame(&mut passes, &mut device, &scene);

        assert!(passes.forward_data().command_queue.is_empty());
        assert_eq!(passes.shadow_data().caster_count(), 0);
        assert!(!device.commands().iter().any(|c| matches!(c, RecordedCommand::DrawMesh { .. })));
    }

    #[test]
    fn test_no_directional_light_skips_shadows() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let scene = Scene::new()
            .with_camera(camera())
            .with_light(Light::point(Vec4::repeat(1.0), 1.0, 5.0), Transform::identity())
            .with_mesh(MeshHandle(1), BoundingBox::unit(), Mat4::identity(), None);
        frame(&mut passes, &mut device, &scene);

        assert!(!passes.shadow_data().valid);
        assert_eq!(passes.shadow_data().caster_count(), 0);
        assert!(!device.bound_pipeline_names().contains(&"Shadow"));
        assert_eq!(passes.forward_data().command_queue.len(), 1);
    }

    #[test]
    fn test_passes_recorded_in_order() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let mut scene = cube_scene().with_sprite(Sprite::default(), Mat4::identity());
        scene.settings.depth_prepass = true;
        scene.settings.ssao_enabled = true;
        scene.settings.debug_renderer_enabled = true;
        scene.debug.draw_line(Vec3::zeros(), Vec3::x(), Vec4::repeat(1.0), false);
        passes.enable_debug_renderer(&mut device, true);
        frame(&mut passes, &mut device, &scene);

        let names = device.bound_pipeline_names();
        let order = [
            "BRDF Generation",
            "Depth Prepass",
            "SSAO",
            "SSAO Blur",
            "Shadow",
            "Forward PBR DepthTested",
            "2D",
            "ToneMapping",
            "Debug-Lines",
            "Final Pass",
        ];
        let positions: Vec<usize> = order.iter().map(|name| position(&names, name)).collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{names:?}");
        assert_eq!(names.last(), Some(&"Final Pass"));

        let first_clear = device.commands().iter().position(|c| matches!(c, RecordedCommand::Clear { .. })).unwrap();
        let first_bind = device.commands().iter().position(|c| matches!(c, RecordedCommand::BindPipeline { .. })).unwrap();
        assert!(first_clear < first_bind);
    }

    #[test]
    fn test_brdf_lut_rendered_once() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let scene = cube_scene();
        frame(&mut passes, &mut device, &scene);
        assert!(passes.brdf_generated());
        frame(&mut passes, &mut device, &scene);
        assert!(!device.bound_pipeline_names().contains(&"BRDF Generation"));
    }

    #[test]
    fn test_bloom_disabled_tone_maps_default_texture() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let mut scene = cube_scene();
        frame(&mut passes, &mut device, &scene);
        assert_ne!(passes.bloom_texture(), passes.targets().default_texture);

        scene.settings.bloom_enabled = false;
        frame(&mut passes, &mut device, &scene);
        assert_eq!(passes.bloom_texture(), passes.targets().default_texture);
        let bound = device.commands().iter().any(|c| {
            matches!(c, RecordedCommand::SetTexture { name, binding: TextureBinding::Single(t), .. }
                if name == "u_BloomTexture" && *t == passes.targets().default_texture)
        });
        assert!(bound);
    }

    #[test]
    fn test_last_render_target_follows_swap_parity() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let mut scene = cube_scene();
        scene.settings.sharpen_enabled = true;
        frame(&mut passes, &mut device, &scene);

        // Debanding, tone mapping, sharpen and FXAA each swap; bloom does not
        let chain = passes.post_process_chain().unwrap();
        assert_eq!(chain.swap_count(), 4);
        assert_eq!(passes.last_render_target(), chain.current());
        assert_eq!(passes.last_render_target(), passes.targets().main);

        scene.settings.sharpen_enabled = false;
        frame(&mut passes, &mut device, &scene);
        assert_eq!(passes.post_process_chain().unwrap().swap_count(), 3);
        assert_eq!(passes.last_render_target(), passes.targets().post_process);
    }

    #[test]
    fn test_disable_post_process_keeps_tone_mapping() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        passes.set_disable_post_process(true);
        let mut scene = cube_scene();
        scene.settings.ssao_enabled = true;
        frame(&mut passes, &mut device, &scene);

        let names = device.bound_pipeline_names();
        assert!(names.contains(&"ToneMapping"));
        assert!(!names.contains(&"SSAO"));
        assert!(!names.contains(&"FXAA"));
        assert_eq!(passes.post_process_chain().unwrap().swap_count(), 1);
    }

    #[test]
    fn test_uncompiled_shader_skips_only_its_pass() {
        let mut device = device();
        device.set_compiled(shader_names::SSAO, false);
        device.remove_shader(shader_names::TONE_MAPPING);
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let mut scene = cube_scene();
        scene.settings.ssao_enabled = true;
        frame(&mut passes, &mut device, &scene);

        let names = device.bound_pipeline_names();
        assert!(!names.contains(&"SSAO"));
        assert!(!names.contains(&"ToneMapping"));
        assert!(names.contains(&"Forward PBR DepthTested"));
        assert!(names.contains(&"Final Pass"));
    }

    #[test]
    fn test_seventeenth_texture_flushes_sprite_batch() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let mut scene = Scene::new().with_camera(camera());
        for i in 0..17 {
            let texture = device
                .create_texture(&TextureDesc::colour(&format!("Sprite {i}"), TextureFormat::Rgba8, 8, 8))
                .unwrap();
            let sprite = Sprite { position: Vec2::new(-0.5, -0.5), texture: Some(texture), ..Sprite::default() };
            scene = scene.with_sprite(sprite, Mat4::new_translation(&Vec3::new(0.0, 0.0, i as f32 * 0.01)));
        }
        frame(&mut passes, &mut device, &scene);

        let indexed: Vec<u32> = device
            .commands()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::DrawIndexed { index_count } => Some(*index_count),
                _ => None,
            })
            .collect();
        assert_eq!(indexed, vec![16 * 6, 6]);
        assert_eq!(passes.stats().num_rendered_objects, 17);
    }

    #[test]
    fn test_resize_rounds_to_even_then_scales() {
        let mut device = device();
        let mut settings = RenderPassesSettings::default();
        settings.quality.renderer_scale = 0.5;
        let mut passes = RenderPasses::new(&mut device, settings, WIDTH, HEIGHT).unwrap();
        assert_eq!((passes.targets().width, passes.targets().height), (320, 180));

        passes.on_resize(&mut device, 1281, 721).unwrap();
        let targets = passes.targets();
        assert_eq!((targets.width, targets.height), (640, 360));
        assert_eq!(device.texture_size(targets.main, 0).unwrap(), (640, 360));
        assert_eq!(device.texture_size(targets.ssao, 0).unwrap(), (320, 180));
    }

    #[test]
    fn test_msaa_recreates_targets_and_resolves() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let old_main = passes.targets().main;
        let mut scene = cube_scene();
        scene.settings.msaa_samples = 4;
        scene.settings.depth_of_field_enabled = true;
        frame(&mut passes, &mut device, &scene);

        let targets = passes.targets().clone();
        assert_eq!(targets.samples, 4);
        assert_ne!(targets.main, old_main);
        assert!(!device.texture_exists(old_main));

        let forward = passes.forward_data().command_queue[0].pipeline;
        let desc = device.pipeline_desc(forward).unwrap();
        assert_eq!(desc.samples, 4);
        assert_eq!(desc.resolve_target, Some(targets.resolve));
        assert!(!device.bound_pipeline_names().contains(&"DepthofField"));
    }

    #[test]
    fn test_without_camera_only_post_and_final_run() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let scene = Scene::new().with_mesh(MeshHandle(1), BoundingBox::unit(), Mat4::identity(), None);
        frame(&mut passes, &mut device, &scene);

        let names = device.bound_pipeline_names();
        assert!(!names.iter().any(|name| name.starts_with("Forward")));
        assert_eq!(names.last(), Some(&"Final Pass"));
        assert!(passes.forward_data().command_queue.is_empty());
    }

    #[test]
    fn test_debug_pass_needs_initialised_overlay() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let mut scene = cube_scene();
        scene.settings.debug_renderer_enabled = true;
        scene.debug.draw_line(Vec3::zeros(), Vec3::y(), Vec4::repeat(1.0), true);
        frame(&mut passes, &mut device, &scene);
        assert!(!device.bound_pipeline_names().contains(&"Debug-Lines"));

        passes.enable_debug_renderer(&mut device, true);
        frame(&mut passes, &mut device, &scene);
        let lines = device
            .commands()
            .iter()
            .find_map(|c| match c {
                RecordedCommand::BindPipeline { pipeline, name, .. } if name == "Debug-Lines" => Some(*pipeline),
                _ => None,
            })
            .unwrap();
        let desc = device.pipeline_desc(lines).unwrap();
        assert_eq!(desc.colour_targets, vec![passes.last_render_target()]);
        assert_eq!(desc.depth_target, Some(passes.targets().depth));
    }

    #[test]
    fn test_final_pass_debug_views() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let target = device.create_texture(&TextureDesc::colour("Editor", TextureFormat::Rgba8, WIDTH, HEIGHT)).unwrap();
        passes.set_render_target(Some(target));
        let mut scene = cube_scene();

        for (mode, expected) in [(3, passes.targets().normal), (5, passes.targets().ssao_noise)] {
            scene.settings.debug_mode = mode;
            frame(&mut passes, &mut device, &scene);
            let set = passes.final_set.unwrap();
            assert_eq!(device.texture_binding(set, "u_Texture"), Some(&TextureBinding::Single(expected)));
        }

        scene.settings.debug_mode = 0;
        frame(&mut passes, &mut device, &scene);
        let set = passes.final_set.unwrap();
        assert_eq!(device.texture_binding(set, "u_Texture"), Some(&TextureBinding::Single(passes.last_render_target())));

        let final_pipeline = device
            .commands()
            .iter()
            .rev()
            .find_map(|c| match c {
                RecordedCommand::BindPipeline { pipeline, .. } => Some(*pipeline),
                _ => None,
            })
            .unwrap();
        let desc = device.pipeline_desc(final_pipeline).unwrap();
        assert_eq!(desc.colour_targets, vec![target]);
        assert!(!desc.swapchain_target);
    }

    #[test]
    fn test_environment_change_rebinds_lighting_and_skybox() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let mut scene = cube_scene();
        frame(&mut passes, &mut device, &scene);
        assert!(!device.bound_pipeline_names().contains(&"Skybox"));

        let environment = passes.create_cube_map(&mut device, None, Vec4::zeros()).unwrap().unwrap();
        let old_set = passes.forward_data().lighting_set;
        scene.environment = Some(environment);
        frame(&mut passes, &mut device, &scene);

        let forward = passes.forward_data();
        assert_ne!(forward.lighting_set, old_set);
        assert_eq!(forward.bound_environment, Some(environment.environment_map));
        assert_eq!(
            device.texture_binding(forward.lighting_set, "uEnvMap"),
            Some(&TextureBinding::Single(environment.environment_map))
        );
        assert!(device.bound_pipeline_names().contains(&"Skybox"));

        passes.on_new_scene(&mut device).unwrap();
        assert_eq!(passes.forward_data().bound_environment, None);
        assert_eq!(passes.forward_data().environment_map, passes.targets().default_cube);
    }

    #[test]
    fn test_override_camera_replaces_scene_camera() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let away = CameraView::new(Camera::default(), Transform::from_position(Vec3::new(0.0, 0.0, -8.0)).to_matrix());
        passes.set_override_camera(Some(away));
        frame(&mut passes, &mut device, &cube_scene());

        assert_eq!(passes.camera(), Some(&away));
        // Looking away from the cube
        assert!(passes.forward_data().command_queue.is_empty());
    }

    #[test]
    fn test_destroy_releases_descriptor_sets_and_buffers() {
        let mut device = device();
        let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), WIDTH, HEIGHT).unwrap();
        let mut scene = cube_scene().with_sprite(Sprite::default(), Mat4::identity());
        scene.settings.ssao_enabled = true;
        frame(&mut passes, &mut device, &scene);
        assert!(device.live_descriptor_sets() > 0);
        assert!(device.live_buffers() > 0);

        let main = passes.targets().main;
        passes.destroy(&mut device);
        assert_eq!(device.live_descriptor_sets(), 0);
        assert_eq!(device.live_buffers(), 0);
        assert!(!device.texture_exists(main));
    }
}
