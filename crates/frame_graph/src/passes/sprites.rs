//! 2D sprite and text passes

use super::context::RenderContext;
use super::queue::{sort_2d_queue, RenderCommand2D, TextCommand};
use super::shader_names;
use crate::batch::{push_text, BatchPass, BatchShape, GlyphStyle, PrimitiveBatcher, QuadVertex, TextVertex};
use crate::error::FrameGraphResult;
use crate::foundation::math::{translation_of, Mat4, Point3, Vec3};
use crate::rhi::{CullMode, DescriptorDesc, DescriptorSetHandle, PipelineDesc, RenderDevice, ShaderHandle, TextureHandle, UniformValue};
use crate::scene::{Scene, SpriteInstance};
use crate::settings::{BatchLimits, RenderPassesStats};
use crate::spatial::{Frustum, Rect};
use crate::text::{layout_text, FontGeometry, TextLayoutParams};
use log::trace;
use std::cmp::Ordering;
use std::sync::Arc;

/// Colour, depth and sample count the 2D passes draw into
#[derive(Debug, Clone, Copy)]
pub(super) struct SpriteTargets {
    pub colour: TextureHandle,
    pub depth: TextureHandle,
    pub resolve: TextureHandle,
    pub samples: u8,
    pub default_texture: TextureHandle,
}

/// Sprite and text batchers with their per-frame queues
#[derive(Debug)]
pub(super) struct SpritePasses {
    renderer_2d: PrimitiveBatcher<QuadVertex>,
    text: PrimitiveBatcher<TextVertex>,
    sprite_set: Option<DescriptorSetHandle>,
    text_set: Option<DescriptorSetHandle>,
    sprite_queue: Vec<RenderCommand2D>,
    text_queue: Vec<TextCommand>,
}

fn sprite_visible(instance: &SpriteInstance, frustum: &Frustum) -> bool {
    let bounds = Rect::new(instance.sprite.position, instance.sprite.scale)
        .to_bounding_box()
        .transformed(&instance.transform);
    frustum.intersects_box(&bounds)
}

fn scene_set(
    slot: &mut Option<DescriptorSetHandle>,
    device: &mut dyn RenderDevice,
    shader: ShaderHandle,
) -> FrameGraphResult<DescriptorSetHandle> {
    if let Some(set) = *slot {
        return Ok(set);
    }
    let set = device.create_descriptor_set(&DescriptorDesc::new(shader, 0))?;
    *slot = Some(set);
    Ok(set)
}

impl SpritePasses {
    pub(super) fn new(limits: &BatchLimits) -> Self {
        Self {
            renderer_2d: PrimitiveBatcher::new(
                "Renderer2D",
                BatchShape::QUADS,
                limits.max_quads,
                limits.max_textures,
                limits.max_batch_draw_calls,
            ),
            text: PrimitiveBatcher::new("Text", BatchShape::QUADS, limits.max_quads, limits.max_textures, limits.max_batch_draw_calls),
            sprite_set: None,
            text_set: None,
            sprite_queue: Vec::new(),
            text_queue: Vec::new(),
        }
    }

    /// Cull active sprites against the camera and gather text, both in painter's order
    pub(super) fn queue(&mut self, scene: &Scene, frustum: &Frustum) {
        self.sprite_queue.clear();
        self.text_queue.clear();

        self.sprite_queue.extend(
            scene
                .sprites
                .iter()
                .filter(|instance| instance.active && sprite_visible(instance, frustum))
                .map(|instance| RenderCommand2D { sprite: instance.sprite, transform: instance.transform }),
        );
        sort_2d_queue(&mut self.sprite_queue);

        self.text_queue
            .extend(scene.texts.iter().map(|instance| TextCommand { text: instance.text.clone(), transform: instance.transform }));
        self.text_queue.sort_by(|a, b| {
            translation_of(&a.transform)
                .z
                .partial_cmp(&translation_of(&b.transform).z)
                .unwrap_or(Ordering::Equal)
        });
    }

    /// Sprites queued this frame
    pub(super) fn sprite_count(&self) -> usize {
        self.sprite_queue.len()
    }

    /// Text queued this frame
    pub(super) fn text_count(&self) -> usize {
        self.text_queue.len()
    }

    /// Draw calls issued by both batchers this frame
    pub(super) fn draw_calls(&self) -> u32 {
        self.renderer_2d.draw_calls() + self.text.draw_calls()
    }

    pub(super) fn render_2d(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        proj_view: &Mat4,
        targets: &SpriteTargets,
        stats: &mut RenderPassesStats,
    ) -> FrameGraphResult<()> {
        self.renderer_2d.reset();
        if self.sprite_queue.is_empty() {
            return Ok(());
        }
        let Some(shader) = context.compiled_shader(device, shader_names::BATCH_2D) else {
            return Ok(());
        };

        let set = scene_set(&mut self.sprite_set, device, shader)?;
        device.set_uniform(set, "UBO", "projView", UniformValue::Mat4(*proj_view))?;
        device.update_descriptor_set(set)?;

        let desc = PipelineDesc::new(shader, "2D")
            .with_colour_target(targets.colour)
            .with_depth_target(Some(targets.depth))
            .with_alpha_blend()
            .with_cull_mode(CullMode::None)
            .with_samples(targets.samples, Some(targets.resolve));
        let pipeline = device.get_pipeline(&desc)?;
        device.bind_pipeline(pipeline, None)?;
        self.renderer_2d.begin_pass(
            device,
            BatchPass { pipeline, scene_set: set, texture_shader: Some(shader), default_texture: targets.default_texture },
        )?;

        for command in &self.sprite_queue {
            let sprite = &command.sprite;
            self.renderer_2d.reserve(device)?;
            let slot = match sprite.texture {
                Some(texture) => self.renderer_2d.submit_texture(device, texture)?,
                None => 0.0,
            };

            let (min, size) = (sprite.position, sprite.scale);
            let corners = [
                Vec3::new(min.x, min.y, 0.0),
                Vec3::new(min.x + size.x, min.y, 0.0),
                Vec3::new(min.x + size.x, min.y + size.y, 0.0),
                Vec3::new(min.x, min.y + size.y, 0.0),
            ];
            let vertices: [QuadVertex; 4] = std::array::from_fn(|i| {
                let world = command.transform.transform_point(&Point3::from(corners[i]));
                QuadVertex::new(world.coords, sprite.uvs[i], slot, sprite.colour)
            });
            self.renderer_2d.push(&vertices);
            stats.num_rendered_objects += 1;
        }

        self.renderer_2d.end_pass(device)?;
        device.end_pipeline(pipeline)?;
        stats.num_draw_calls += self.renderer_2d.draw_calls();
        trace!("2D pass drew {} sprites in {} batches", self.sprite_queue.len(), self.renderer_2d.draw_calls());
        Ok(())
    }

    pub(super) fn render_text(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        proj_view: &Mat4,
        targets: &SpriteTargets,
        default_font: Option<&Arc<FontGeometry>>,
        stats: &mut RenderPassesStats,
    ) -> FrameGraphResult<()> {
        self.text.reset();
        if self.text_queue.is_empty() {
            return Ok(());
        }
        let Some(shader) = context.compiled_shader(device, shader_names::TEXT) else {
            return Ok(());
        };

        let set = scene_set(&mut self.text_set, device, shader)?;
        device.set_uniform(set, "UBO", "projView", UniformValue::Mat4(*proj_view))?;
        device.update_descriptor_set(set)?;

        let desc = PipelineDesc::new(shader, "Text")
            .with_colour_target(targets.colour)
            .with_alpha_blend()
            .with_cull_mode(CullMode::None)
            .with_samples(targets.samples, Some(targets.resolve));
        let pipeline = device.get_pipeline(&desc)?;
        device.bind_pipeline(pipeline, None)?;
        self.text.begin_pass(
            device,
            BatchPass { pipeline, scene_set: set, texture_shader: Some(shader), default_texture: targets.default_texture },
        )?;

        for command in &self.text_queue {
            let Some(font) = command.text.font.as_ref().or(default_font) else {
                context.warn_once("text-no-font", "Text component has no font and no default font is set, skipping");
                continue;
            };
            let layout = layout_text(font, &command.text.text, &TextLayoutParams::from_component(&command.text));
            let style = GlyphStyle {
                colour: command.text.colour,
                outline_colour: command.text.outline_colour,
                outline_width: command.text.outline_width,
            };
            push_text(device, &mut self.text, font, &layout, &command.transform, &style)?;
            stats.num_rendered_objects += 1;
        }

        self.text.end_pass(device)?;
        device.end_pipeline(pipeline)?;
        stats.num_draw_calls += self.text.draw_calls();
        Ok(())
    }

    /// Release batch buffers and descriptor sets
    pub(super) fn destroy(&mut self, device: &mut dyn RenderDevice) {
        self.renderer_2d.destroy(device);
        self.text.destroy(device);
        for set in [self.sprite_set.take(), self.text_set.take()].into_iter().flatten() {
            device.destroy_descriptor_set(set);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{look_at, perspective_zo, Vec2, Vec4};
    use crate::rhi::headless::{HeadlessDevice, RecordedCommand};
    use crate::rhi::DeviceCapabilities;
    use crate::scene::Sprite;

    fn camera_frustum() -> Frustum {
        let projection = perspective_zo(std::f32::consts::FRAC_PI_3, 1.0, 0.1, 100.0);
        let view = look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), Vec3::y());
        Frustum::from_matrix(&(projection * view))
    }

    #[test]
    fn test_sprites_culled_and_sorted_by_depth() {
        let scene = Scene::new()
            .with_sprite(Sprite::default(), Mat4::new_translation(&Vec3::new(0.0, 0.0, 1.0)))
            .with_sprite(Sprite::default(), Mat4::new_translation(&Vec3::new(0.0, 0.0, -1.0)))
            .with_sprite(Sprite::default(), Mat4::new_translation(&Vec3::new(500.0, 0.0, 0.0)));

        let mut passes = SpritePasses::new(&BatchLimits::default());
        passes.queue(&scene, &camera_frustum());

        assert_eq!(passes.sprite_count(), 2);
        assert!(translation_of(&passes.sprite_queue[0].transform).z < translation_of(&passes.sprite_queue[1].transform).z);
    }

    #[test]
    fn test_untextured_sprites_share_one_batch() {
        let mut device = HeadlessDevice::with_standard_shaders(DeviceCapabilities::default(), 64, 64);
        let colour = device.create_texture(&crate::rhi::TextureDesc::colour("Main", crate::rhi::TextureFormat::Rgba16F, 64, 64)).unwrap();
        let depth = device.create_texture(&crate::rhi::TextureDesc::depth("Depth", 64, 64)).unwrap();
        let default_texture = device.create_texture(&crate::rhi::TextureDesc::colour("Default", crate::rhi::TextureFormat::Rgba8, 1, 1)).unwrap();
        let targets = SpriteTargets { colour, depth, resolve: colour, samples: 1, default_texture };

        let mut scene = Scene::new();
        for i in 0..5 {
            let sprite = Sprite { position: Vec2::new(-0.5, -0.5), colour: Vec4::new(1.0, 0.0, 0.0, 1.0), ..Sprite::default() };
            scene = scene.with_sprite(sprite, Mat4::new_translation(&Vec3::new(i as f32 * 0.1, 0.0, 0.0)));
        }

        let mut passes = SpritePasses::new(&BatchLimits::default());
        passes.queue(&scene, &camera_frustum());
        let mut stats = RenderPassesStats::default();
        passes.render_2d(&mut device, &mut RenderContext::new(), &Mat4::identity(), &targets, &mut stats).unwrap();

        assert_eq!(stats.num_rendered_objects, 5);
        assert_eq!(passes.draw_calls(), 1);
        assert_eq!(device.bound_pipeline_names(), vec!["2D"]);
    }

    #[test]
    fn test_text_without_font_is_skipped() {
        let mut device = HeadlessDevice::with_standard_shaders(DeviceCapabilities::default(), 64, 64);
        let colour = device.create_texture(&crate::rhi::TextureDesc::colour("Main", crate::rhi::TextureFormat::Rgba16F, 64, 64)).unwrap();
        let depth = device.create_texture(&crate::rhi::TextureDesc::depth("Depth", 64, 64)).unwrap();
        let targets = SpriteTargets { colour, depth, resolve: colour, samples: 1, default_texture: colour };

        let mut scene = Scene::new();
        scene.texts.push(crate::scene::TextInstance {
            text: crate::scene::TextComponent { text: "hi".into(), ..Default::default() },
            transform: Mat4::identity(),
        });

        let mut passes = SpritePasses::new(&BatchLimits::default());
        passes.queue(&scene, &camera_frustum());
        assert_eq!(passes.text_count(), 1);

        let mut stats = RenderPassesStats::default();
        passes.render_text(&mut device, &mut RenderContext::new(), &Mat4::identity(), &targets, None, &mut stats).unwrap();
        assert_eq!(stats.num_rendered_objects, 0);
        assert_eq!(device.draw_call_count(), 0);
    }

    #[test]
    fn test_long_text_flushes_mid_string_in_glyph_order() {
        let mut device = HeadlessDevice::with_standard_shaders(DeviceCapabilities::default(), 64, 64);
        let colour = device.create_texture(&crate::rhi::TextureDesc::colour("Main", crate::rhi::TextureFormat::Rgba16F, 64, 64)).unwrap();
        let depth = device.create_texture(&crate::rhi::TextureDesc::depth("Depth", 64, 64)).unwrap();
        let atlas = device.create_texture(&crate::rhi::TextureDesc::colour("Atlas", crate::rhi::TextureFormat::Rgba8, 128, 128)).unwrap();
        let targets = SpriteTargets { colour, depth, resolve: colour, samples: 1, default_texture: colour };
        let font = Arc::new(FontGeometry::monospace(atlas, 128, 16, "abc?"));

        let mut scene = Scene::new();
        scene.texts.push(crate::scene::TextInstance {
            text: crate::scene::TextComponent { text: "abcabcabca".into(), ..Default::default() },
            transform: Mat4::identity(),
        });

        let limits = BatchLimits { max_quads: 4, ..BatchLimits::default() };
        let mut passes = SpritePasses::new(&limits);
        passes.queue(&scene, &camera_frustum());
        let mut stats = RenderPassesStats::default();
        passes
            .render_text(&mut device, &mut RenderContext::new(), &Mat4::identity(), &targets, Some(&font), &mut stats)
            .unwrap();

        let draws: Vec<u32> = device
            .commands()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::DrawIndexed { index_count } => Some(*index_count),
                _ => None,
            })
            .collect();
        assert_eq!(draws, vec![24, 24, 12]);
        assert_eq!(passes.draw_calls(), 3);
        assert_eq!(stats.num_draw_calls, 3);

        let stride = std::mem::size_of::<TextVertex>();
        let mut glyph_x = Vec::new();
        for command in device.commands() {
            let RecordedCommand::UploadBuffer { buffer, .. } = command else { continue };
            let Some(bytes) = device.buffer_data(*buffer) else { continue };
            if bytes.len() % (4 * stride) != 0 {
                continue;
            }
            let vertices: Vec<TextVertex> = bytes.chunks_exact(stride).map(bytemuck::pod_read_unaligned).collect();
            glyph_x.extend(vertices.chunks(4).map(|q| q[0].position[0]));
        }
        assert_eq!(glyph_x.len(), 10);
        assert!(glyph_x.windows(2).all(|pair| pair[0] < pair[1]), "glyphs out of order: {glyph_x:?}");
    }
}
