//! Debug overlay pass
//!
//! Draws a [`DebugDrawList`] on top of the frame: lines, wide lines, point
//! sprites and triangles first with depth testing, then without, followed by
//! three text layers (world space, screen pixels, clip space).

use super::{DebugDrawList, DebugPrimitives, DebugText};
use crate::batch::{push_text, BatchPass, BatchShape, GlyphStyle, LineVertex, PointVertex, PrimitiveBatcher, QuadVertex, TextVertex};
use crate::error::FrameGraphResult;
use crate::foundation::math::{orthographic_zo, Mat4, Vec2, Vec3};
use crate::passes::{shader_names, RenderContext};
use crate::rhi::{
    CullMode, DepthBias, DescriptorDesc, DescriptorSetHandle, DrawType, PipelineDesc, PipelineHandle, RenderDevice, ShaderHandle,
    TextureHandle, UniformValue,
};
use crate::scene::CameraView;
use crate::text::{layout_text, FontGeometry, TextLayoutParams};
use log::trace;
use std::collections::HashMap;
use std::sync::Arc;

const MAX_LINE_INDICES: usize = 2000;
const MAX_POINT_INDICES: usize = 6000;
const MAX_TRIANGLES: usize = 1000;
const MAX_GLYPHS: usize = 1000;
const MAX_BATCH_DRAW_CALLS: usize = 100;
const POINT_CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

/// Per-frame inputs of the overlay
#[derive(Debug, Clone, Copy)]
pub struct OverlayFrame<'a> {
    /// Primitives to draw
    pub list: &'a DebugDrawList,
    /// Active camera
    pub camera: &'a CameraView,
    /// Colour target, the current post-process output
    pub colour: TextureHandle,
    /// Depth target for depth-tested primitives; `None` draws them untested
    pub depth: Option<TextureHandle>,
    /// Texture used to pad batch texture arrays
    pub default_texture: TextureHandle,
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextSpace {
    World,
    Screen,
    Clip,
}

impl TextSpace {
    const fn debug_name(self) -> &'static str {
        match self {
            Self::World => "Debug-TextDT",
            Self::Screen => "Debug-TextNDT",
            Self::Clip => "Debug-TextCS",
        }
    }

    /// Label model matrix; world labels face the camera
    fn model(self, text: &DebugText, camera: &CameraView) -> Mat4 {
        let translation = Mat4::new_translation(&text.position);
        match self {
            Self::World => translation * camera.rotation() * Mat4::new_scaling(text.size / 10.0),
            Self::Screen | Self::Clip => translation * Mat4::new_scaling(text.size),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Layer {
    name: &'static str,
    shader: ShaderHandle,
    depth: Option<TextureHandle>,
}

/// Batchers and descriptor sets of the debug overlay
#[derive(Debug)]
pub struct DebugOverlay {
    lines: PrimitiveBatcher<LineVertex>,
    thick_lines: PrimitiveBatcher<LineVertex>,
    points: PrimitiveBatcher<PointVertex>,
    triangles: PrimitiveBatcher<QuadVertex>,
    text: PrimitiveBatcher<TextVertex>,
    scene_sets: HashMap<&'static str, DescriptorSetHandle>,
    font: Option<Arc<FontGeometry>>,
    max_textures: usize,
}

impl DebugOverlay {
    /// Create the overlay; `max_textures` bounds the text atlas slots per batch
    pub fn new(max_textures: usize) -> Self {
        Self {
            lines: PrimitiveBatcher::new("Debug-Lines", BatchShape::LINES, MAX_LINE_INDICES / 2, 1, MAX_BATCH_DRAW_CALLS),
            thick_lines: PrimitiveBatcher::new("Debug-ThickLines", BatchShape::LINES, MAX_LINE_INDICES / 2, 1, MAX_BATCH_DRAW_CALLS),
            points: PrimitiveBatcher::new("Debug-Points", BatchShape::QUADS, MAX_POINT_INDICES / 6, 1, MAX_BATCH_DRAW_CALLS),
            triangles: PrimitiveBatcher::new("Debug-Triangles", BatchShape::TRIANGLES, MAX_TRIANGLES, 1, MAX_BATCH_DRAW_CALLS),
            text: PrimitiveBatcher::new("Debug-Text", BatchShape::QUADS, MAX_GLYPHS, max_textures, MAX_BATCH_DRAW_CALLS),
            scene_sets: HashMap::new(),
            font: None,
            max_textures,
        }
    }

    /// Font used for debug labels; labels are skipped without one
    pub fn set_font(&mut self, font: Option<Arc<FontGeometry>>) {
        self.font = font;
    }

    /// Text atlas slots per batch
    pub fn max_textures(&self) -> usize {
        self.max_textures
    }

    /// Draw calls issued by the last [`DebugOverlay::render`]
    pub fn draw_calls(&self) -> u32 {
        self.lines.draw_calls()
            + self.thick_lines.draw_calls()
            + self.points.draw_calls()
            + self.triangles.draw_calls()
            + self.text.draw_calls()
    }

    /// Record the overlay
    pub fn render(&mut self, device: &mut dyn RenderDevice, context: &mut RenderContext, frame: &OverlayFrame<'_>) -> FrameGraphResult<()> {
        self.lines.reset();
        self.thick_lines.reset();
        self.points.reset();
        self.triangles.reset();
        self.text.reset();

        let camera = frame.camera;
        let proj_view = camera.camera.projection() * camera.view();

        for (primitives, depth) in [(&frame.list.depth_tested, frame.depth), (&frame.list.overlay, None)] {
            if !primitives.is_empty() {
                self.primitives(device, context, frame, primitives, depth, &proj_view)?;
            }
        }

        let Some(font) = self.font.clone() else {
            return Ok(());
        };

        let aspect = frame.width as f32 / frame.height.max(1) as f32;
        let layers = [
            (TextSpace::World, frame.list.world_text.as_slice(), proj_view, frame.depth),
            (
                TextSpace::Screen,
                frame.list.screen_text.as_slice(),
                orthographic_zo(0.0, frame.width as f32, 0.0, frame.height as f32, -100.0, 100.0),
                None,
            ),
            (
                TextSpace::Clip,
                frame.list.clip_text.as_slice(),
                orthographic_zo(-aspect, aspect, -1.0, 1.0, -10.0, 10.0),
                None,
            ),
        ];

        for (space, texts, projection, depth) in layers {
            if texts.is_empty() {
                continue;
            }
            let Some(shader) = context.compiled_shader(device, shader_names::TEXT) else {
                return Ok(());
            };
            let layer = Layer { name: space.debug_name(), shader, depth };
            let pipeline = self.begin_layer(device, frame, layer, &projection, |desc| desc)?;
            let scene_set = self.scene_set(device, layer.name, shader)?;
            self.text.begin_pass(
                device,
                BatchPass { pipeline, scene_set, texture_shader: Some(shader), default_texture: frame.default_texture },
            )?;
            for text in texts {
                let layout = layout_text(&font, &text.text, &TextLayoutParams::default());
                push_text(device, &mut self.text, &font, &layout, &space.model(text, camera), &GlyphStyle::solid(text.colour))?;
            }
            self.text.end_pass(device)?;
            device.end_pipeline(pipeline)?;
        }

        trace!("Debug overlay issued {} draw calls", self.draw_calls());
        Ok(())
    }

    fn primitives(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        frame: &OverlayFrame<'_>,
        primitives: &DebugPrimitives,
        depth: Option<TextureHandle>,
        proj_view: &Mat4,
    ) -> FrameGraphResult<()> {
        let line_shader = context.compiled_shader(device, shader_names::BATCH_2D_LINE);

        if let Some(shader) = line_shader.filter(|_| !primitives.lines.is_empty()) {
            let layer = Layer { name: "Debug-Lines", shader, depth };
            let pipeline = self.begin_layer(device, frame, layer, proj_view, |desc| desc.with_draw_type(DrawType::Lines))?;
            let scene_set = self.scene_set(device, layer.name, shader)?;
            self.lines
                .begin_pass(device, BatchPass { pipeline, scene_set, texture_shader: None, default_texture: frame.default_texture })?;
            for line in &primitives.lines {
                self.lines.reserve(device)?;
                self.lines.push(&[LineVertex::new(line.start, line.colour), LineVertex::new(line.end, line.colour)]);
            }
            self.lines.end_pass(device)?;
            device.end_pipeline(pipeline)?;
        }

        if let Some(shader) = line_shader.filter(|_| !primitives.thick_lines.is_empty()) {
            let layer = Layer { name: "Debug-ThickLines", shader, depth };
            let pipeline = self.begin_layer(device, frame, layer, proj_view, |mut desc| {
                desc.line_width = 2;
                desc.with_draw_type(DrawType::Lines)
            })?;
            let scene_set = self.scene_set(device, layer.name, shader)?;
            self.thick_lines
                .begin_pass(device, BatchPass { pipeline, scene_set, texture_shader: None, default_texture: frame.default_texture })?;
            for line in &primitives.thick_lines {
                self.thick_lines.reserve(device)?;
                self.thick_lines.push(&[LineVertex::new(line.start, line.colour), LineVertex::new(line.end, line.colour)]);
            }
            self.thick_lines.end_pass(device)?;
            device.end_pipeline(pipeline)?;
        }

        if !primitives.points.is_empty() {
            if let Some(shader) = context.compiled_shader(device, shader_names::BATCH_2D_POINT) {
                let layer = Layer { name: "Debug-Points", shader, depth };
                let pipeline = self.begin_layer(device, frame, layer, proj_view, |desc| desc)?;
                let scene_set = self.scene_set(device, layer.name, shader)?;
                let (right, up) = (frame.camera.right(), frame.camera.up());
                self.points
                    .begin_pass(device, BatchPass { pipeline, scene_set, texture_shader: None, default_texture: frame.default_texture })?;
                for point in &primitives.points {
                    self.points.reserve(device)?;
                    let vertices: [PointVertex; 4] = std::array::from_fn(|i| {
                        let (x, y) = POINT_CORNERS[i];
                        let offset: Vec3 = (right * x + up * y) * point.size;
                        PointVertex::new(point.position + offset, point.colour, point.size, Vec2::new(x, y))
                    });
                    self.points.push(&vertices);
                }
                self.points.end_pass(device)?;
                device.end_pipeline(pipeline)?;
            }
        }

        if !primitives.triangles.is_empty() {
            if let Some(shader) = context.compiled_shader(device, shader_names::BATCH_2D) {
                let layer = Layer { name: "Debug-Triangles", shader, depth };
                let pipeline = self.begin_layer(device, frame, layer, proj_view, |mut desc| {
                    desc.depth_bias = Some(DepthBias { constant: 0.0, slope: -10.0 });
                    desc
                })?;
                let scene_set = self.scene_set(device, layer.name, shader)?;
                self.triangles.begin_pass(
                    device,
                    BatchPass { pipeline, scene_set, texture_shader: Some(shader), default_texture: frame.default_texture },
                )?;
                for triangle in &primitives.triangles {
                    self.triangles.reserve(device)?;
                    let vertices = triangle.corners.map(|corner| QuadVertex::new(corner, Vec2::zeros(), 0.0, triangle.colour));
                    self.triangles.push(&vertices);
                }
                self.triangles.end_pass(device)?;
                device.end_pipeline(pipeline)?;
            }
        }
        Ok(())
    }

    /// Update the layer's camera set, then build and bind its pipeline
    fn begin_layer(
        &mut self,
        device: &mut dyn RenderDevice,
        frame: &OverlayFrame<'_>,
        layer: Layer,
        proj_view: &Mat4,
        customise: impl FnOnce(PipelineDesc) -> PipelineDesc,
    ) -> FrameGraphResult<PipelineHandle> {
        let set = self.scene_set(device, layer.name, layer.shader)?;
        device.set_uniform(set, "UBO", "projView", UniformValue::Mat4(*proj_view))?;
        device.update_descriptor_set(set)?;

        let desc = PipelineDesc::new(layer.shader, layer.name)
            .with_colour_target(frame.colour)
            .with_depth_target(layer.depth)
            .with_alpha_blend()
            .with_cull_mode(CullMode::None);
        let pipeline = device.get_pipeline(&customise(desc))?;
        device.bind_pipeline(pipeline, None)?;
        Ok(pipeline)
    }

    fn scene_set(&mut self, device: &mut dyn RenderDevice, name: &'static str, shader: ShaderHandle) -> FrameGraphResult<DescriptorSetHandle> {
        if let Some(set) = self.scene_sets.get(name) {
            return Ok(*set);
        }
        let set = device.create_descriptor_set(&DescriptorDesc::new(shader, 0))?;
        self.scene_sets.insert(name, set);
        Ok(set)
    }

    /// Release every device resource
    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        self.lines.destroy(device);
        self.thick_lines.destroy(device);
        self.points.destroy(device);
        self.triangles.destroy(device);
        self.text.destroy(device);
        for (_, set) in self.scene_sets.drain() {
            device.destroy_descriptor_set(set);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use crate::rhi::headless::{HeadlessDevice, RecordedCommand};
    use crate::rhi::{DeviceCapabilities, TextureDesc, TextureFormat};
    use crate::scene::Camera;

    struct Fixture {
        device: HeadlessDevice,
        context: RenderContext,
        colour: TextureHandle,
        depth: TextureHandle,
        default_texture: TextureHandle,
        camera: CameraView,
    }

    fn fixture() -> Fixture {
        let mut device = HeadlessDevice::with_standard_shaders(DeviceCapabilities::default(), 320, 240);
        let colour = device.create_texture(&TextureDesc::colour("Main", TextureFormat::Rgba16F, 320, 240)).unwrap();
        let depth = device.create_texture(&TextureDesc::depth("Depth", 320, 240)).unwrap();
        let default_texture = device.create_texture(&TextureDesc::colour("Default", TextureFormat::Rgba8, 1, 1)).unwrap();
        let camera = CameraView::new(Camera::default(), Mat4::new_translation(&Vec3::new(0.0, 0.0, 5.0)));
        Fixture { device, context: RenderContext::new(), colour, depth, default_texture, camera }
    }

    fn render(fx: &mut Fixture, overlay: &mut DebugOverlay, list: &DebugDrawList) {
        let frame = OverlayFrame {
            list,
            camera: &fx.camera,
            colour: fx.colour,
            depth: Some(fx.depth),
            default_texture: fx.default_texture,
            width: 320,
            height: 240,
        };
        overlay.render(&mut fx.device, &mut fx.context, &frame).unwrap();
    }

    fn pipeline_for(device: &HeadlessDevice, name: &str) -> Vec<PipelineDesc> {
        device
            .commands()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::BindPipeline { pipeline, name: bound, .. } if bound == name => device.pipeline_desc(*pipeline).cloned(),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_depth_tested_then_overlay() {
        let mut fx = fixture();
        let mut overlay = DebugOverlay::new(16);
        let mut list = DebugDrawList::new();
        let white = Vec4::repeat(1.0);
        list.draw_line(Vec3::zeros(), Vec3::x(), white, true);
        list.draw_line(Vec3::zeros(), Vec3::y(), white, false);
        render(&mut fx, &mut overlay, &list);

        let lines = pipeline_for(&fx.device, "Debug-Lines");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].depth_target, Some(fx.depth));
        assert_eq!(lines[1].depth_target, None);
        assert!(lines.iter().all(|d| d.transparency_enabled && d.colour_targets == vec![fx.colour]));
        assert_eq!(overlay.draw_calls(), 2);
    }

    #[test]
    fn test_point_expanded_to_camera_facing_quad() {
        let mut fx = fixture();
        let mut overlay = DebugOverlay::new(16);
        let mut list = DebugDrawList::new();
        list.draw_point(Vec3::zeros(), 0.5, Vec4::repeat(1.0), false);
        render(&mut fx, &mut overlay, &list);

        let upload = fx
            .device
            .commands()
            .iter()
            .find_map(|c| match c {
                RecordedCommand::UploadBuffer { buffer, bytes } if *bytes == 4 * std::mem::size_of::<PointVertex>() => {
                    fx.device.buffer_data(*buffer)
                }
                _ => None,
            })
            .unwrap();
        let vertices: Vec<PointVertex> = upload
            .chunks_exact(std::mem::size_of::<PointVertex>())
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(vertices[0].position, [-0.5, -0.5, 0.0]);
        assert_eq!(vertices[2].position, [0.5, 0.5, 0.0]);
        assert_eq!(vertices[1].uv, [1.0, -1.0]);
    }

    #[test]
    fn test_thick_lines_and_triangles_pipeline_state() {
        let mut fx = fixture();
        let mut overlay = DebugOverlay::new(16);
        let mut list = DebugDrawList::new();
        let white = Vec4::repeat(1.0);
        list.draw_thick_line(Vec3::zeros(), Vec3::x(), white, true);
        list.draw_triangle(Vec3::zeros(), Vec3::x(), Vec3::y(), white, true);
        render(&mut fx, &mut overlay, &list);

        assert_eq!(pipeline_for(&fx.device, "Debug-ThickLines")[0].line_width, 2);
        let triangles = &pipeline_for(&fx.device, "Debug-Triangles")[0];
        assert_eq!(triangles.depth_bias, Some(DepthBias { constant: 0.0, slope: -10.0 }));
        assert_eq!(triangles.draw_type, DrawType::Triangle);
    }

    #[test]
    fn test_text_layers_need_a_font() {
        let mut fx = fixture();
        let mut overlay = DebugOverlay::new(16);
        let mut list = DebugDrawList::new();
        list.draw_screen_text("fps", Vec2::new(10.0, 10.0), 16.0, Vec4::repeat(1.0));
        list.draw_clip_text("ok", Vec2::new(0.0, 0.0), 0.1, Vec4::repeat(1.0));

        render(&mut fx, &mut overlay, &list);
        assert_eq!(fx.device.draw_call_count(), 0);

        let atlas = fx.device.create_texture(&TextureDesc::colour("Atlas", TextureFormat::Rgba8, 128, 128)).unwrap();
        overlay.set_font(Some(Arc::new(FontGeometry::monospace(atlas, 128, 16, "fpsok?"))));
        render(&mut fx, &mut overlay, &list);

        assert_eq!(pipeline_for(&fx.device, "Debug-TextNDT").len(), 1);
        assert_eq!(pipeline_for(&fx.device, "Debug-TextCS").len(), 1);
        assert!(pipeline_for(&fx.device, "Debug-TextDT").is_empty());
        assert_eq!(overlay.draw_calls(), 2);
    }

    #[test]
    fn test_missing_line_shader_skips_lines_only() {
        let mut fx = fixture();
        fx.device.remove_shader(shader_names::BATCH_2D_LINE);
        let mut overlay = DebugOverlay::new(16);
        let mut list = DebugDrawList::new();
        list.draw_line(Vec3::zeros(), Vec3::x(), Vec4::repeat(1.0), true);
        list.draw_point(Vec3::zeros(), 0.5, Vec4::repeat(1.0), true);
        render(&mut fx, &mut overlay, &list);

        assert!(pipeline_for(&fx.device, "Debug-Lines").is_empty());
        assert_eq!(pipeline_for(&fx.device, "Debug-Points").len(), 1);
    }
}
