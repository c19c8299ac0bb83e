//! Feeding laid out text into a glyph batcher

use super::batcher::PrimitiveBatcher;
use super::vertex::TextVertex;
use crate::error::FrameGraphResult;
use crate::foundation::math::{Mat4, Point3, Vec4};
use crate::rhi::RenderDevice;
use crate::text::{FontGeometry, TextLayout};

/// Colours and outline applied to every glyph of a string
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphStyle {
    /// Fill colour
    pub colour: Vec4,
    /// Outline colour
    pub outline_colour: Vec4,
    /// Outline width, zero for none
    pub outline_width: f32,
}

impl GlyphStyle {
    /// Fill only
    pub fn solid(colour: Vec4) -> Self {
        Self { colour, outline_colour: Vec4::zeros(), outline_width: 0.0 }
    }
}

/// Push every glyph quad of `layout`, transformed by `transform`.
///
/// Returns the number of quads pushed.
pub fn push_text(
    device: &mut dyn RenderDevice,
    batcher: &mut PrimitiveBatcher<TextVertex>,
    font: &FontGeometry,
    layout: &TextLayout,
    transform: &Mat4,
    style: &GlyphStyle,
) -> FrameGraphResult<usize> {
    for quad in &layout.quads {
        batcher.reserve(device)?;
        let slot = batcher.submit_texture(device, font.atlas)?;
        let vertices: [TextVertex; 4] = std::array::from_fn(|i| {
            let local = quad.positions[i];
            let world = transform.transform_point(&Point3::new(local.x, local.y, 0.0));
            TextVertex::new(world.coords, style.colour, quad.uvs[i], slot, style.outline_width, style.outline_colour)
        });
        batcher.push(&vertices);
    }
    Ok(layout.quads.len())
}
