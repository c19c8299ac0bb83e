//! Glyph layout
//!
//! Positions are in the text's local space: one unit spans the font's
//! ascender-to-descender height, the first baseline sits at y = 0 and lines
//! advance downwards.

use super::font::{FontGeometry, Glyph};
use crate::foundation::math::Vec2;
use crate::scene::TextComponent;

/// Line breaking policy
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TextWrap {
    /// Only explicit newlines break lines
    #[default]
    None,
    /// Break at the last space before a glyph would pass this width
    MaxWidth(f32),
}

impl TextWrap {
    /// Wrap policy for a component's `max_width`; zero or less disables wrapping
    pub fn from_max_width(max_width: f32) -> Self {
        if max_width > 0.0 { Self::MaxWidth(max_width) } else { Self::None }
    }
}

/// Spacing and wrapping options
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextLayoutParams {
    /// Extra distance added to every line advance
    pub line_spacing: f32,
    /// Extra distance added to every glyph advance
    pub kerning: f32,
    /// Line breaking
    pub wrap: TextWrap,
}

impl TextLayoutParams {
    /// Parameters taken from a text component
    pub fn from_component(text: &TextComponent) -> Self {
        Self {
            line_spacing: text.line_spacing,
            kerning: text.kerning,
            wrap: TextWrap::from_max_width(text.max_width),
        }
    }
}

/// One positioned glyph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphQuad {
    /// Source character
    pub character: char,
    /// Corners: bottom-left, bottom-right, top-right, top-left
    pub positions: [Vec2; 4],
    /// Atlas UVs in the same corner order
    pub uvs: [Vec2; 4],
}

/// Result of laying out a string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLayout {
    /// Glyph quads in emission order
    pub quads: Vec<GlyphQuad>,
    /// Number of lines, counting wrapped ones
    pub line_count: usize,
}

struct Pen {
    x: f32,
    y: f32,
    line_count: usize,
}

impl Pen {
    fn new_line(&mut self, font: &FontGeometry, params: &TextLayoutParams) {
        self.x = 0.0;
        self.y -= font.font_scale() * font.line_height + params.line_spacing;
        self.line_count += 1;
    }
}

fn glyph_quad(font: &FontGeometry, glyph: &Glyph, character: char, x: f32, y: f32) -> GlyphQuad {
    let scale = font.font_scale();
    let plane = glyph.plane_bounds;
    let (pl, pb) = (plane.left * scale + x, plane.bottom * scale + y);
    let (pr, pt) = (plane.right * scale + x, plane.top * scale + y);

    let texel_w = 1.0 / font.atlas_width.max(1) as f32;
    let texel_h = 1.0 / font.atlas_height.max(1) as f32;
    let atlas = glyph.atlas_bounds;
    let (l, b) = (atlas.left * texel_w, atlas.bottom * texel_h);
    let (r, t) = (atlas.right * texel_w, atlas.top * texel_h);

    GlyphQuad {
        character,
        positions: [Vec2::new(pl, pb), Vec2::new(pr, pb), Vec2::new(pr, pt), Vec2::new(pl, pt)],
        uvs: [Vec2::new(l, b), Vec2::new(r, b), Vec2::new(r, t), Vec2::new(l, t)],
    }
}

/// Lay out `text` with `font`.
///
/// Carriage returns are ignored, tabs advance four `a` widths, and characters
/// missing from the font fall back to `?` or are dropped.
pub fn layout_text(font: &FontGeometry, text: &str, params: &TextLayoutParams) -> TextLayout {
    let chars: Vec<char> = text.chars().collect();
    let scale = font.font_scale();
    let mut quads = Vec::with_capacity(chars.len());
    let mut pen = Pen { x: 0.0, y: 0.0, line_count: usize::from(!chars.is_empty()) };
    // Char index and emitted quad count at the last space on the current line
    let mut last_space: Option<(usize, usize)> = None;

    let mut i = 0;
    while i < chars.len() {
        let character = chars[i];
        match character {
            '\r' => {
                i += 1;
                continue;
            }
            '\n' => {
                pen.new_line(font, params);
                last_space = None;
                i += 1;
                continue;
            }
            '\t' => {
                let advance = font.glyph('a').map_or(0.0, |g| g.advance);
                pen.x += 4.0 * scale * advance + params.kerning;
                i += 1;
                continue;
            }
            _ => {}
        }

        let Some(glyph) = font.glyph(character).or_else(|| font.glyph('?')) else {
            i += 1;
            continue;
        };

        if character == ' ' {
            last_space = Some((i, quads.len()));
        }

        let quad = glyph_quad(font, glyph, character, pen.x, pen.y);

        if let (TextWrap::MaxWidth(max_width), Some((space_index, quad_count))) = (params.wrap, last_space) {
            if character != ' ' && quad.positions[1].x > max_width {
                quads.truncate(quad_count);
                pen.new_line(font, params);
                last_space = None;
                i = space_index + 1;
                continue;
            }
        }

        quads.push(quad);

        let next = chars.get(i + 1).copied();
        let kerning = next.map_or(0.0, |n| font.kerning(character, n));
        pen.x += scale * (glyph.advance + kerning) + params.kerning;
        i += 1;
    }

    TextLayout { quads, line_count: pen.line_count }
}

/// Extent of the laid out text: furthest right edge and lowest bottom edge
pub fn measure_text(font: &FontGeometry, text: &str, params: &TextLayoutParams) -> Vec2 {
    layout_text(font, text, params)
        .quads
        .iter()
        .fold(Vec2::zeros(), |size, quad| {
            Vec2::new(size.x.max(quad.positions[2].x), size.y.max(-quad.positions[0].y))
        })
}
