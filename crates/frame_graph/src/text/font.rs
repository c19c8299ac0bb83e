//! Font geometry for a signed distance field atlas

use crate::rhi::TextureHandle;
use std::collections::HashMap;

/// Rectangle given as left, bottom, right, top
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlyphBounds {
    /// Left edge
    pub left: f32,
    /// Bottom edge
    pub bottom: f32,
    /// Right edge
    pub right: f32,
    /// Top edge
    pub top: f32,
}

impl GlyphBounds {
    /// Create bounds
    pub const fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self { left, bottom, right, top }
    }
}

/// Metrics for one glyph
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Glyph {
    /// Horizontal advance in em units
    pub advance: f32,
    /// Quad relative to the pen position, in em units
    pub plane_bounds: GlyphBounds,
    /// Quad in the atlas, in texels
    pub atlas_bounds: GlyphBounds,
}

/// Glyph metrics and the atlas texture of one font
#[derive(Debug, Clone, PartialEq)]
pub struct FontGeometry {
    /// Ascender height in em units
    pub ascender: f32,
    /// Descender height in em units (negative below the baseline)
    pub descender: f32,
    /// Baseline to baseline distance in em units
    pub line_height: f32,
    /// Atlas texture
    pub atlas: TextureHandle,
    /// Atlas width in texels
    pub atlas_width: u32,
    /// Atlas height in texels
    pub atlas_height: u32,
    glyphs: HashMap<char, Glyph>,
    kerning: HashMap<(char, char), f32>,
}

impl FontGeometry {
    /// Font with metrics and no glyphs
    pub fn new(atlas: TextureHandle, atlas_width: u32, atlas_height: u32, ascender: f32, descender: f32, line_height: f32) -> Self {
        Self {
            ascender,
            descender,
            line_height,
            atlas,
            atlas_width,
            atlas_height,
            glyphs: HashMap::new(),
            kerning: HashMap::new(),
        }
    }

    /// Fixed-advance font laid out on a regular atlas grid.
    ///
    /// Every character in `charset` gets a `cell` texel square; spaces get an
    /// empty quad. Used by tools that have no baked font at hand.
    pub fn monospace(atlas: TextureHandle, atlas_width: u32, cell: u32, charset: &str) -> Self {
        let columns = (atlas_width / cell.max(1)).max(1);
        let rows = (charset.chars().count() as u32).div_ceil(columns).max(1);
        let mut font = Self::new(atlas, atlas_width, rows * cell, 0.8, -0.2, 1.2);

        for (i, c) in charset.chars().enumerate() {
            let (col, row) = (i as u32 % columns, i as u32 / columns);
            let (left, bottom) = ((col * cell) as f32, (row * cell) as f32);
            let plane_bounds = if c == ' ' {
                GlyphBounds::default()
            } else {
                GlyphBounds::new(0.0, -0.2, 0.6, 0.8)
            };
            font.insert_glyph(c, Glyph {
                advance: 0.6,
                plane_bounds,
                atlas_bounds: GlyphBounds::new(left, bottom, left + cell as f32, bottom + cell as f32),
            });
        }
        font
    }

    /// Add or replace a glyph
    pub fn insert_glyph(&mut self, c: char, glyph: Glyph) {
        self.glyphs.insert(c, glyph);
    }

    /// Builder: add a kerning pair adjustment
    pub fn with_kerning(mut self, first: char, second: char, adjustment: f32) -> Self {
        self.kerning.insert((first, second), adjustment);
        self
    }

    /// Glyph for a character
    pub fn glyph(&self, c: char) -> Option<&Glyph> {
        self.glyphs.get(&c)
    }

    /// Kerning adjustment between two characters
    pub fn kerning(&self, first: char, second: char) -> f32 {
        self.kerning.get(&(first, second)).copied().unwrap_or(0.0)
    }

    /// Advance of `c` followed by `next`, in em units
    pub fn advance(&self, c: char, next: Option<char>) -> Option<f32> {
        let glyph = self.glyph(c)?;
        Some(glyph.advance + next.map_or(0.0, |n| self.kerning(c, n)))
    }

    /// Scale normalising the ascender-to-descender span to one unit
    pub fn font_scale(&self) -> f32 {
        let span = self.ascender - self.descender;
        if span.abs() <= f32::EPSILON { 1.0 } else { 1.0 / span }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn atlas() -> TextureHandle {
        let mut textures: slotmap::SlotMap<TextureHandle, ()> = slotmap::SlotMap::with_key();
        textures.insert(())
    }

    #[test]
    fn test_monospace_grid_positions() {
        let font = FontGeometry::monospace(atlas(), 64, 16, "abcde");
        assert_eq!(font.atlas_height, 32);

        let e = font.glyph('e').unwrap();
        assert_relative_eq!(e.atlas_bounds.left, 0.0);
        assert_relative_eq!(e.atlas_bounds.bottom, 16.0);
        assert_relative_eq!(font.font_scale(), 1.0);
    }

    #[test]
    fn test_advance_includes_kerning() {
        let font = FontGeometry::monospace(atlas(), 64, 16, "AV").with_kerning('A', 'V', -0.1);
        assert_relative_eq!(font.advance('A', Some('V')).unwrap(), 0.5);
        assert_relative_eq!(font.advance('V', Some('A')).unwrap(), 0.6);
        assert!(font.advance('x', None).is_none());
    }
}
