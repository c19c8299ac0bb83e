//! Signed distance field text
//!
//! [`FontGeometry`] holds the metrics of a prebuilt glyph atlas;
//! [`layout_text`] turns a string into positioned glyph quads that the text
//! and debug passes feed into their batchers.

pub mod font;
pub mod layout;

pub use font::{FontGeometry, Glyph, GlyphBounds};
pub use layout::{layout_text, measure_text, GlyphQuad, TextLayout, TextLayoutParams, TextWrap};
