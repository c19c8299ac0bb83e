//! Dynamic batching
//!
//! Sprites, text glyphs and debug primitives are written into CPU staging
//! arrays and submitted as indexed draws. Each draw call gets its own vertex
//! buffer from a [`FrameResourcePool`] indexed by swapchain image and batch
//! index, and textures are deduplicated into a bounded [`TextureSlots`]
//! table per batch.

pub mod batcher;
pub mod glyphs;
pub mod pool;
pub mod slots;
pub mod vertex;

pub use batcher::{BatchPass, BatchShape, IndexPattern, PrimitiveBatcher};
pub use glyphs::{push_text, GlyphStyle};
pub use pool::FrameResourcePool;
pub use slots::{SlotLookup, TextureSlots};
pub use vertex::{LineVertex, PointVertex, QuadVertex, TextVertex};
