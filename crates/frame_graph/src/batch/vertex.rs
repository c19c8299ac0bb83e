//! Vertex layouts shared with the batch shaders

use crate::foundation::math::{Vec2, Vec3, Vec4};

fn v3(v: Vec3) -> [f32; 3] {
    [v.x, v.y, v.z]
}

fn v4(v: Vec4) -> [f32; 4] {
    [v.x, v.y, v.z, v.w]
}

/// Sprite and triangle vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    /// World position
    pub position: [f32; 3],
    /// Texture coordinate
    pub uv: [f32; 2],
    /// Texture slot in x
    pub tid: [f32; 2],
    /// Tint
    pub colour: [f32; 4],
}

impl QuadVertex {
    /// Build from math types
    pub fn new(position: Vec3, uv: Vec2, slot: f32, colour: Vec4) -> Self {
        Self { position: v3(position), uv: [uv.x, uv.y], tid: [slot, 0.0], colour: v4(colour) }
    }
}

/// Signed distance field glyph vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TextVertex {
    /// World position
    pub position: [f32; 3],
    /// Fill colour
    pub colour: [f32; 4],
    /// Atlas coordinate
    pub uv: [f32; 2],
    /// Texture slot in x, outline width in y
    pub tid: [f32; 2],
    /// Outline colour
    pub outline_colour: [f32; 4],
}

impl TextVertex {
    /// Build from math types
    pub fn new(position: Vec3, colour: Vec4, uv: Vec2, slot: f32, outline_width: f32, outline_colour: Vec4) -> Self {
        Self {
            position: v3(position),
            colour: v4(colour),
            uv: [uv.x, uv.y],
            tid: [slot, outline_width],
            outline_colour: v4(outline_colour),
        }
    }
}

/// Debug line vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    /// World position
    pub position: [f32; 3],
    /// Colour
    pub colour: [f32; 4],
}

impl LineVertex {
    /// Build from math types
    pub fn new(position: Vec3, colour: Vec4) -> Self {
        Self { position: v3(position), colour: v4(colour) }
    }
}

/// Debug point sprite vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointVertex {
    /// World position of the expanded corner
    pub position: [f32; 3],
    /// Colour
    pub colour: [f32; 4],
    /// Point size in x
    pub size: [f32; 2],
    /// Corner in `[-1, 1]`
    pub uv: [f32; 2],
}

impl PointVertex {
    /// Build from math types
    pub fn new(position: Vec3, colour: Vec4, size: f32, uv: Vec2) -> Self {
        Self { position: v3(position), colour: v4(colour), size: [size, 0.0], uv: [uv.x, uv.y] }
    }
}
