//! Debug drawing primitives
//!
//! Gameplay and tools code records lines, points, triangles and text into a
//! [`DebugDrawList`] during the update. The overlay pass consumes the list
//! at the end of the frame, once with depth testing and once without.

pub mod overlay;

use crate::foundation::math::{Vec2, Vec3, Vec4};
use crate::spatial::BoundingBox;

pub use overlay::DebugOverlay;

/// Line segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugLine {
    /// Start point
    pub start: Vec3,
    /// End point
    pub end: Vec3,
    /// Colour
    pub colour: Vec4,
}

/// Camera-facing point sprite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugPoint {
    /// Center
    pub position: Vec3,
    /// Half size in world units
    pub size: f32,
    /// Colour
    pub colour: Vec4,
}

/// Filled triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugTriangle {
    /// Corners
    pub corners: [Vec3; 3],
    /// Colour
    pub colour: Vec4,
}

/// Text label
#[derive(Debug, Clone, PartialEq)]
pub struct DebugText {
    /// Text
    pub text: String,
    /// Position in the layer's space
    pub position: Vec3,
    /// Glyph size
    pub size: f32,
    /// Colour
    pub colour: Vec4,
}

/// Primitives that share a depth mode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugPrimitives {
    /// One pixel lines
    pub lines: Vec<DebugLine>,
    /// Wide lines
    pub thick_lines: Vec<DebugLine>,
    /// Point sprites
    pub points: Vec<DebugPoint>,
    /// Triangles
    pub triangles: Vec<DebugTriangle>,
}

impl DebugPrimitives {
    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.thick_lines.is_empty() && self.points.is_empty() && self.triangles.is_empty()
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.thick_lines.clear();
        self.points.clear();
        self.triangles.clear();
    }
}

/// Debug primitives recorded for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DebugDrawList {
    /// Primitives drawn with depth testing
    pub depth_tested: DebugPrimitives,
    /// Primitives drawn on top of everything
    pub overlay: DebugPrimitives,
    /// World-space labels facing the camera
    pub world_text: Vec<DebugText>,
    /// Screen-space labels in pixels
    pub screen_text: Vec<DebugText>,
    /// Labels in a fixed `[-aspect, aspect] x [-1, 1]` space
    pub clip_text: Vec<DebugText>,

    /// Master enable/disable flag
    pub enabled: bool,
}

impl Default for DebugDrawList {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugDrawList {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            depth_tested: DebugPrimitives::default(),
            overlay: DebugPrimitives::default(),
            world_text: Vec::new(),
            screen_text: Vec::new(),
            clip_text: Vec::new(),
            enabled: true,
        }
    }

    fn layer(&mut self, depth_tested: bool) -> &mut DebugPrimitives {
        if depth_tested { &mut self.depth_tested } else { &mut self.overlay }
    }

    /// Draw a line segment
    pub fn draw_line(&mut self, start: Vec3, end: Vec3, colour: Vec4, depth_tested: bool) {
        if !self.enabled {
            return;
        }
        self.layer(depth_tested).lines.push(DebugLine { start, end, colour });
    }

    /// Draw a wide line segment
    pub fn draw_thick_line(&mut self, start: Vec3, end: Vec3, colour: Vec4, depth_tested: bool) {
        if !self.enabled {
            return;
        }
        self.layer(depth_tested).thick_lines.push(DebugLine { start, end, colour });
    }

    /// Draw a camera-facing point
    pub fn draw_point(&mut self, position: Vec3, size: f32, colour: Vec4, depth_tested: bool) {
        if !self.enabled {
            return;
        }
        self.layer(depth_tested).points.push(DebugPoint { position, size, colour });
    }

    /// Draw a filled triangle
    pub fn draw_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3, colour: Vec4, depth_tested: bool) {
        if !self.enabled {
            return;
        }
        self.layer(depth_tested).triangles.push(DebugTriangle { corners: [a, b, c], colour });
    }

    /// Draw the twelve edges of a box
    pub fn draw_box(&mut self, bounds: &BoundingBox, colour: Vec4, depth_tested: bool) {
        const EDGES: [(usize, usize); 12] = [
            (0, 1), (1, 3), (3, 2), (2, 0),
            (4, 5), (5, 7), (7, 6), (6, 4),
            (0, 4), (1, 5), (2, 6), (3, 7),
        ];
        let corners = bounds.corners();
        for (a, b) in EDGES {
            self.draw_line(corners[a], corners[b], colour, depth_tested);
        }
    }

    /// Draw a label in world space
    pub fn draw_text(&mut self, text: &str, position: Vec3, size: f32, colour: Vec4) {
        if !self.enabled {
            return;
        }
        self.world_text.push(DebugText { text: text.to_string(), position, size, colour });
    }

    /// Draw a label in screen pixels
    pub fn draw_screen_text(&mut self, text: &str, position: Vec2, size: f32, colour: Vec4) {
        if !self.enabled {
            return;
        }
        self.screen_text.push(DebugText {
            text: text.to_string(),
            position: Vec3::new(position.x, position.y, 0.0),
            size,
            colour,
        });
    }

    /// Draw a label in resolution independent clip space
    pub fn draw_clip_text(&mut self, text: &str, position: Vec2, size: f32, colour: Vec4) {
        if !self.enabled {
            return;
        }
        self.clip_text.push(DebugText {
            text: text.to_string(),
            position: Vec3::new(position.x, position.y, 0.0),
            size,
            colour,
        });
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.depth_tested.is_empty()
            && self.overlay.is_empty()
            && self.world_text.is_empty()
            && self.screen_text.is_empty()
            && self.clip_text.is_empty()
    }

    /// Remove every primitive
    pub fn clear(&mut self) {
        self.depth_tested.clear();
        self.overlay.clear();
        self.world_text.clear();
        self.screen_text.clear();
        self.clip_text.clear();
    }
}
