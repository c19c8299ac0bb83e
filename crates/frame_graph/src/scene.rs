//! Frame input
//!
//! Plain data handed to the render graph each frame. The ECS and asset
//! systems that produce it live elsewhere; the graph only reads it.

use crate::debug::DebugDrawList;
use crate::foundation::math::{perspective_zo, translation_of, utils, Mat4, Transform, Vec2, Vec3, Vec4};
use crate::rhi::{DescriptorSetHandle, MeshHandle, TextureHandle};
use crate::spatial::BoundingBox;
use crate::text::FontGeometry;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Perspective camera parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Width over height
    pub aspect: f32,
    /// Exposure multiplier applied to lights
    pub exposure: f32,
    /// Lens aperture, scales chromatic aberration
    pub aperture: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov: 60.0,
            near: 0.1,
            far: 1000.0,
            aspect: 16.0 / 9.0,
            exposure: 1.0,
            aperture: 1.0,
        }
    }
}

impl Camera {
    /// Projection for this camera's own far plane
    pub fn projection(&self) -> Mat4 {
        self.projection_with_far(self.far)
    }

    /// Projection with an overridden far plane
    pub fn projection_with_far(&self, far: f32) -> Mat4 {
        perspective_zo(utils::deg_to_rad(self.fov), self.aspect, self.near, far)
    }
}

/// A camera placed in the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    /// Lens parameters
    pub camera: Camera,
    /// Camera-to-world matrix
    pub world: Mat4,
}

impl CameraView {
    /// Create a camera view
    pub fn new(camera: Camera, world: Mat4) -> Self {
        Self { camera, world }
    }

    /// World-to-camera matrix
    pub fn view(&self) -> Mat4 {
        self.world.try_inverse().unwrap_or_else(Mat4::identity)
    }

    /// World-space position
    pub fn position(&self) -> Vec3 {
        translation_of(&self.world)
    }

    /// Camera rotation with translation and scale stripped
    pub fn rotation(&self) -> Mat4 {
        let mut rotation = Mat4::identity();
        for c in 0..3 {
            let axis = Vec3::new(self.world[(0, c)], self.world[(1, c)], self.world[(2, c)]);
            let axis = axis.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros);
            rotation.fixed_view_mut::<3, 1>(0, c).copy_from(&axis);
        }
        rotation
    }

    /// World-space right vector
    pub fn right(&self) -> Vec3 {
        self.rotation().fixed_view::<3, 1>(0, 0).into_owned()
    }

    /// World-space up vector
    pub fn up(&self) -> Vec3 {
        self.rotation().fixed_view::<3, 1>(0, 1).into_owned()
    }
}

/// Light type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightKind {
    /// Infinite light with only a direction
    Directional,
    /// Spot light cone
    Spot,
    /// Omni-directional point light
    Point,
}

impl LightKind {
    /// Shader-side type id
    pub const fn shader_id(self) -> f32 {
        match self {
            Self::Directional => 0.0,
            Self::Spot => 1.0,
            Self::Point => 2.0,
        }
    }
}

/// Light component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// Light type
    pub kind: LightKind,
    /// Linear colour
    pub colour: Vec4,
    /// Intensity before exposure
    pub intensity: f32,
    /// Attenuation radius
    pub radius: f32,
    /// Spot cone angle
    pub angle: f32,
}

impl Light {
    /// Directional light
    pub fn directional(colour: Vec4, intensity: f32) -> Self {
        Self { kind: LightKind::Directional, colour, intensity, radius: 0.0, angle: 0.0 }
    }

    /// Point light
    pub fn point(colour: Vec4, intensity: f32, radius: f32) -> Self {
        Self { kind: LightKind::Point, colour, intensity, radius, angle: 0.0 }
    }
}

/// A light placed in the scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLight {
    /// Light parameters
    pub light: Light,
    /// World transform; the light shines along local +Z
    pub transform: Transform,
    /// Inactive lights are skipped
    pub active: bool,
}

/// GPU layout of one light
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightData {
    /// Colour
    pub colour: [f32; 4],
    /// World position
    pub position: [f32; 4],
    /// World direction
    pub direction: [f32; 4],
    /// Exposure-scaled intensity
    pub intensity: f32,
    /// Radius
    pub radius: f32,
    /// Light type id
    pub kind: f32,
    /// Cone angle
    pub angle: f32,
}

bitflags! {
    /// Material render flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MaterialFlags: u32 {
        /// Test and write depth
        const DEPTH_TEST = 1 << 0;
        /// Disable back-face culling
        const TWO_SIDED = 1 << 1;
        /// Alpha blended or alpha tested
        const ALPHA_BLEND = 1 << 2;
        /// Never cast shadows
        const NO_SHADOW = 1 << 3;
    }
}

impl Default for MaterialFlags {
    fn default() -> Self {
        Self::DEPTH_TEST
    }
}

/// Material reference resolved by the asset system
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Material {
    /// Debug name
    pub name: String,
    /// Render flags
    pub flags: MaterialFlags,
    /// Material descriptor set (forward set 1); the default material's set is used when absent
    pub descriptor_set: Option<DescriptorSetHandle>,
}

impl Material {
    /// Material with flags and no descriptor set
    pub fn new(name: &str, flags: MaterialFlags) -> Self {
        Self { name: name.to_string(), flags, descriptor_set: None }
    }
}

/// A mesh placed in the scene
#[derive(Debug, Clone, PartialEq)]
pub struct MeshInstance {
    /// Geometry
    pub mesh: MeshHandle,
    /// Object-space bounds
    pub bounds: BoundingBox,
    /// Object-to-world matrix
    pub transform: Mat4,
    /// Material; the default material is used when absent
    pub material: Option<Arc<Material>>,
    /// Inactive meshes are skipped
    pub active: bool,
}

/// Textured quad
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    /// Bottom-left corner in object space
    pub position: Vec2,
    /// Width and height
    pub scale: Vec2,
    /// Tint colour
    pub colour: Vec4,
    /// Texture; untextured sprites sample slot 0
    pub texture: Option<TextureHandle>,
    /// UVs in bottom-left, bottom-right, top-right, top-left order
    pub uvs: [Vec2; 4],
}

impl Default for Sprite {
    fn default() -> Self {
        Self {
            position: Vec2::zeros(),
            scale: Vec2::new(1.0, 1.0),
            colour: Vec4::new(1.0, 1.0, 1.0, 1.0),
            texture: None,
            uvs: [
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
        }
    }
}

/// A sprite placed in the scene
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteInstance {
    /// Sprite
    pub sprite: Sprite,
    /// Object-to-world matrix
    pub transform: Mat4,
    /// Inactive sprites are skipped
    pub active: bool,
}

/// Text to draw with a signed distance field font
#[derive(Debug, Clone)]
pub struct TextComponent {
    /// UTF-8 text
    pub text: String,
    /// Font; the graph's default font is used when absent
    pub font: Option<Arc<FontGeometry>>,
    /// Fill colour
    pub colour: Vec4,
    /// Outline colour
    pub outline_colour: Vec4,
    /// Outline width in distance field units
    pub outline_width: f32,
    /// Wrap width; zero or less disables wrapping
    pub max_width: f32,
    /// Extra offset added to each line advance
    pub line_spacing: f32,
    /// Extra offset added to each glyph advance
    pub kerning: f32,
}

impl Default for TextComponent {
    fn default() -> Self {
        Self {
            text: String::new(),
            font: None,
            colour: Vec4::new(1.0, 1.0, 1.0, 1.0),
            outline_colour: Vec4::new(0.0, 0.0, 0.0, 1.0),
            outline_width: 0.0,
            max_width: 0.0,
            line_spacing: 0.0,
            kerning: 0.0,
        }
    }
}

/// Text placed in the scene
#[derive(Debug, Clone)]
pub struct TextInstance {
    /// Text and style
    pub text: TextComponent,
    /// Object-to-world matrix
    pub transform: Mat4,
}

/// Image based lighting for a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    /// Prefiltered environment cube map
    pub environment_map: TextureHandle,
    /// Irradiance cube map
    pub irradiance_map: TextureHandle,
}

/// Per-scene render toggles and post-process parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneRenderSettings {
    /// Draw sprites
    pub renderer_2d_enabled: bool,
    /// Draw meshes
    pub renderer_3d_enabled: bool,
    /// Draw the debug overlay
    pub debug_renderer_enabled: bool,
    /// Draw the skybox
    pub skybox_render_enabled: bool,
    /// Render cascaded shadows
    pub shadows_enabled: bool,
    /// Run the depth prepass
    pub depth_prepass: bool,
    /// Screen space ambient occlusion
    pub ssao_enabled: bool,
    /// Blur the occlusion term
    pub ssao_blur: bool,
    /// Sample hemisphere radius
    pub ssao_sample_radius: f32,
    /// Blur radius in texels
    pub ssao_blur_radius: i32,
    /// Occlusion strength
    pub ssao_strength: f32,
    /// Bloom
    pub bloom_enabled: bool,
    /// Bloom contribution in tone mapping
    pub bloom_intensity: f32,
    /// Brightness threshold
    pub bloom_threshold: f32,
    /// Soft threshold knee
    pub bloom_knee: f32,
    /// Upsample filter scale
    pub bloom_upsample_scale: f32,
    /// Depth of field
    pub depth_of_field_enabled: bool,
    /// Blur strength
    pub depth_of_field_strength: f32,
    /// Focus distance
    pub depth_of_field_distance: f32,
    /// Fast approximate anti-aliasing
    pub fxaa_enabled: bool,
    /// Debanding dither
    pub debanding_enabled: bool,
    /// Chromatic aberration
    pub chromatic_aberration_enabled: bool,
    /// Sharpen filter
    pub sharpen_enabled: bool,
    /// Filmic grain
    pub filmic_grain_enabled: bool,
    /// Eye adaptation
    pub eye_adaptation: bool,
    /// Tone mapping brightness
    pub brightness: f32,
    /// Tone mapping saturation
    pub saturation: f32,
    /// Tone mapping contrast
    pub contrast: f32,
    /// Tone mapping operator index
    pub tone_map_index: i32,
    /// Environment mip sampled by the skybox
    pub skybox_mip_level: f32,
    /// MSAA sample count
    pub msaa_samples: u8,
    /// Final pass debug view (0 = normal output)
    pub debug_mode: i32,
}

impl Default for SceneRenderSettings {
    fn default() -> Self {
        Self {
            renderer_2d_enabled: true,
            renderer_3d_enabled: true,
            debug_renderer_enabled: false,
            skybox_render_enabled: true,
            shadows_enabled: true,
            depth_prepass: true,
            ssao_enabled: false,
            ssao_blur: true,
            ssao_sample_radius: 2.0,
            ssao_blur_radius: 4,
            ssao_strength: 1.0,
            bloom_enabled: true,
            bloom_intensity: 1.0,
            bloom_threshold: 1.0,
            bloom_knee: 0.1,
            bloom_upsample_scale: 1.0,
            depth_of_field_enabled: false,
            depth_of_field_strength: 1.0,
            depth_of_field_distance: 100.0,
            fxaa_enabled: true,
            debanding_enabled: true,
            chromatic_aberration_enabled: false,
            sharpen_enabled: false,
            filmic_grain_enabled: false,
            eye_adaptation: false,
            brightness: 0.0,
            saturation: 1.0,
            contrast: 1.0,
            tone_map_index: 4,
            skybox_mip_level: 0.0,
            msaa_samples: 1,
            debug_mode: 0,
        }
    }
}

impl crate::config::Config for SceneRenderSettings {}

/// Everything the graph reads for one frame
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// Scene cameras; the first is used unless overridden
    pub cameras: Vec<CameraView>,
    /// Lights
    pub lights: Vec<SceneLight>,
    /// Meshes
    pub meshes: Vec<MeshInstance>,
    /// Sprites
    pub sprites: Vec<SpriteInstance>,
    /// Text
    pub texts: Vec<TextInstance>,
    /// Image based lighting
    pub environment: Option<Environment>,
    /// Render toggles
    pub settings: SceneRenderSettings,
    /// Debug primitives accumulated during the update
    pub debug: DebugDrawList,
    /// Seconds since start, drives animated post effects
    pub elapsed: f32,
}

impl Scene {
    /// Empty scene with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a camera
    pub fn with_camera(mut self, camera: CameraView) -> Self {
        self.cameras.push(camera);
        self
    }

    /// Builder: add a light
    pub fn with_light(mut self, light: Light, transform: Transform) -> Self {
        self.lights.push(SceneLight { light, transform, active: true });
        self
    }

    /// Builder: add a mesh
    pub fn with_mesh(mut self, mesh: MeshHandle, bounds: BoundingBox, transform: Mat4, material: Option<Arc<Material>>) -> Self {
        self.meshes.push(MeshInstance { mesh, bounds, transform, material, active: true });
        self
    }

    /// Builder: add a sprite
    pub fn with_sprite(mut self, sprite: Sprite, transform: Mat4) -> Self {
        self.sprites.push(SpriteInstance { sprite, transform, active: true });
        self
    }
}
