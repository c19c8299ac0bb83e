//! Render command queues
//!
//! Per frame the scene is culled into flat command lists: the forward queue,
//! the 2D queue, the text queue and one caster queue per shadow cascade.
//! Pipelines are resolved while binning so the passes never look them up.

use crate::foundation::math::{translation_of, Mat4, Vec3};
use crate::rhi::{
    CullMode, DescriptorSetHandle, MeshHandle, PipelineDesc, PipelineHandle, ShaderHandle, TextureHandle,
};
use crate::scene::{LightData, LightKind, Material, MaterialFlags, SceneLight, Sprite, TextComponent};
use crate::spatial::{BoundingSphere, Frustum};
use std::cmp::Ordering;
use std::sync::Arc;

/// A mesh draw in the forward or a shadow queue
#[derive(Debug, Clone)]
pub struct RenderCommand {
    /// Geometry
    pub mesh: MeshHandle,
    /// Object-to-world matrix
    pub transform: Mat4,
    /// Material, or the default material
    pub material: Arc<Material>,
    /// Pipeline resolved at bin time
    pub pipeline: PipelineHandle,
    /// Whether the pipeline binds the depth buffer
    pub depth_tested: bool,
}

impl RenderCommand {
    /// Material flags, shortcut
    pub fn flags(&self) -> MaterialFlags {
        self.material.flags
    }
}

/// A sprite draw in the 2D queue
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCommand2D {
    /// Sprite
    pub sprite: Sprite,
    /// Object-to-world matrix
    pub transform: Mat4,
}

/// A text draw in the text queue
#[derive(Debug, Clone)]
pub struct TextCommand {
    /// Text and style
    pub text: TextComponent,
    /// Object-to-world matrix
    pub transform: Mat4,
}

/// Forward pass state
#[derive(Debug)]
pub struct ForwardData {
    /// Depth buffer
    pub depth_texture: TextureHandle,
    /// View-space normals written by the depth prepass
    pub normal_texture: TextureHandle,
    /// Split-sum BRDF lookup table
    pub brdf_lut: TextureHandle,
    /// Prefiltered environment cube map
    pub environment_map: TextureHandle,
    /// Irradiance cube map
    pub irradiance_map: TextureHandle,
    /// Scene environment currently bound, if any
    pub bound_environment: Option<TextureHandle>,
    /// Material used by meshes without one
    pub default_material: Arc<Material>,
    /// Set 1 of the default material
    pub default_material_set: DescriptorSetHandle,
    /// Set 0: camera
    pub scene_set: DescriptorSetHandle,
    /// Set 2: lights, shadows and image based lighting
    pub lighting_set: DescriptorSetHandle,
    /// Visible meshes, sorted before drawing
    pub command_queue: Vec<RenderCommand>,
    /// Camera frustum of the current frame
    pub frustum: Frustum,
    /// Lighting debug mode forwarded to the shader
    pub render_mode: i32,
    /// Lights uploaded this frame
    pub light_count: usize,
}

/// Targets and switches the forward pipeline is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardTargets {
    /// Colour attachment
    pub colour: TextureHandle,
    /// Depth attachment
    pub depth: TextureHandle,
    /// MSAA resolve attachment
    pub resolve: Option<TextureHandle>,
    /// MSAA samples
    pub samples: u8,
    /// Graph-wide depth test switch
    pub depth_test: bool,
}

/// Forward pipeline description for a material
pub fn forward_pipeline_desc(shader: ShaderHandle, flags: MaterialFlags, targets: &ForwardTargets) -> PipelineDesc {
    let transparent = flags.contains(MaterialFlags::ALPHA_BLEND);
    let depth_tested = targets.depth_test && flags.contains(MaterialFlags::DEPTH_TEST);
    let debug_name = match (transparent, depth_tested) {
        (true, true) => "Forward PBR Transparent DepthTested",
        (false, true) => "Forward PBR DepthTested",
        (true, false) => "Forward PBR Transparent",
        (false, false) => "Forward PBR",
    };

    let mut desc = PipelineDesc::new(shader, debug_name)
        .with_colour_target(targets.colour)
        .with_cull_mode(if flags.contains(MaterialFlags::TWO_SIDED) { CullMode::None } else { CullMode::Back })
        .with_depth_target(depth_tested.then_some(targets.depth))
        .with_samples(targets.samples, targets.resolve);
    if transparent {
        desc = desc.with_alpha_blend();
    }
    desc
}

/// Cascade pipeline description; culls front faces into the layered depth target
pub fn shadow_pipeline_desc(shader: ShaderHandle, flags: MaterialFlags, shadow_texture: TextureHandle) -> PipelineDesc {
    let mut desc = PipelineDesc::new(shader, "Shadow").with_cull_mode(CullMode::Front);
    desc.depth_array_target = Some(shadow_texture);
    desc.transparency_enabled = flags.contains(MaterialFlags::ALPHA_BLEND);
    desc
}

/// Depth-tested commands first, then nearest to the camera first
pub fn sort_forward_queue(queue: &mut [RenderCommand], camera_position: Vec3) {
    let distance = |command: &RenderCommand| (translation_of(&command.transform) - camera_position).norm_squared();
    queue.sort_by(|a, b| {
        b.depth_tested
            .cmp(&a.depth_tested)
            .then_with(|| distance(a).partial_cmp(&distance(b)).unwrap_or(Ordering::Equal))
    });
}

/// Painter's order: ascending world Z
pub fn sort_2d_queue(queue: &mut [RenderCommand2D]) {
    queue.sort_by(|a, b| {
        translation_of(&a.transform)
            .z
            .partial_cmp(&translation_of(&b.transform).z)
            .unwrap_or(Ordering::Equal)
    });
}

/// Lights gathered for upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedLights {
    /// Lights in upload order, intensity scaled by exposure
    pub lights: Vec<LightData>,
    /// First directional light in scene order
    pub directional: Option<LightData>,
}

/// Gather active lights for the forward pass.
///
/// Non-directional lights outside `frustum` (tested with a sphere of a
/// hundred times their radius) are dropped. At most `max_lights` are kept.
pub fn collect_lights(lights: &[SceneLight], frustum: &Frustum, exposure: f32, max_lights: usize) -> CollectedLights {
    let mut collected = CollectedLights::default();

    for scene_light in lights.iter().filter(|l| l.active) {
        if collected.lights.len() >= max_lights {
            break;
        }

        let light = &scene_light.light;
        let position = scene_light.transform.position;
        let direction = scene_light.transform.forward();
        let data = LightData {
            colour: [light.colour.x, light.colour.y, light.colour.z, light.colour.w],
            position: [position.x, position.y, position.z, 1.0],
            direction: [direction.x, direction.y, direction.z, 1.0],
            intensity: light.intensity * exposure,
            radius: light.radius,
            kind: light.kind.shader_id(),
            angle: light.angle,
        };

        if light.kind == LightKind::Directional {
            if collected.directional.is_none() {
                collected.directional = Some(data);
            }
        } else if !frustum.intersects_sphere(&BoundingSphere::new(position, light.radius * 100.0)) {
            continue;
        }

        collected.lights.push(data);
    }

    collected
}

/// Direction of a gathered light
pub fn light_direction(light: &LightData) -> Vec3 {
    Vec3::new(light.direction[0], light.direction[1], light.direction[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{look_at, perspective_zo, Transform, Vec4};
    use crate::scene::Light;
    use slotmap::SlotMap;

    fn pipeline() -> PipelineHandle {
        let mut pipelines: SlotMap<PipelineHandle, ()> = SlotMap::with_key();
        pipelines.insert(())
    }

    fn command(z: f32, depth_tested: bool, pipeline: PipelineHandle) -> RenderCommand {
        RenderCommand {
            mesh: MeshHandle(z.to_bits().into()),
            transform: Transform::from_position(Vec3::new(0.0, 0.0, z)).to_matrix(),
            material: Arc::new(Material::default()),
            pipeline,
            depth_tested,
        }
    }

    #[test]
    fn test_depth_tested_sorts_first_regardless_of_distance() {
        let p = pipeline();
        let mut queue = vec![command(1.0, false, p), command(50.0, true, p), command(5.0, true, p)];
        sort_forward_queue(&mut queue, Vec3::zeros());

        assert!(queue[0].depth_tested && queue[1].depth_tested);
        assert!(!queue[2].depth_tested);
        assert_eq!(translation_of(&queue[0].transform).z, 5.0);
        assert_eq!(translation_of(&queue[1].transform).z, 50.0);
    }

    #[test]
    fn test_2d_queue_sorted_by_z() {
        let sprite = |z: f32| RenderCommand2D {
            sprite: Sprite::default(),
            transform: Transform::from_position(Vec3::new(0.0, 0.0, z)).to_matrix(),
        };
        let mut queue = vec![sprite(3.0), sprite(-1.0), sprite(2.0)];
        sort_2d_queue(&mut queue);
        let order: Vec<f32> = queue.iter().map(|c| translation_of(&c.transform).z).collect();
        assert_eq!(order, vec![-1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_forward_pipeline_resolves_material_flags() {
        let mut shaders: SlotMap<ShaderHandle, ()> = SlotMap::with_key();
        let shader = shaders.insert(());
        let mut textures: SlotMap<TextureHandle, ()> = SlotMap::with_key();
        let targets = ForwardTargets {
            colour: textures.insert(()),
            depth: textures.insert(()),
            resolve: None,
            samples: 1,
            depth_test: true,
        };

        let opaque = forward_pipeline_desc(shader, MaterialFlags::DEPTH_TEST, &targets);
        assert_eq!(opaque.debug_name, "Forward PBR DepthTested");
        assert_eq!(opaque.depth_target, Some(targets.depth));
        assert_eq!(opaque.cull_mode, CullMode::Back);

        let glass = forward_pipeline_desc(shader, MaterialFlags::ALPHA_BLEND | MaterialFlags::TWO_SIDED, &targets);
        assert_eq!(glass.debug_name, "Forward PBR Transparent");
        assert_eq!(glass.depth_target, None);
        assert_eq!(glass.cull_mode, CullMode::None);
        assert!(glass.transparency_enabled);

        let no_depth = ForwardTargets { depth_test: false, ..targets };
        assert_eq!(forward_pipeline_desc(shader, MaterialFlags::DEPTH_TEST, &no_depth).depth_target, None);
    }

    #[test]
    fn test_collect_lights_culls_and_scales() {
        let view = look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), Vec3::y());
        let frustum = Frustum::from_matrix(&(perspective_zo(1.0, 1.0, 0.1, 100.0) * view));
        let white = Vec4::repeat(1.0);
        let lights = vec![
            SceneLight { light: Light::point(white, 2.0, 1.0), transform: Transform::from_position(Vec3::zeros()), active: true },
            SceneLight { light: Light::directional(white, 3.0), transform: Transform::identity(), active: true },
            SceneLight { light: Light::directional(white, 9.0), transform: Transform::identity(), active: true },
            SceneLight { light: Light::point(white, 1.0, 0.01), transform: Transform::from_position(Vec3::new(0.0, 0.0, 500.0)), active: true },
            SceneLight { light: Light::point(white, 1.0, 1.0), transform: Transform::identity(), active: false },
        ];

        let collected = collect_lights(&lights, &frustum, 0.5, 64);
        assert_eq!(collected.lights.len(), 3);
        assert_eq!(collected.lights[0].intensity, 1.0);
        assert_eq!(collected.directional.map(|d| d.intensity), Some(1.5));

        let capped = collect_lights(&lights, &frustum, 1.0, 1);
        assert_eq!(capped.lights.len(), 1);
        assert!(capped.directional.is_none());
    }
}
