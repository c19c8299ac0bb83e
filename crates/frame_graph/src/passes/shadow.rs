//! Cascaded shadow maps
//!
//! [`compute_cascades`] fits one orthographic light projection around each
//! slice of the camera frustum. Slices follow a blend of logarithmic and
//! uniform split distances, and each projection is snapped to whole shadow
//! map texels so the cascades do not shimmer while the camera moves.

use super::queue::RenderCommand;
use crate::foundation::math::{look_at, orthographic_zo, perspective_zo, utils, Mat4, Vec3, Vec4};
use crate::rhi::{DescriptorSetHandle, TextureHandle};
use crate::settings::{LastSplitPolicy, ShadowConfig};
use crate::spatial::Frustum;

/// Camera and light state the cascades are fitted to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeInput {
    /// Camera near plane
    pub near: f32,
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Width over height
    pub aspect: f32,
    /// Camera-to-world matrix
    pub camera_world: Mat4,
    /// World direction of the directional light
    pub light_direction: Vec3,
}

/// Output of [`compute_cascades`]
#[derive(Debug, Clone, PartialEq)]
pub struct Cascades {
    /// Split fraction of the shadow clip range, one per cascade
    pub splits: Vec<f32>,
    /// Bounding sphere radius after rounding, one per cascade
    pub radii: Vec<f32>,
    /// Light projection-view matrix per cascade
    pub proj_view: Vec<Mat4>,
    /// Negated view-space depth where each cascade ends
    pub split_depths: Vec<f32>,
    /// Inverse light view of the first cascade
    pub light_matrix: Mat4,
}

/// Split fractions in `[0, 1]` of the shadow clip range.
///
/// The last split follows `config.last_split`; a fixed value is clamped so it
/// never precedes the split before it.
pub fn cascade_splits(near: f32, config: &ShadowConfig) -> Vec<f32> {
    let count = config.cascade_count.max(1);
    let far = config.max_shadow_distance * 1.2;
    let clip_range = far - near;
    let ratio = far / near;

    let mut splits: Vec<f32> = (0..count)
        .map(|i| {
            let p = (i + 1) as f32 / count as f32;
            let log = near * ratio.powf(p);
            let uniform = near + clip_range * p;
            let d = config.cascade_split_lambda * (log - uniform) + uniform;
            ((d - near) / clip_range).clamp(0.0, 1.0)
        })
        .collect();

    if let LastSplitPolicy::Fixed(value) = config.last_split {
        let previous = if count > 1 { splits[count - 2] } else { 0.0 };
        splits[count - 1] = value.clamp(previous, 1.0);
    }
    splits
}

/// Round `radius` up to the next multiple of `step`
pub fn round_radius(radius: f32, step: f32) -> f32 {
    if step <= 0.0 {
        return radius;
    }
    (radius / step).ceil() * step
}

/// Compute light matrices for every cascade.
///
/// `map_size` is the shadow map edge length in texels and drives the texel
/// snapping.
pub fn compute_cascades(input: &CascadeInput, config: &ShadowConfig, map_size: u32) -> Cascades {
    let count = config.cascade_count.max(1);
    let near = input.near;
    let far = config.max_shadow_distance * 1.2;
    let clip_range = far - near;
    let splits = cascade_splits(near, config);

    let projection = perspective_zo(utils::deg_to_rad(input.fov), input.aspect, near, far);
    let view = input.camera_world.try_inverse().unwrap_or_else(Mat4::identity);
    let inv_camera = (projection * view).try_inverse().unwrap_or_else(Mat4::identity);

    let ndc_corners = [
        Vec3::new(-1.0, 1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(-1.0, 1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(-1.0, -1.0, 1.0),
    ];
    let world_corners = ndc_corners.map(|c| {
        let p = inv_camera * Vec4::new(c.x, c.y, c.z, 1.0);
        p.xyz() / p.w
    });

    let light_dir = input.light_direction.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::z);
    let half_map = map_size as f32 * 0.5;

    let mut cascades = Cascades {
        splits: splits.clone(),
        radii: Vec::with_capacity(count),
        proj_view: Vec::with_capacity(count),
        split_depths: Vec::with_capacity(count),
        light_matrix: Mat4::identity(),
    };

    let mut last_split = 0.0;
    for (i, &split) in splits.iter().enumerate() {
        let mut corners = world_corners;
        for j in 0..4 {
            let dist = world_corners[j + 4] - world_corners[j];
            corners[j + 4] = world_corners[j] + dist * split;
            corners[j] = world_corners[j] + dist * last_split;
        }
        last_split = split;

        let center = corners.iter().sum::<Vec3>() / 8.0;
        let radius = corners.iter().map(|c| (c - center).norm()).fold(0.0_f32, f32::max);
        let radius = round_radius(radius, config.radius_step);
        cascades.radii.push(radius);

        let mut light_ortho = orthographic_zo(
            -radius,
            radius,
            -radius,
            radius,
            config.cascade_near_offset,
            2.0 * radius + config.cascade_far_offset,
        );
        // Light camera sits on the light direction side of the slice center
        let eye = center + light_dir * radius;
        let up = if light_dir.cross(&Vec3::z()).norm_squared() < 1e-6 { Vec3::y() } else { Vec3::z() };
        let light_view = look_at(eye, center, up);

        let origin = light_ortho * light_view * Vec4::new(0.0, 0.0, 0.0, 1.0) * half_map;
        let rounded = origin.map(f32::round);
        let offset = (rounded - origin) / half_map;
        light_ortho[(0, 3)] += offset.x;
        light_ortho[(1, 3)] += offset.y;

        cascades.proj_view.push(light_ortho * light_view);
        cascades.split_depths.push(-(near + split * clip_range));

        if i == 0 {
            cascades.light_matrix = light_view.try_inverse().unwrap_or_else(Mat4::identity);
        }
    }

    cascades
}

/// Cascade state and per-cascade caster queues
#[derive(Debug)]
pub struct ShadowData {
    /// Cascade configuration
    pub config: ShadowConfig,
    /// Shadow map edge length in texels
    pub map_size: u32,
    /// Layered depth texture, one layer per cascade
    pub shadow_texture: TextureHandle,
    /// Light projection-view per cascade
    pub proj_view: Vec<Mat4>,
    /// Negated view-space split depth per cascade
    pub split_depths: Vec<f32>,
    /// Inverse light view of the first cascade
    pub light_matrix: Mat4,
    /// Culling frustum per cascade
    pub frustums: Vec<Frustum>,
    /// Casters per cascade, cleared each frame
    pub queues: Vec<Vec<RenderCommand>>,
    /// Set 0 for the opaque and alpha shadow shaders
    pub descriptor_sets: Vec<DescriptorSetHandle>,
    /// Whether the cascades were fitted this frame
    pub valid: bool,
}

impl ShadowData {
    /// Empty cascade state for a shadow texture
    pub fn new(config: ShadowConfig, map_size: u32, shadow_texture: TextureHandle) -> Self {
        let count = config.cascade_count.max(1);
        Self {
            config,
            map_size,
            shadow_texture,
            proj_view: vec![Mat4::identity(); count],
            split_depths: vec![0.0; count],
            light_matrix: Mat4::identity(),
            frustums: vec![Frustum::default(); count],
            queues: vec![Vec::new(); count],
            descriptor_sets: Vec::new(),
            valid: false,
        }
    }

    /// Number of cascades
    pub fn cascade_count(&self) -> usize {
        self.queues.len()
    }

    /// Empty every queue without releasing capacity
    pub fn clear_queues(&mut self) {
        for queue in &mut self.queues {
            queue.clear();
        }
        self.valid = false;
    }

    /// Fit the cascades to a camera and light
    pub fn update(&mut self, input: &CascadeInput) {
        let cascades = compute_cascades(input, &self.config, self.map_size);
        self.frustums = cascades.proj_view.iter().map(Frustum::from_matrix).collect();
        self.proj_view = cascades.proj_view;
        self.split_depths = cascades.split_depths;
        self.light_matrix = cascades.light_matrix;
        self.valid = true;
    }

    /// Whether any cascade has casters
    pub fn has_casters(&self) -> bool {
        self.queues.iter().any(|queue| !queue.is_empty())
    }

    /// Total casters across cascades
    pub fn caster_count(&self) -> usize {
        self.queues.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Transform;
    use crate::spatial::BoundingBox;
    use approx::assert_relative_eq;

    fn input() -> CascadeInput {
        CascadeInput {
            near: 0.1,
            fov: 60.0,
            aspect: 16.0 / 9.0,
            camera_world: Transform::from_position(Vec3::new(0.0, 2.0, 10.0)).to_matrix(),
            light_direction: Vec3::new(0.3, 1.0, 0.2),
        }
    }

    #[test]
    fn test_splits_monotonic_in_unit_range() {
        for count in 1..=8 {
            for last_split in [LastSplitPolicy::Computed, LastSplitPolicy::Fixed(0.35)] {
                let config = ShadowConfig { cascade_count: count, last_split, ..ShadowConfig::default() };
                let splits = cascade_splits(0.1, &config);
                assert_eq!(splits.len(), count);
                assert!(splits.iter().all(|s| (0.0..=1.0).contains(s)));
                assert!(splits.windows(2).all(|w| w[0] <= w[1]), "{count}: {splits:?}");
            }
        }
    }

    #[test]
    fn test_last_split_uses_fixed_policy() {
        let config = ShadowConfig::default();
        let splits = cascade_splits(0.1, &config);
        assert_eq!(splits.len(), 4);
        assert_relative_eq!(splits[3], 0.35);

        let computed = cascade_splits(0.1, &ShadowConfig { last_split: LastSplitPolicy::Computed, ..config });
        assert_relative_eq!(computed[3], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_rounded_radius_never_shrinks() {
        for radius in [0.0, 0.1, 4.99, 5.0, 5.01, 123.4, 999.9] {
            let rounded = round_radius(radius, 5.0);
            assert!(rounded >= radius);
            assert!(rounded - radius < 5.0);
            assert_relative_eq!(rounded % 5.0, 0.0);
        }

        let cascades = compute_cascades(&input(), &ShadowConfig::default(), 4096);
        assert!(cascades.radii.iter().all(|r| *r >= 0.0));
    }

    #[test]
    fn test_cascades_cover_camera_position() {
        let config = ShadowConfig::default();
        let cascades = compute_cascades(&input(), &config, 4096);
        assert_eq!(cascades.proj_view.len(), 4);
        assert_eq!(cascades.split_depths.len(), 4);
        assert!(cascades.split_depths.windows(2).all(|w| w[0] >= w[1]));

        // A small box just in front of the camera is inside the first cascade
        let bounds = BoundingBox::from_center_extents(Vec3::new(0.0, 2.0, 8.0), Vec3::repeat(0.5));
        assert!(Frustum::from_matrix(&cascades.proj_view[0]).intersects_box(&bounds));
    }

    #[test]
    fn test_light_along_up_axis_is_finite() {
        let mut straight_down = input();
        straight_down.light_direction = Vec3::z();
        let cascades = compute_cascades(&straight_down, &ShadowConfig::default(), 2048);
        assert!(cascades.proj_view.iter().all(|m| m.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn test_origin_snaps_to_texels() {
        let map_size = 2048;
        let cascades = compute_cascades(&input(), &ShadowConfig::default(), map_size);
        let half = map_size as f32 * 0.5;
        for m in &cascades.proj_view {
            let origin = m * Vec4::new(0.0, 0.0, 0.0, 1.0) * half;
            assert_relative_eq!(origin.x, origin.x.round(), epsilon = 1e-2);
            assert_relative_eq!(origin.y, origin.y.round(), epsilon = 1e-2);
        }
    }

    #[test]
    fn test_clear_queues_invalidates() {
        let mut textures: slotmap::SlotMap<TextureHandle, ()> = slotmap::SlotMap::with_key();
        let mut data = ShadowData::new(ShadowConfig::default(), 1024, textures.insert(()));
        data.update(&input());
        assert!(data.valid);
        data.clear_queues();
        assert!(!data.valid);
        assert!(!data.has_casters());
        assert_eq!(data.cascade_count(), 4);
    }
}
