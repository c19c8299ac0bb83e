//! Screen space ambient occlusion tables
//!
//! The occlusion pass samples a hemisphere kernel around each pixel and
//! rotates it with a small tiling noise texture.

use crate::foundation::math::{utils, Vec3, Vec4};
use rand::Rng;

/// Samples in the hemisphere kernel
pub const KERNEL_SIZE: usize = 64;

/// Edge length of the tiling noise texture
pub const NOISE_DIM: u32 = 4;

/// Hemisphere samples, denser toward the origin
pub fn generate_kernel(rng: &mut impl Rng) -> Vec<Vec4> {
    (0..KERNEL_SIZE)
        .map(|i| {
            let direction = Vec3::new(rng.gen_range(-0.9..0.9), rng.gen_range(-0.9..0.9), rng.gen_range(0.0..1.0));
            let sample = direction.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::z) * rng.gen_range(0.0..1.0);
            let t = i as f32 / KERNEL_SIZE as f32;
            let scale = utils::lerp(0.1, 1.0, t * t);
            (sample * scale).push(0.0)
        })
        .collect()
}

/// RGBA32F noise texels: random xy rotation vectors, zero zw
pub fn generate_noise(rng: &mut impl Rng) -> Vec<f32> {
    (0..NOISE_DIM * NOISE_DIM)
        .flat_map(|_| [rng.gen_range(-1.0_f32..1.0), rng.gen_range(-1.0..1.0), 0.0, 0.0])
        .collect()
}
