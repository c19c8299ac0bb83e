//! Render graph settings and per-frame statistics

use crate::config::Config;
use serde::{Deserialize, Serialize};

/// Which split value the last shadow cascade uses
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LastSplitPolicy {
    /// Use the blended logarithmic/uniform split like every other cascade
    Computed,
    /// Pin the last cascade to a fixed fraction of the shadow clip range.
    /// Clamped so splits never decrease.
    Fixed(f32),
}

impl Default for LastSplitPolicy {
    fn default() -> Self {
        Self::Fixed(0.35)
    }
}

/// Shadow map resolution presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ShadowQuality {
    /// 1024 texels
    Low,
    /// 2048 texels
    Medium,
    /// 4096 texels
    #[default]
    High,
}

impl ShadowQuality {
    /// Shadow map edge length in texels
    pub const fn map_size(self) -> u32 {
        match self {
            Self::Low => 1024,
            Self::Medium => 2048,
            Self::High => 4096,
        }
    }
}

/// Cascaded shadow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Number of cascades
    pub cascade_count: usize,
    /// Blend between logarithmic (1.0) and uniform (0.0) splits
    pub cascade_split_lambda: f32,
    /// Light size used for soft shadow filtering
    pub light_size: f32,
    /// Furthest distance that receives shadows
    pub max_shadow_distance: f32,
    /// Distance over which shadows fade out
    pub shadow_fade: f32,
    /// Distance over which cascades blend
    pub cascade_fade: f32,
    /// Depth bias applied when sampling
    pub initial_bias: f32,
    /// Light-space near plane offset
    pub cascade_near_offset: f32,
    /// Light-space far plane offset
    pub cascade_far_offset: f32,
    /// Radius rounding step used to stabilise cascades
    pub radius_step: f32,
    /// Last cascade split handling
    pub last_split: LastSplitPolicy,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            cascade_count: 4,
            cascade_split_lambda: 0.92,
            light_size: 1.5,
            max_shadow_distance: 500.0,
            shadow_fade: 40.0,
            cascade_fade: 3.0,
            initial_bias: 0.0,
            cascade_near_offset: -50.0,
            cascade_far_offset: 50.0,
            radius_step: 5.0,
            last_split: LastSplitPolicy::default(),
        }
    }
}

/// Limits for the 2D and text batchers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchLimits {
    /// Quads per draw call
    pub max_quads: usize,
    /// Texture slots per draw call
    pub max_textures: usize,
    /// Expected draw calls per frame; more are allowed but logged
    pub max_batch_draw_calls: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_quads: 1000,
            max_textures: 16,
            max_batch_draw_calls: 100,
        }
    }
}

impl BatchLimits {
    /// Indices a full batch draws
    pub const fn indices_size(&self) -> usize {
        self.max_quads * 6
    }

    /// Bytes a full batch of `stride`-sized vertices occupies
    pub const fn buffer_size(&self, stride: usize) -> usize {
        self.max_quads * 4 * stride
    }
}

/// Graph-wide switches and sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderPassesSettings {
    /// Allow the debug overlay
    pub debug_pass: bool,
    /// Allow the geometry passes
    pub geom_pass: bool,
    /// Allow post processing beyond tone mapping
    pub post_process_pass: bool,
    /// Allow the shadow pass
    pub shadow_pass: bool,
    /// Allow the skybox pass
    pub skybox_pass: bool,
    /// Disable SSAO and all optional post stages
    pub disable_post_process: bool,
    /// Forward commands may bind the depth buffer
    pub depth_test: bool,
    /// 2D and text batch limits
    pub batch: BatchLimits,
    /// Cascaded shadows
    pub shadow: ShadowConfig,
    /// BRDF lookup table size
    pub brdf_lut_size: u32,
    /// Environment cube map face size
    pub environment_map_size: u32,
    /// Irradiance cube map face size
    pub irradiance_map_size: u32,
    /// Importance samples for irradiance convolution
    pub irradiance_samples: i32,
    /// Maximum lights uploaded per frame
    pub max_lights: usize,
    /// Quality presets
    pub quality: QualitySettings,
}

impl Default for RenderPassesSettings {
    fn default() -> Self {
        Self {
            debug_pass: true,
            geom_pass: true,
            post_process_pass: true,
            shadow_pass: true,
            skybox_pass: true,
            disable_post_process: false,
            depth_test: true,
            batch: BatchLimits::default(),
            shadow: ShadowConfig::default(),
            brdf_lut_size: 512,
            environment_map_size: 512,
            irradiance_map_size: 32,
            irradiance_samples: 512,
            max_lights: 64,
            quality: QualitySettings::default(),
        }
    }
}

impl Config for RenderPassesSettings {}

/// Quality presets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    /// Shadow map resolution
    pub shadow_quality: ShadowQuality,
    /// Internal resolution relative to the window
    pub renderer_scale: f32,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            shadow_quality: ShadowQuality::High,
            renderer_scale: 1.0,
        }
    }
}

/// Per-frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderPassesStats {
    /// Forward, 2D and text commands drawn
    pub num_rendered_objects: u32,
    /// Shadow caster draws across all cascades
    pub num_shadow_objects: u32,
    /// Draws and dispatches issued
    pub num_draw_calls: u32,
}

impl RenderPassesStats {
    /// Zero every counter
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_defaults_match_renderer_constants() {
        let settings = RenderPassesSettings::default();
        assert_eq!(settings.shadow.cascade_count, 4);
        assert_eq!(settings.shadow.last_split, LastSplitPolicy::Fixed(0.35));
        assert_eq!(settings.batch.indices_size(), 6000);
        assert_eq!(settings.batch.buffer_size(16), 64_000);
        assert_eq!(settings.quality.shadow_quality.map_size(), 4096);
        assert!(settings.post_process_pass);
    }

    #[test]
    fn test_toml_round_trip_keeps_overrides() {
        let mut settings = RenderPassesSettings::default();
        settings.shadow.last_split = LastSplitPolicy::Computed;
        settings.batch.max_quads = 250;

        let text = settings.to_string_with_format(ConfigFormat::Toml).unwrap();
        let parsed = RenderPassesSettings::from_str_with_format(&text, ConfigFormat::Toml).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let parsed = RenderPassesSettings::from_str_with_format(
            "(debug_pass: false, quality: (shadow_quality: Low))",
            ConfigFormat::Ron,
        )
        .unwrap();
        assert!(!parsed.debug_pass);
        assert_eq!(parsed.quality.shadow_quality.map_size(), 1024);
        assert_eq!(parsed.shadow, ShadowConfig::default());
    }
}
