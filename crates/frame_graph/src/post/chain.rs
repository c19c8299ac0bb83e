//! Post-process stage list
//!
//! The chain is data: each entry names its shader, optional compute
//! variant and debug label. Which entries run in a frame is decided by
//! [`active_stages`] from the scene toggles and the graph-wide switches.

use crate::passes::shader_names;
use crate::scene::SceneRenderSettings;

/// One full-screen post-process stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostStage {
    /// Depth of field blur
    DepthOfField,
    /// Bloom mip chain; writes its own textures, not the ping-pong pair
    Bloom,
    /// Debanding dither
    Debanding,
    /// Tone mapping and colour grading; always runs
    ToneMapping,
    /// Sharpen filter
    Sharpen,
    /// Fast approximate anti-aliasing
    Fxaa,
    /// Chromatic aberration
    ChromaticAberration,
    /// Film grain
    FilmicGrain,
}

/// Static description of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDesc {
    /// Stage
    pub stage: PostStage,
    /// Raster shader
    pub shader: &'static str,
    /// Compute variant used when the device supports compute
    pub compute_shader: Option<&'static str>,
    /// Pipeline debug label
    pub debug_name: &'static str,
    /// Stage writes the ping-pong pair and swaps it
    pub swaps: bool,
}

impl StageDesc {
    /// Shader to request for the device's capabilities
    pub fn shader_for(&self, support_compute: bool) -> &'static str {
        match self.compute_shader {
            Some(compute) if support_compute => compute,
            _ => self.shader,
        }
    }
}

/// Every stage in execution order
pub const POST_PROCESS_CHAIN: [StageDesc; 8] = [
    StageDesc {
        stage: PostStage::DepthOfField,
        shader: shader_names::DEPTH_OF_FIELD,
        compute_shader: None,
        debug_name: "DepthofField",
        swaps: true,
    },
    StageDesc {
        stage: PostStage::Bloom,
        shader: shader_names::BLOOM,
        compute_shader: Some(shader_names::BLOOM_COMPUTE),
        debug_name: "Bloom",
        swaps: false,
    },
    StageDesc {
        stage: PostStage::Debanding,
        shader: shader_names::DEBANDING,
        compute_shader: None,
        debug_name: "Debanding",
        swaps: true,
    },
    StageDesc {
        stage: PostStage::ToneMapping,
        shader: shader_names::TONE_MAPPING,
        compute_shader: None,
        debug_name: "ToneMapping",
        swaps: true,
    },
    StageDesc {
        stage: PostStage::Sharpen,
        shader: shader_names::SHARPEN,
        compute_shader: None,
        debug_name: "Sharpen",
        swaps: true,
    },
    StageDesc {
        stage: PostStage::Fxaa,
        shader: shader_names::FXAA,
        compute_shader: Some(shader_names::FXAA_COMPUTE),
        debug_name: "FXAA",
        swaps: true,
    },
    StageDesc {
        stage: PostStage::ChromaticAberration,
        shader: shader_names::CHROMATIC_ABERRATION,
        compute_shader: None,
        debug_name: "ChromaticAberation",
        swaps: true,
    },
    StageDesc {
        stage: PostStage::FilmicGrain,
        shader: shader_names::FILMIC_GRAIN,
        compute_shader: None,
        debug_name: "FilmicGrain",
        swaps: true,
    },
];

/// Graph-wide switches applied on top of the scene toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainGate {
    /// Optional stages are off
    pub disable_post_process: bool,
    /// Optional stages are allowed at all
    pub post_process_pass: bool,
    /// Main target is multisampled
    pub msaa: bool,
}

impl PostStage {
    /// Whether the scene asks for this stage
    pub fn requested(self, settings: &SceneRenderSettings) -> bool {
        match self {
            Self::DepthOfField => settings.depth_of_field_enabled,
            Self::Bloom => settings.bloom_enabled,
            Self::Debanding => settings.debanding_enabled,
            Self::ToneMapping => true,
            Self::Sharpen => settings.sharpen_enabled,
            Self::Fxaa => settings.fxaa_enabled,
            Self::ChromaticAberration => settings.chromatic_aberration_enabled,
            Self::FilmicGrain => settings.filmic_grain_enabled,
        }
    }

    /// Whether the stage runs this frame
    pub fn enabled(self, settings: &SceneRenderSettings, gate: ChainGate) -> bool {
        match self {
            Self::ToneMapping => true,
            // Needs single-sample depth
            Self::DepthOfField if gate.msaa => false,
            _ => self.requested(settings) && gate.post_process_pass && !gate.disable_post_process,
        }
    }
}

/// Stages that run this frame, in order
pub fn active_stages(settings: &SceneRenderSettings, gate: ChainGate) -> Vec<&'static StageDesc> {
    POST_PROCESS_CHAIN
        .iter()
        .filter(|desc| desc.stage.enabled(settings, gate))
        .collect()
}
