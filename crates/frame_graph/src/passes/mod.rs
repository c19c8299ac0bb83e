//! # Render Passes
//!
//! The frame pipeline: cascade computation, command queue building and the
//! pass executor that records every GPU pass of a frame in a fixed order.
//!
//! ## Architecture
//!
//! - **RenderPasses**: owns every pass's persistent GPU state and runs the frame
//! - **ShadowData**: cascade matrices, splits and per-cascade command queues
//! - **ForwardData**: depth/normal targets, scene descriptor sets and the main queue
//! - **RenderContext**: one-time initialisation flags and shared scratch data

pub mod context;
pub mod environment;
pub mod graph;
pub mod queue;
pub mod shadow;
pub mod ssao;

mod geometry;
mod overlay;
mod sprites;

pub use context::RenderContext;
pub use environment::{create_cube_map, CubeMapParams};
pub use graph::{RenderPasses, RenderTargets};
pub use queue::{ForwardData, RenderCommand, RenderCommand2D, TextCommand};
pub use shadow::{compute_cascades, CascadeInput, ShadowData};

use crate::error::FrameGraphResult;
use crate::rhi::{PushConstantBlock, RenderDevice, ShaderHandle};

/// Zeroed push constant block for a shader, if it declares one
pub(crate) fn push_constant_block(device: &dyn RenderDevice, shader: ShaderHandle) -> FrameGraphResult<Option<PushConstantBlock>> {
    Ok(device.reflect(shader)?.push_constants.map(PushConstantBlock::new))
}

/// Names of the shaders the graph requests from the shader library
pub mod shader_names {
    /// Forward PBR lighting
    pub const FORWARD_PBR: &str = "ForwardPBR";
    /// Depth and normal prepass
    pub const DEPTH_PRE_PASS: &str = "DepthPrePass";
    /// Depth prepass for alpha-blended materials
    pub const DEPTH_PRE_PASS_ALPHA: &str = "DepthPrePassAlpha";
    /// Cascade depth
    pub const SHADOW: &str = "Shadow";
    /// Cascade depth for alpha-blended materials
    pub const SHADOW_ALPHA: &str = "ShadowAlpha";
    /// Equirectangular to cube conversion
    pub const CREATE_ENVIRONMENT_MAP: &str = "CreateEnvironmentMap";
    /// Roughness prefilter per mip
    pub const ENVIRONMENT_MIP_FILTER: &str = "EnvironmentMipFilter";
    /// Diffuse irradiance convolution
    pub const ENVIRONMENT_IRRADIANCE: &str = "EnvironmentIrradiance";
    /// Film grain
    pub const FILMIC_GRAIN: &str = "FilmicGrain";
    /// Compute bloom
    pub const BLOOM_COMPUTE: &str = "BloomComp";
    /// Compute FXAA
    pub const FXAA_COMPUTE: &str = "FXAAComp";
    /// Split-sum BRDF lookup
    pub const BRDF_LUT: &str = "BRDFLUT";
    /// Environment skybox
    pub const SKYBOX: &str = "Skybox";
    /// Ambient occlusion
    pub const SSAO: &str = "SSAO";
    /// Separable ambient occlusion blur
    pub const SSAO_BLUR: &str = "SSAOBlur";
    /// Sprite quads
    pub const BATCH_2D: &str = "Batch2D";
    /// Debug lines
    pub const BATCH_2D_LINE: &str = "Batch2DLine";
    /// Debug points
    pub const BATCH_2D_POINT: &str = "Batch2DPoint";
    /// SDF text
    pub const TEXT: &str = "Text";
    /// Tone mapping and colour grading
    pub const TONE_MAPPING: &str = "ToneMapping";
    /// Raster bloom
    pub const BLOOM: &str = "Bloom";
    /// Depth of field
    pub const DEPTH_OF_FIELD: &str = "DepthOfField";
    /// Sharpen
    pub const SHARPEN: &str = "Sharpen";
    /// Raster FXAA
    pub const FXAA: &str = "FXAA";
    /// Debanding
    pub const DEBANDING: &str = "Debanding";
    /// Chromatic aberration
    pub const CHROMATIC_ABERRATION: &str = "ChromaticAberration";
    /// Blit to the output target
    pub const FINAL_PASS: &str = "FinalPass";
}
