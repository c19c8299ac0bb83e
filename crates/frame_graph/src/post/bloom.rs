//! Bloom mip-chain plan
//!
//! Bloom works on three mip-mapped textures. The source is prefiltered into
//! texture 0, downsampled by bouncing between textures 0 and 1, then
//! upsampled back up the chain alternating between textures 1 and 2 so a
//! compute-written image is never sampled in the same step it is stored to.
//!
//! [`BloomPlan`] is the pure schedule; the post-process executor turns each
//! [`BloomStep`] into one dispatch or full-screen draw.

use crate::foundation::math::Vec4;

/// Which of the three bloom textures
pub type BloomTextureIndex = usize;

/// Texture a bloom step samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BloomInput {
    /// The post-process chain's current colour
    Source,
    /// One of the bloom textures, full mip chain
    Bloom(BloomTextureIndex),
}

/// Shader mode selector, written into `Params2.y`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BloomMode {
    /// Threshold the source
    Prefilter,
    /// Downsample one mip
    Downsample,
    /// First upsample, combines with the source
    FirstUpsample,
    /// Upsample combining with the previous upsample
    Upsample,
}

impl BloomMode {
    /// Value the shader switches on
    pub const fn shader_value(self) -> f32 {
        match self {
            Self::Prefilter => 0.0,
            Self::Downsample => 1.0,
            Self::FirstUpsample => 2.0,
            Self::Upsample => 3.0,
        }
    }

    /// Pipeline debug label
    pub const fn debug_name(self) -> &'static str {
        match self {
            Self::Prefilter => "Bloom-Prefilter",
            Self::Downsample => "Bloom-Downsample",
            Self::FirstUpsample | Self::Upsample => "Bloom-Upsample",
        }
    }
}

/// One dispatch or draw of the bloom chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomStep {
    /// Shader mode
    pub mode: BloomMode,
    /// Bound as `u_Texture`
    pub input: BloomInput,
    /// Bound as `u_BloomTexture`
    pub combine: BloomInput,
    /// Texture written
    pub output: BloomTextureIndex,
    /// Mip written
    pub output_mip: u32,
    /// Mip the shader samples
    pub lod: u32,
}

/// Full schedule for a bloom texture with a given mip count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomPlan {
    mips: u32,
    steps: Vec<BloomStep>,
}

impl BloomPlan {
    /// Plan for textures with `mip_levels` levels.
    ///
    /// The two smallest mips are never processed. Returns `None` when fewer
    /// than two mips would remain.
    pub fn new(mip_levels: u32) -> Option<Self> {
        let mips = if mip_levels < 2 { 1 } else { mip_levels - 2 };
        if mips < 2 {
            return None;
        }

        let mut steps = Vec::with_capacity((3 * mips - 2) as usize);
        steps.push(BloomStep {
            mode: BloomMode::Prefilter,
            input: BloomInput::Source,
            combine: BloomInput::Source,
            output: 0,
            output_mip: 0,
            lod: 0,
        });

        for mip in 1..mips {
            steps.push(BloomStep {
                mode: BloomMode::Downsample,
                input: BloomInput::Bloom(0),
                combine: BloomInput::Source,
                output: 1,
                output_mip: mip,
                lod: mip - 1,
            });
            steps.push(BloomStep {
                mode: BloomMode::Downsample,
                input: BloomInput::Bloom(1),
                combine: BloomInput::Source,
                output: 0,
                output_mip: mip,
                lod: mip,
            });
        }

        steps.push(BloomStep {
            mode: BloomMode::FirstUpsample,
            input: BloomInput::Bloom(0),
            combine: BloomInput::Source,
            output: 2,
            output_mip: mips - 2,
            lod: mips - 2,
        });

        let mut previous = 2;
        for (i, mip) in (0..mips - 2).rev().enumerate() {
            let output = if i % 2 == 0 { 1 } else { 2 };
            steps.push(BloomStep {
                mode: BloomMode::Upsample,
                input: BloomInput::Bloom(0),
                combine: BloomInput::Bloom(previous),
                output,
                output_mip: mip,
                lod: mip,
            });
            previous = output;
        }

        Some(Self { mips, steps })
    }

    /// Mips processed
    pub fn mips(&self) -> u32 {
        self.mips
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[BloomStep] {
        &self.steps
    }

    /// One descriptor set per step
    pub fn descriptor_count(&self) -> usize {
        self.steps.len()
    }

    /// Texture holding the final bloom contribution
    pub fn final_output(&self) -> BloomTextureIndex {
        self.steps.last().map_or(0, |step| step.output)
    }
}

/// Threshold curve packed into `Params`
pub fn threshold_params(threshold: f32, knee: f32) -> Vec4 {
    let knee = knee.max(f32::EPSILON);
    Vec4::new(threshold, threshold - knee, knee * 2.0, 0.25 / knee)
}

/// Per-step values packed into `Params2`
pub fn step_params(step: &BloomStep, width: u32, height: u32) -> Vec4 {
    Vec4::new(step.lod as f32, step.mode.shader_value(), width as f32, height as f32)
}
