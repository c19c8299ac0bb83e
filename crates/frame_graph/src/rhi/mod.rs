//! Render hardware interface contract
//!
//! The render graph never talks to a graphics API directly. Everything it
//! needs from a backend is expressed by [`RenderDevice`]: texture and buffer
//! creation, descriptor sets addressed by uniform/texture names, a
//! description-keyed pipeline cache, and draw/dispatch recording into the
//! current frame's command buffer.

pub mod headless;
pub mod push_constants;

use crate::foundation::math::{Mat4, Vec2, Vec4};
use std::hash::{Hash, Hasher};

pub use push_constants::{PushConstantBlock, PushConstantError, PushConstantField, PushConstantLayout, PushFieldKind};

slotmap::new_key_type! {
    /// Handle to a device texture
    pub struct TextureHandle;
    /// Handle to a vertex or index buffer
    pub struct BufferHandle;
    /// Handle to a descriptor set
    pub struct DescriptorSetHandle;
    /// Handle to a cached pipeline state object
    pub struct PipelineHandle;
    /// Handle to a shader in the external shader library
    pub struct ShaderHandle;
}

/// Handle to mesh geometry owned by the asset system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Result type for device operations
pub type RhiResult<T> = Result<T, RhiError>;

/// Errors reported by a device
#[derive(Debug, thiserror::Error)]
pub enum RhiError {
    /// Texture handle does not name a live texture
    #[error("Invalid texture handle")]
    InvalidTexture,

    /// Buffer handle does not name a live buffer
    #[error("Invalid buffer handle")]
    InvalidBuffer,

    /// Descriptor set handle does not name a live set
    #[error("Invalid descriptor set handle")]
    InvalidDescriptorSet,

    /// Pipeline handle does not name a cached pipeline
    #[error("Invalid pipeline handle")]
    InvalidPipeline,

    /// Shader handle does not name a loaded shader
    #[error("Invalid shader handle")]
    InvalidShader,

    /// Mip level outside of the texture's chain
    #[error("Mip level {mip} out of range ({levels} levels)")]
    MipOutOfRange {
        /// Requested mip
        mip: u32,
        /// Levels in the texture
        levels: u32,
    },

    /// Backend specific failure
    #[error("Device error: {0}")]
    Device(String),
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Plain 2D colour texture
    Texture2D,
    /// Six-face cube map
    Cube,
    /// Depth texture
    Depth,
    /// Layered depth texture, one layer per shadow cascade
    DepthArray {
        /// Number of layers
        layers: u32,
    },
}

/// Texel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA
    Rgba8,
    /// 16-bit float RGBA
    Rgba16F,
    /// 32-bit float RGBA
    Rgba32F,
    /// 16-bit float RG
    Rg16F,
    /// Single channel 8-bit
    R8,
    /// 32-bit float depth
    Depth32F,
}

/// Texture wrap behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    /// Clamp coordinates to the edge texel
    ClampToEdge,
    /// Tile the texture
    Repeat,
}

/// Parameters for creating a texture
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    /// Debug name
    pub name: String,
    /// Kind of texture
    pub kind: TextureKind,
    /// Texel format
    pub format: TextureFormat,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Allocate a full mip chain
    pub generate_mips: bool,
    /// Texture may be bound as a compute storage image
    pub storage: bool,
    /// MSAA sample count
    pub samples: u8,
    /// Wrap mode
    pub wrap: TextureWrap,
}

impl TextureDesc {
    /// 2D colour texture with a single mip
    pub fn colour(name: &str, format: TextureFormat, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            kind: TextureKind::Texture2D,
            format,
            width,
            height,
            generate_mips: false,
            storage: false,
            samples: 1,
            wrap: TextureWrap::ClampToEdge,
        }
    }

    /// Depth texture
    pub fn depth(name: &str, width: u32, height: u32) -> Self {
        Self {
            kind: TextureKind::Depth,
            format: TextureFormat::Depth32F,
            ..Self::colour(name, TextureFormat::Depth32F, width, height)
        }
    }

    /// Layered depth texture for shadow cascades
    pub fn depth_array(name: &str, size: u32, layers: u32) -> Self {
        Self {
            kind: TextureKind::DepthArray { layers },
            ..Self::depth(name, size, size)
        }
    }

    /// Cube map
    pub fn cube(name: &str, format: TextureFormat, size: u32, generate_mips: bool) -> Self {
        Self {
            kind: TextureKind::Cube,
            generate_mips,
            ..Self::colour(name, format, size, size)
        }
    }

    /// Builder: allocate a mip chain
    pub fn with_mips(mut self) -> Self {
        self.generate_mips = true;
        self
    }

    /// Builder: allow storage image binding
    pub fn with_storage(mut self) -> Self {
        self.storage = true;
        self
    }

    /// Builder: set MSAA samples
    pub fn with_samples(mut self, samples: u8) -> Self {
        self.samples = samples.max(1);
        self
    }

    /// Builder: set wrap mode
    pub fn with_wrap(mut self, wrap: TextureWrap) -> Self {
        self.wrap = wrap;
        self
    }
}

/// Number of mips in a full chain for the given size
pub fn full_mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Buffer role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Per-vertex data
    Vertex,
    /// 32-bit indices
    Index,
}

/// Parameters for creating a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    /// Buffer role
    pub usage: BufferUsage,
    /// Size in bytes
    pub size: usize,
    /// Host visible for frequent updates
    pub dynamic: bool,
}

/// Parameters for creating a descriptor set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorDesc {
    /// Shader whose reflection defines the layout
    pub shader: ShaderHandle,
    /// Set index within the shader
    pub layout_index: u32,
}

impl DescriptorDesc {
    /// Shorthand constructor
    pub fn new(shader: ShaderHandle, layout_index: u32) -> Self {
        Self { shader, layout_index }
    }
}

/// Texture binding written into a descriptor set slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureBinding {
    /// Nothing bound; the backend binds its placeholder
    Empty,
    /// One sampled texture
    Single(TextureHandle),
    /// One mip of a sampled texture
    Mip {
        /// Texture
        texture: TextureHandle,
        /// Mip level
        mip: u32,
    },
    /// Storage image (compute output) at a mip
    Storage {
        /// Texture
        texture: TextureHandle,
        /// Mip level
        mip: u32,
    },
    /// Texture array slot
    Array(Vec<TextureHandle>),
}

/// Value written to a named uniform field
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// Scalar float
    Float(f32),
    /// Scalar integer
    Int(i32),
    /// Two-component vector
    Vec2(Vec2),
    /// Four-component vector
    Vec4(Vec4),
    /// 4x4 matrix
    Mat4(Mat4),
    /// Array of 4-component vectors
    Vec4Array(Vec<Vec4>),
    /// Array of 4x4 matrices
    Mat4Array(Vec<Mat4>),
    /// Raw bytes for struct arrays
    Bytes(Vec<u8>),
}

impl UniformValue {
    /// Scalar float accessor
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Cull nothing
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    #[default]
    Back,
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawType {
    /// Triangle list
    #[default]
    Triangle,
    /// Line list
    Lines,
    /// Point list
    Points,
}

/// Colour blend mode used when transparency is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// No blending
    #[default]
    None,
    /// Standard alpha blending
    SrcAlphaOneMinusSrcAlpha,
    /// Additive blending
    Additive,
}

/// Depth bias state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthBias {
    /// Constant factor
    pub constant: f32,
    /// Slope factor
    pub slope: f32,
}

impl Eq for DepthBias {}

impl Hash for DepthBias {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.constant.to_bits().hash(state);
        self.slope.to_bits().hash(state);
    }
}

/// Pipeline state description; the device caches one pipeline per distinct value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineDesc {
    /// Shader program
    pub shader: ShaderHandle,
    /// Face culling
    pub cull_mode: CullMode,
    /// Enable blending
    pub transparency_enabled: bool,
    /// Blend mode when transparent
    pub blend_mode: BlendMode,
    /// Primitive topology
    pub draw_type: DrawType,
    /// Colour attachments
    pub colour_targets: Vec<TextureHandle>,
    /// Mip written in the colour attachments
    pub mip_index: u32,
    /// Depth attachment
    pub depth_target: Option<TextureHandle>,
    /// Layered depth attachment, layer chosen at bind time
    pub depth_array_target: Option<TextureHandle>,
    /// Cube map attachment, face chosen by `cube_map_index`
    pub cube_map_target: Option<TextureHandle>,
    /// Cube face written
    pub cube_map_index: u32,
    /// MSAA resolve attachment
    pub resolve_target: Option<TextureHandle>,
    /// MSAA sample count
    pub samples: u8,
    /// Render into the swapchain image
    pub swapchain_target: bool,
    /// Clear attachments when the pipeline begins
    pub clear_targets: bool,
    /// Line width for line topology
    pub line_width: u8,
    /// Depth bias state
    pub depth_bias: Option<DepthBias>,
    /// Debug label
    pub debug_name: String,
}

impl PipelineDesc {
    /// Default state for a shader
    pub fn new(shader: ShaderHandle, debug_name: &str) -> Self {
        Self {
            shader,
            cull_mode: CullMode::Back,
            transparency_enabled: false,
            blend_mode: BlendMode::None,
            draw_type: DrawType::Triangle,
            colour_targets: Vec::new(),
            mip_index: 0,
            depth_target: None,
            depth_array_target: None,
            cube_map_target: None,
            cube_map_index: 0,
            resolve_target: None,
            samples: 1,
            swapchain_target: false,
            clear_targets: false,
            line_width: 1,
            depth_bias: None,
            debug_name: debug_name.to_string(),
        }
    }

    /// Builder: add a colour attachment
    pub fn with_colour_target(mut self, texture: TextureHandle) -> Self {
        self.colour_targets.push(texture);
        self
    }

    /// Builder: set the depth attachment
    pub fn with_depth_target(mut self, texture: Option<TextureHandle>) -> Self {
        self.depth_target = texture;
        self
    }

    /// Builder: enable alpha blending
    pub fn with_alpha_blend(mut self) -> Self {
        self.transparency_enabled = true;
        self.blend_mode = BlendMode::SrcAlphaOneMinusSrcAlpha;
        self
    }

    /// Builder: set cull mode
    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    /// Builder: set topology
    pub fn with_draw_type(mut self, draw_type: DrawType) -> Self {
        self.draw_type = draw_type;
        self
    }

    /// Builder: MSAA samples and resolve target
    pub fn with_samples(mut self, samples: u8, resolve_target: Option<TextureHandle>) -> Self {
        self.samples = samples.max(1);
        self.resolve_target = if self.samples > 1 { resolve_target } else { None };
        self
    }
}

/// Reflected shader information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    /// Push constant block layout, if the shader declares one
    pub push_constants: Option<PushConstantLayout>,
    /// Compute shader
    pub compute: bool,
}

/// Feature flags reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Compute shaders and storage images are available
    pub support_compute: bool,
    /// Swapchain images in flight
    pub frames_in_flight: usize,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            support_compute: true,
            frames_in_flight: 3,
        }
    }
}

/// The backend contract consumed by the render graph.
///
/// Methods that record commands act on the current frame's primary command
/// buffer. Frame synchronisation is the backend's business.
pub trait RenderDevice {
    /// Feature flags
    fn capabilities(&self) -> DeviceCapabilities;

    /// Swapchain image index for the frame being recorded
    fn current_frame_index(&self) -> usize;

    /// Swapchain extent
    fn swapchain_extent(&self) -> (u32, u32);

    // === Textures ===

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDesc) -> RhiResult<TextureHandle>;

    /// Upload texel data to mip 0
    fn upload_texture(&mut self, texture: TextureHandle, data: &[u8]) -> RhiResult<()>;

    /// Resize a texture, keeping its description
    fn resize_texture(&mut self, texture: TextureHandle, width: u32, height: u32) -> RhiResult<()>;

    /// Release a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Size of a mip level
    fn texture_size(&self, texture: TextureHandle, mip: u32) -> RhiResult<(u32, u32)>;

    /// Number of mip levels
    fn texture_mip_levels(&self, texture: TextureHandle) -> RhiResult<u32>;

    /// Fill the mip chain from mip 0
    fn generate_mips(&mut self, texture: TextureHandle) -> RhiResult<()>;

    /// Clear a render target
    fn clear_render_target(&mut self, texture: TextureHandle, colour: Vec4) -> RhiResult<()>;

    // === Buffers ===

    /// Create a buffer
    fn create_buffer(&mut self, desc: &BufferDesc) -> RhiResult<BufferHandle>;

    /// Release a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Write bytes starting at offset zero
    fn set_buffer_data(&mut self, buffer: BufferHandle, data: &[u8]) -> RhiResult<()>;

    /// Set the number of indices an index buffer draws
    fn set_index_count(&mut self, buffer: BufferHandle, count: u32) -> RhiResult<()>;

    /// Bind a vertex buffer
    fn bind_vertex_buffer(&mut self, buffer: BufferHandle) -> RhiResult<()>;

    /// Bind an index buffer
    fn bind_index_buffer(&mut self, buffer: BufferHandle) -> RhiResult<()>;

    // === Shaders ===

    /// Look a shader up by library name
    fn shader(&self, name: &str) -> Option<ShaderHandle>;

    /// Whether a shader compiled successfully
    fn is_compiled(&self, shader: ShaderHandle) -> bool;

    /// Reflection data for a shader
    fn reflect(&self, shader: ShaderHandle) -> RhiResult<ShaderReflection>;

    // === Descriptor sets ===

    /// Create a descriptor set
    fn create_descriptor_set(&mut self, desc: &DescriptorDesc) -> RhiResult<DescriptorSetHandle>;

    /// Release a descriptor set
    fn destroy_descriptor_set(&mut self, set: DescriptorSetHandle);

    /// Write a named uniform field
    fn set_uniform(&mut self, set: DescriptorSetHandle, block: &str, field: &str, value: UniformValue) -> RhiResult<()>;

    /// Write a named texture slot
    fn set_texture(&mut self, set: DescriptorSetHandle, name: &str, binding: TextureBinding) -> RhiResult<()>;

    /// Flush pending writes
    fn update_descriptor_set(&mut self, set: DescriptorSetHandle) -> RhiResult<()>;

    /// Transition images written by compute so later passes can sample them
    fn transition_images(&mut self, set: DescriptorSetHandle) -> RhiResult<()>;

    // === Pipelines and recording ===

    /// Fetch or create the pipeline for a description
    fn get_pipeline(&mut self, desc: &PipelineDesc) -> RhiResult<PipelineHandle>;

    /// Begin a pipeline, optionally targeting one layer of a layered attachment
    fn bind_pipeline(&mut self, pipeline: PipelineHandle, layer: Option<u32>) -> RhiResult<()>;

    /// End the pipeline's render pass
    fn end_pipeline(&mut self, pipeline: PipelineHandle) -> RhiResult<()>;

    /// Bind descriptor sets starting at set 0
    fn bind_descriptor_sets(&mut self, pipeline: PipelineHandle, sets: &[DescriptorSetHandle]) -> RhiResult<()>;

    /// Write the pipeline's push constant block
    fn push_constants(&mut self, pipeline: PipelineHandle, data: &[u8]) -> RhiResult<()>;

    /// Non-indexed draw
    fn draw(&mut self, vertex_count: u32) -> RhiResult<()>;

    /// Indexed draw with the bound buffers
    fn draw_indexed(&mut self, index_count: u32) -> RhiResult<()>;

    /// Draw an asset-owned mesh
    fn draw_mesh(&mut self, mesh: MeshHandle) -> RhiResult<()>;

    /// Compute dispatch
    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> RhiResult<()>;
}
