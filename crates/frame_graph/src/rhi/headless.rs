//! Headless device
//!
//! A [`RenderDevice`] with no GPU behind it. Resources live in slot maps and
//! every recorded command is appended to a log, so pass scheduling can be
//! inspected and tested on machines without a graphics driver.

use super::{
    full_mip_count, BufferDesc, BufferHandle, DescriptorDesc, DescriptorSetHandle, DeviceCapabilities,
    MeshHandle, PipelineDesc, PipelineHandle, PushConstantLayout, PushFieldKind, RenderDevice, RhiError,
    RhiResult, ShaderHandle, ShaderReflection, TextureBinding, TextureDesc, TextureHandle, UniformValue,
};
use crate::foundation::math::Vec4;
use crate::passes::shader_names;
use slotmap::SlotMap;
use std::collections::HashMap;

/// A command captured by the headless device
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// Render target cleared
    Clear {
        /// Cleared texture
        texture: TextureHandle,
    },
    /// Pipeline begun
    BindPipeline {
        /// Pipeline
        pipeline: PipelineHandle,
        /// Pipeline debug name
        name: String,
        /// Layer of a layered attachment
        layer: Option<u32>,
    },
    /// Pipeline ended
    EndPipeline {
        /// Pipeline
        pipeline: PipelineHandle,
    },
    /// Descriptor sets bound
    BindDescriptorSets {
        /// Pipeline
        pipeline: PipelineHandle,
        /// Sets in binding order
        sets: Vec<DescriptorSetHandle>,
    },
    /// Push constants written
    PushConstants {
        /// Pipeline
        pipeline: PipelineHandle,
        /// Block bytes
        data: Vec<u8>,
    },
    /// Vertex buffer bound
    BindVertexBuffer(BufferHandle),
    /// Index buffer bound
    BindIndexBuffer(BufferHandle),
    /// Buffer contents uploaded
    UploadBuffer {
        /// Buffer
        buffer: BufferHandle,
        /// Bytes written
        bytes: usize,
    },
    /// Texture slot written
    SetTexture {
        /// Descriptor set
        set: DescriptorSetHandle,
        /// Slot name
        name: String,
        /// Binding
        binding: TextureBinding,
    },
    /// Non-indexed draw
    Draw {
        /// Vertices
        vertex_count: u32,
    },
    /// Indexed draw
    DrawIndexed {
        /// Indices
        index_count: u32,
    },
    /// Mesh draw
    DrawMesh {
        /// Mesh
        mesh: MeshHandle,
    },
    /// Compute dispatch
    Dispatch {
        /// Groups in x
        x: u32,
        /// Groups in y
        y: u32,
        /// Groups in z
        z: u32,
    },
    /// Mip chain generated
    GenerateMips {
        /// Texture
        texture: TextureHandle,
    },
    /// Compute image layout transition
    TransitionImages {
        /// Descriptor set
        set: DescriptorSetHandle,
    },
}

impl RecordedCommand {
    /// Whether this command issues GPU work
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::Draw { .. } | Self::DrawIndexed { .. } | Self::DrawMesh { .. } | Self::Dispatch { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct TextureRecord {
    desc: TextureDesc,
    width: u32,
    height: u32,
    mip_levels: u32,
    data: Vec<u8>,
}

#[derive(Debug, Clone)]
struct BufferRecord {
    desc: BufferDesc,
    data: Vec<u8>,
    index_count: u32,
}

#[derive(Debug, Clone)]
struct ShaderRecord {
    name: String,
    compiled: bool,
    reflection: ShaderReflection,
}

#[derive(Debug, Clone)]
struct DescriptorSetRecord {
    desc: DescriptorDesc,
    uniforms: HashMap<(String, String), UniformValue>,
    textures: HashMap<String, TextureBinding>,
}

/// Recording device without a GPU
#[derive(Debug)]
pub struct HeadlessDevice {
    capabilities: DeviceCapabilities,
    frame_index: usize,
    extent: (u32, u32),
    textures: SlotMap<TextureHandle, TextureRecord>,
    buffers: SlotMap<BufferHandle, BufferRecord>,
    shaders: SlotMap<ShaderHandle, ShaderRecord>,
    shader_names: HashMap<String, ShaderHandle>,
    descriptor_sets: SlotMap<DescriptorSetHandle, DescriptorSetRecord>,
    descriptor_sets_created: usize,
    pipelines: SlotMap<PipelineHandle, PipelineDesc>,
    pipeline_cache: HashMap<PipelineDesc, PipelineHandle>,
    commands: Vec<RecordedCommand>,
}

impl HeadlessDevice {
    /// Empty device with no shaders loaded
    pub fn new(capabilities: DeviceCapabilities, width: u32, height: u32) -> Self {
        Self {
            capabilities,
            frame_index: 0,
            extent: (width, height),
            textures: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            shader_names: HashMap::new(),
            descriptor_sets: SlotMap::with_key(),
            descriptor_sets_created: 0,
            pipelines: SlotMap::with_key(),
            pipeline_cache: HashMap::new(),
            commands: Vec::new(),
        }
    }

    /// Device with every shader the render graph uses, all compiled
    pub fn with_standard_shaders(capabilities: DeviceCapabilities, width: u32, height: u32) -> Self {
        let mut device = Self::new(capabilities, width, height);

        let transform = PushConstantLayout::packed(&[("transform", PushFieldKind::Mat4)]);
        let shadow = PushConstantLayout::new(0)
            .with_field("transform", 0, PushFieldKind::Mat4)
            .with_field("layer", 64, PushFieldKind::UInt);
        let cube_face = PushConstantLayout::packed(&[("cubeFaceIndex", PushFieldKind::Int)]);
        let grain = PushConstantLayout::packed(&[("Time", PushFieldKind::Float), ("Intensity", PushFieldKind::Float)]);

        for name in [shader_names::FORWARD_PBR, shader_names::DEPTH_PRE_PASS, shader_names::DEPTH_PRE_PASS_ALPHA] {
            device.register_shader(name, Some(transform.clone()), false);
        }
        for name in [shader_names::SHADOW, shader_names::SHADOW_ALPHA] {
            device.register_shader(name, Some(shadow.clone()), false);
        }
        for name in [shader_names::CREATE_ENVIRONMENT_MAP, shader_names::ENVIRONMENT_IRRADIANCE] {
            device.register_shader(name, Some(cube_face.clone()), false);
        }
        let mip_filter = PushConstantLayout::packed(&[("Roughness", PushFieldKind::Float), ("cubeFaceIndex", PushFieldKind::Int)]);
        device.register_shader(shader_names::ENVIRONMENT_MIP_FILTER, Some(mip_filter), false);
        let bloom = PushConstantLayout::packed(&[("Params", PushFieldKind::Vec4), ("Params2", PushFieldKind::Vec4)]);
        device.register_shader(shader_names::BLOOM, Some(bloom.clone()), false);
        device.register_shader(shader_names::BLOOM_COMPUTE, Some(bloom), true);
        device.register_shader(shader_names::FILMIC_GRAIN, Some(grain), false);
        device.register_shader(shader_names::FXAA_COMPUTE, None, true);
        for name in [
            shader_names::BRDF_LUT,
            shader_names::SKYBOX,
            shader_names::SSAO,
            shader_names::SSAO_BLUR,
            shader_names::BATCH_2D,
            shader_names::BATCH_2D_LINE,
            shader_names::BATCH_2D_POINT,
            shader_names::TEXT,
            shader_names::TONE_MAPPING,
            shader_names::DEPTH_OF_FIELD,
            shader_names::SHARPEN,
            shader_names::FXAA,
            shader_names::DEBANDING,
            shader_names::CHROMATIC_ABERRATION,
            shader_names::FINAL_PASS,
        ] {
            device.register_shader(name, None, false);
        }
        device
    }

    /// Add a shader to the library
    pub fn register_shader(&mut self, name: &str, push_constants: Option<PushConstantLayout>, compute: bool) -> ShaderHandle {
        let handle = self.shaders.insert(ShaderRecord {
            name: name.to_string(),
            compiled: true,
            reflection: ShaderReflection { push_constants, compute },
        });
        self.shader_names.insert(name.to_string(), handle);
        handle
    }

    /// Mark a shader as failed to compile
    pub fn set_compiled(&mut self, name: &str, compiled: bool) {
        if let Some(record) = self.shader_names.get(name).and_then(|h| self.shaders.get_mut(*h)) {
            record.compiled = compiled;
        }
    }

    /// Remove a shader from the library
    pub fn remove_shader(&mut self, name: &str) {
        if let Some(handle) = self.shader_names.remove(name) {
            self.shaders.remove(handle);
        }
    }

    /// Override the device capabilities
    pub fn set_capabilities(&mut self, capabilities: DeviceCapabilities) {
        self.capabilities = capabilities;
    }

    /// Advance to the next swapchain image
    pub fn next_frame(&mut self) {
        self.frame_index = (self.frame_index + 1) % self.capabilities.frames_in_flight.max(1);
    }

    /// Recorded commands since the last clear
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Drop the recorded command log
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of recorded draws and dispatches
    pub fn draw_call_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    /// Debug names of pipelines in bind order
    pub fn bound_pipeline_names(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::BindPipeline { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Description of a cached pipeline
    pub fn pipeline_desc(&self, pipeline: PipelineHandle) -> Option<&PipelineDesc> {
        self.pipelines.get(pipeline)
    }

    /// Last value written to a uniform field
    pub fn uniform(&self, set: DescriptorSetHandle, block: &str, field: &str) -> Option<&UniformValue> {
        self.descriptor_sets
            .get(set)
            .and_then(|record| record.uniforms.get(&(block.to_string(), field.to_string())))
    }

    /// Current binding of a texture slot
    pub fn texture_binding(&self, set: DescriptorSetHandle, name: &str) -> Option<&TextureBinding> {
        self.descriptor_sets.get(set).and_then(|record| record.textures.get(name))
    }

    /// Descriptor sets created over the device's lifetime
    pub fn descriptor_sets_created(&self) -> usize {
        self.descriptor_sets_created
    }

    /// Live descriptor sets
    pub fn live_descriptor_sets(&self) -> usize {
        self.descriptor_sets.len()
    }

    /// Live buffers
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Contents of a buffer
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(buffer).map(|record| record.data.as_slice())
    }

    /// Description of a live texture
    pub fn texture_desc(&self, texture: TextureHandle) -> Option<&TextureDesc> {
        self.textures.get(texture).map(|record| &record.desc)
    }

    /// Texel data last uploaded to a texture
    pub fn texture_data(&self, texture: TextureHandle) -> Option<&[u8]> {
        self.textures.get(texture).map(|record| record.data.as_slice())
    }

    /// Layout a descriptor set was created with
    pub fn descriptor_desc(&self, set: DescriptorSetHandle) -> Option<&DescriptorDesc> {
        self.descriptor_sets.get(set).map(|record| &record.desc)
    }

    /// Library name of a shader
    pub fn shader_name(&self, shader: ShaderHandle) -> Option<&str> {
        self.shaders.get(shader).map(|record| record.name.as_str())
    }

    /// Whether a texture is alive
    pub fn texture_exists(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(texture)
    }

    fn texture(&self, texture: TextureHandle) -> RhiResult<&TextureRecord> {
        self.textures.get(texture).ok_or(RhiError::InvalidTexture)
    }

    fn set_mut(&mut self, set: DescriptorSetHandle) -> RhiResult<&mut DescriptorSetRecord> {
        self.descriptor_sets.get_mut(set).ok_or(RhiError::InvalidDescriptorSet)
    }

    fn check_pipeline(&self, pipeline: PipelineHandle) -> RhiResult<()> {
        if self.pipelines.contains_key(pipeline) {
            Ok(())
        } else {
            Err(RhiError::InvalidPipeline)
        }
    }
}

impl RenderDevice for HeadlessDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn current_frame_index(&self) -> usize {
        self.frame_index
    }

    fn swapchain_extent(&self) -> (u32, u32) {
        self.extent
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> RhiResult<TextureHandle> {
        let mip_levels = if desc.generate_mips { full_mip_count(desc.width, desc.height) } else { 1 };
        Ok(self.textures.insert(TextureRecord {
            desc: desc.clone(),
            width: desc.width,
            height: desc.height,
            mip_levels,
            data: Vec::new(),
        }))
    }

    fn upload_texture(&mut self, texture: TextureHandle, data: &[u8]) -> RhiResult<()> {
        let record = self.textures.get_mut(texture).ok_or(RhiError::InvalidTexture)?;
        record.data = data.to_vec();
        Ok(())
    }

    fn resize_texture(&mut self, texture: TextureHandle, width: u32, height: u32) -> RhiResult<()> {
        let record = self.textures.get_mut(texture).ok_or(RhiError::InvalidTexture)?;
        record.width = width;
        record.height = height;
        record.mip_levels = if record.desc.generate_mips { full_mip_count(width, height) } else { 1 };
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(texture);
    }

    fn texture_size(&self, texture: TextureHandle, mip: u32) -> RhiResult<(u32, u32)> {
        let record = self.texture(texture)?;
        if mip >= record.mip_levels {
            return Err(RhiError::MipOutOfRange { mip, levels: record.mip_levels });
        }
        Ok(((record.width >> mip).max(1), (record.height >> mip).max(1)))
    }

    fn texture_mip_levels(&self, texture: TextureHandle) -> RhiResult<u32> {
        Ok(self.texture(texture)?.mip_levels)
    }

    fn generate_mips(&mut self, texture: TextureHandle) -> RhiResult<()> {
        self.texture(texture)?;
        self.commands.push(RecordedCommand::GenerateMips { texture });
        Ok(())
    }

    fn clear_render_target(&mut self, texture: TextureHandle, _colour: Vec4) -> RhiResult<()> {
        self.texture(texture)?;
        self.commands.push(RecordedCommand::Clear { texture });
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> RhiResult<BufferHandle> {
        Ok(self.buffers.insert(BufferRecord {
            desc: desc.clone(),
            data: Vec::new(),
            index_count: 0,
        }))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(buffer);
    }

    fn set_buffer_data(&mut self, buffer: BufferHandle, data: &[u8]) -> RhiResult<()> {
        let record = self.buffers.get_mut(buffer).ok_or(RhiError::InvalidBuffer)?;
        if data.len() > record.desc.size {
            return Err(RhiError::Device(format!(
                "upload of {} bytes exceeds buffer size {}",
                data.len(),
                record.desc.size
            )));
        }
        record.data = data.to_vec();
        self.commands.push(RecordedCommand::UploadBuffer { buffer, bytes: data.len() });
        Ok(())
    }

    fn set_index_count(&mut self, buffer: BufferHandle, count: u32) -> RhiResult<()> {
        let record = self.buffers.get_mut(buffer).ok_or(RhiError::InvalidBuffer)?;
        record.index_count = count;
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle) -> RhiResult<()> {
        if !self.buffers.contains_key(buffer) {
            return Err(RhiError::InvalidBuffer);
        }
        self.commands.push(RecordedCommand::BindVertexBuffer(buffer));
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle) -> RhiResult<()> {
        if !self.buffers.contains_key(buffer) {
            return Err(RhiError::InvalidBuffer);
        }
        self.commands.push(RecordedCommand::BindIndexBuffer(buffer));
        Ok(())
    }

    fn shader(&self, name: &str) -> Option<ShaderHandle> {
        self.shader_names.get(name).copied()
    }

    fn is_compiled(&self, shader: ShaderHandle) -> bool {
        self.shaders.get(shader).is_some_and(|record| record.compiled)
    }

    fn reflect(&self, shader: ShaderHandle) -> RhiResult<ShaderReflection> {
        self.shaders
            .get(shader)
            .map(|record| record.reflection.clone())
            .ok_or(RhiError::InvalidShader)
    }

    fn create_descriptor_set(&mut self, desc: &DescriptorDesc) -> RhiResult<DescriptorSetHandle> {
        if !self.shaders.contains_key(desc.shader) {
            return Err(RhiError::InvalidShader);
        }
        self.descriptor_sets_created += 1;
        Ok(self.descriptor_sets.insert(DescriptorSetRecord {
            desc: desc.clone(),
            uniforms: HashMap::new(),
            textures: HashMap::new(),
        }))
    }

    fn destroy_descriptor_set(&mut self, set: DescriptorSetHandle) {
        self.descriptor_sets.remove(set);
    }

    fn set_uniform(&mut self, set: DescriptorSetHandle, block: &str, field: &str, value: UniformValue) -> RhiResult<()> {
        self.set_mut(set)?
            .uniforms
            .insert((block.to_string(), field.to_string()), value);
        Ok(())
    }

    fn set_texture(&mut self, set: DescriptorSetHandle, name: &str, binding: TextureBinding) -> RhiResult<()> {
        self.set_mut(set)?.textures.insert(name.to_string(), binding.clone());
        self.commands.push(RecordedCommand::SetTexture { set, name: name.to_string(), binding });
        Ok(())
    }

    fn update_descriptor_set(&mut self, set: DescriptorSetHandle) -> RhiResult<()> {
        self.set_mut(set).map(|_| ())
    }

    fn transition_images(&mut self, set: DescriptorSetHandle) -> RhiResult<()> {
        self.set_mut(set)?;
        self.commands.push(RecordedCommand::TransitionImages { set });
        Ok(())
    }

    fn get_pipeline(&mut self, desc: &PipelineDesc) -> RhiResult<PipelineHandle> {
        if let Some(pipeline) = self.pipeline_cache.get(desc) {
            return Ok(*pipeline);
        }
        if !self.shaders.contains_key(desc.shader) {
            return Err(RhiError::InvalidShader);
        }
        let pipeline = self.pipelines.insert(desc.clone());
        self.pipeline_cache.insert(desc.clone(), pipeline);
        Ok(pipeline)
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle, layer: Option<u32>) -> RhiResult<()> {
        let name = self
            .pipelines
            .get(pipeline)
            .map(|desc| desc.debug_name.clone())
            .ok_or(RhiError::InvalidPipeline)?;
        self.commands.push(RecordedCommand::BindPipeline { pipeline, name, layer });
        Ok(())
    }

    fn end_pipeline(&mut self, pipeline: PipelineHandle) -> RhiResult<()> {
        self.check_pipeline(pipeline)?;
        self.commands.push(RecordedCommand::EndPipeline { pipeline });
        Ok(())
    }

    fn bind_descriptor_sets(&mut self, pipeline: PipelineHandle, sets: &[DescriptorSetHandle]) -> RhiResult<()> {
        self.check_pipeline(pipeline)?;
        if sets.iter().any(|set| !self.descriptor_sets.contains_key(*set)) {
            return Err(RhiError::InvalidDescriptorSet);
        }
        self.commands.push(RecordedCommand::BindDescriptorSets { pipeline, sets: sets.to_vec() });
        Ok(())
    }

    fn push_constants(&mut self, pipeline: PipelineHandle, data: &[u8]) -> RhiResult<()> {
        self.check_pipeline(pipeline)?;
        self.commands.push(RecordedCommand::PushConstants { pipeline, data: data.to_vec() });
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32) -> RhiResult<()> {
        self.commands.push(RecordedCommand::Draw { vertex_count });
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32) -> RhiResult<()> {
        self.commands.push(RecordedCommand::DrawIndexed { index_count });
        Ok(())
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) -> RhiResult<()> {
        self.commands.push(RecordedCommand::DrawMesh { mesh });
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> RhiResult<()> {
        self.commands.push(RecordedCommand::Dispatch { x, y, z });
        Ok(())
    }
}
