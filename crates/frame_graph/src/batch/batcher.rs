//! Primitive batcher
//!
//! One [`PrimitiveBatcher`] serves one kind of batched geometry (sprites,
//! glyphs, debug lines, debug points, debug triangles). A pass drives it as:
//!
//! 1. [`PrimitiveBatcher::begin_pass`] with the bound pipeline and scene set
//! 2. per primitive: [`PrimitiveBatcher::reserve`], optionally
//!    [`PrimitiveBatcher::submit_texture`], then [`PrimitiveBatcher::push`]
//! 3. [`PrimitiveBatcher::end_pass`] to flush the remainder

use super::pool::FrameResourcePool;
use super::slots::{SlotLookup, TextureSlots};
use crate::error::{FrameGraphError, FrameGraphResult};
use crate::rhi::{
    BufferDesc, BufferHandle, BufferUsage, DescriptorDesc, DescriptorSetHandle, PipelineHandle, RenderDevice,
    ShaderHandle, TextureHandle,
};
use log::{trace, warn};

/// How indices are generated for the shared index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPattern {
    /// Two triangles per four vertices
    Quads,
    /// One index per vertex
    Sequential,
}

/// Primitive topology served by a batcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchShape {
    /// Vertices written per primitive
    pub vertices_per_primitive: usize,
    /// Indices drawn per primitive
    pub indices_per_primitive: usize,
    /// Index generation
    pub pattern: IndexPattern,
}

impl BatchShape {
    /// Textured quads
    pub const QUADS: Self = Self { vertices_per_primitive: 4, indices_per_primitive: 6, pattern: IndexPattern::Quads };
    /// Line segments
    pub const LINES: Self = Self { vertices_per_primitive: 2, indices_per_primitive: 2, pattern: IndexPattern::Sequential };
    /// Triangles
    pub const TRIANGLES: Self = Self { vertices_per_primitive: 3, indices_per_primitive: 3, pattern: IndexPattern::Sequential };
}

/// Pipeline state a batch draws with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPass {
    /// Bound pipeline
    pub pipeline: PipelineHandle,
    /// Camera set (set 0)
    pub scene_set: DescriptorSetHandle,
    /// Shader whose set 1 receives the batch textures; `None` for untextured batches
    pub texture_shader: Option<ShaderHandle>,
    /// Texture used to pad texture arrays
    pub default_texture: TextureHandle,
}

#[derive(Debug, Clone, Copy)]
struct BatchTextureSet {
    set: DescriptorSetHandle,
    texture_count: usize,
}

/// Batches primitives of vertex type `V` into indexed draw calls
#[derive(Debug)]
pub struct PrimitiveBatcher<V: bytemuck::Pod> {
    name: &'static str,
    shape: BatchShape,
    max_primitives: usize,
    max_batch_draw_calls: usize,
    vertex_buffers: FrameResourcePool<BufferHandle>,
    staging: Vec<Vec<V>>,
    index_buffer: Option<BufferHandle>,
    slots: TextureSlots,
    texture_sets: Vec<Option<BatchTextureSet>>,
    frame: usize,
    batch_index: usize,
    index_count: usize,
    draw_calls: u32,
    pass: Option<BatchPass>,
    overflow_reported: bool,
}

impl<V: bytemuck::Pod> PrimitiveBatcher<V> {
    /// Create a batcher; nothing is allocated on the device until the first pass
    pub fn new(name: &'static str, shape: BatchShape, max_primitives: usize, max_textures: usize, max_batch_draw_calls: usize) -> Self {
        Self {
            name,
            shape,
            max_primitives: max_primitives.max(1),
            max_batch_draw_calls,
            vertex_buffers: FrameResourcePool::new(),
            staging: Vec::new(),
            index_buffer: None,
            slots: TextureSlots::new(max_textures),
            texture_sets: Vec::new(),
            frame: 0,
            batch_index: 0,
            index_count: 0,
            draw_calls: 0,
            pass: None,
            overflow_reported: false,
        }
    }

    /// Indices in a full batch
    pub fn indices_size(&self) -> usize {
        self.max_primitives * self.shape.indices_per_primitive
    }

    /// Bytes in a full batch's vertex buffer
    pub fn buffer_size(&self) -> usize {
        self.max_primitives * self.shape.vertices_per_primitive * std::mem::size_of::<V>()
    }

    /// Start of frame: rewind to the first batch buffer
    pub fn reset(&mut self) {
        self.batch_index = 0;
        self.index_count = 0;
        self.draw_calls = 0;
        self.slots.clear();
        self.pass = None;
    }

    /// Draw calls issued since the last reset
    pub fn draw_calls(&self) -> u32 {
        self.draw_calls
    }

    /// Current batch index
    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    /// Indices staged in the open batch
    pub fn index_count(&self) -> usize {
        self.index_count
    }

    /// Vertex buffers allocated across all frames
    pub fn allocated_buffers(&self) -> usize {
        self.vertex_buffers.total()
    }

    /// Texture slots of the open batch
    pub fn slots(&self) -> &TextureSlots {
        &self.slots
    }

    /// Bind the pass state and open a batch
    pub fn begin_pass(&mut self, device: &mut dyn RenderDevice, pass: BatchPass) -> FrameGraphResult<()> {
        self.ensure_index_buffer(device)?;
        self.frame = device.current_frame_index();
        self.pass = Some(pass);
        self.begin_batch(device)
    }

    /// Flush what is left and release the pass state
    pub fn end_pass(&mut self, device: &mut dyn RenderDevice) -> FrameGraphResult<()> {
        if self.index_count > 0 {
            self.flush(device)?;
        }
        self.pass = None;
        Ok(())
    }

    /// Make room for one more primitive, flushing if the batch is full
    pub fn reserve(&mut self, device: &mut dyn RenderDevice) -> FrameGraphResult<()> {
        if self.index_count >= self.indices_size() {
            self.flush(device)?;
            self.begin_batch(device)?;
        }
        Ok(())
    }

    /// Shader slot for a texture, flushing first if every slot is taken
    pub fn submit_texture(&mut self, device: &mut dyn RenderDevice, texture: TextureHandle) -> FrameGraphResult<f32> {
        match self.slots.lookup_or_insert(texture) {
            SlotLookup::Found(slot) | SlotLookup::Inserted(slot) => Ok(slot),
            SlotLookup::Full => {
                self.flush(device)?;
                self.begin_batch(device)?;
                match self.slots.lookup_or_insert(texture) {
                    SlotLookup::Found(slot) | SlotLookup::Inserted(slot) => Ok(slot),
                    SlotLookup::Full => Ok(0.0),
                }
            }
        }
    }

    /// Stage one primitive's vertices
    pub fn push(&mut self, vertices: &[V]) {
        debug_assert_eq!(vertices.len(), self.shape.vertices_per_primitive);
        if self.staging.len() <= self.frame {
            self.staging.resize_with(self.frame + 1, Vec::new);
        }
        self.staging[self.frame].extend_from_slice(vertices);
        self.index_count += self.shape.indices_per_primitive;
    }

    fn begin_batch(&mut self, device: &mut dyn RenderDevice) -> FrameGraphResult<()> {
        let size = self.buffer_size();
        self.vertex_buffers.get_or_try_insert_with(self.frame, self.batch_index, || {
            device.create_buffer(&BufferDesc { usage: BufferUsage::Vertex, size, dynamic: true })
        })?;
        if self.staging.len() <= self.frame {
            self.staging.resize_with(self.frame + 1, Vec::new);
        }
        self.staging[self.frame].clear();
        Ok(())
    }

    fn ensure_index_buffer(&mut self, device: &mut dyn RenderDevice) -> FrameGraphResult<()> {
        if self.index_buffer.is_some() {
            return Ok(());
        }
        let indices = generate_indices(self.shape, self.max_primitives);
        let buffer = device.create_buffer(&BufferDesc {
            usage: BufferUsage::Index,
            size: indices.len() * std::mem::size_of::<u32>(),
            dynamic: false,
        })?;
        device.set_buffer_data(buffer, bytemuck::cast_slice(&indices))?;
        device.set_index_count(buffer, indices.len() as u32)?;
        self.index_buffer = Some(buffer);
        Ok(())
    }

    /// Submit the open batch as one indexed draw
    pub fn flush(&mut self, device: &mut dyn RenderDevice) -> FrameGraphResult<()> {
        let Some(pass) = self.pass else {
            return Ok(());
        };
        if self.index_count == 0 {
            self.slots.clear();
            return Ok(());
        }

        let buffer = *self
            .vertex_buffers
            .get(self.frame, self.batch_index)
            .ok_or(FrameGraphError::MissingResource("batch vertex buffer"))?;
        let index_buffer = self.index_buffer.ok_or(FrameGraphError::MissingResource("batch index buffer"))?;

        let staged = self.staging.get(self.frame).map_or(&[][..], Vec::as_slice);
        device.set_buffer_data(buffer, bytemuck::cast_slice(staged))?;

        let mut sets = vec![pass.scene_set];
        if let Some(shader) = pass.texture_shader {
            sets.push(self.texture_set(device, shader, pass.default_texture)?);
        }

        device.bind_descriptor_sets(pass.pipeline, &sets)?;
        device.bind_vertex_buffer(buffer)?;
        device.bind_index_buffer(index_buffer)?;
        device.set_index_count(index_buffer, self.index_count as u32)?;
        device.draw_indexed(self.index_count as u32)?;
        trace!("{} batch {} flushed {} indices", self.name, self.batch_index, self.index_count);

        self.draw_calls += 1;
        self.batch_index += 1;
        self.index_count = 0;
        self.slots.clear();
        if let Some(staging) = self.staging.get_mut(self.frame) {
            staging.clear();
        }

        if self.batch_index >= self.max_batch_draw_calls && !self.overflow_reported {
            warn!("{} exceeded {} batch draw calls in one frame", self.name, self.max_batch_draw_calls);
            self.overflow_reported = true;
        }
        Ok(())
    }

    /// Texture set of the current batch. Sets are indexed by batch only, so
    /// the device is responsible for not rewriting a set still read by a
    /// frame in flight.
    fn texture_set(&mut self, device: &mut dyn RenderDevice, shader: ShaderHandle, default_texture: TextureHandle) -> FrameGraphResult<DescriptorSetHandle> {
        if self.texture_sets.len() <= self.batch_index {
            self.texture_sets.resize(self.batch_index + 1, None);
        }

        let texture_count = self.slots.len();
        let set = match self.texture_sets[self.batch_index] {
            Some(existing) if existing.texture_count == texture_count => existing.set,
            previous => {
                if let Some(old) = previous {
                    device.destroy_descriptor_set(old.set);
                }
                let set = device.create_descriptor_set(&DescriptorDesc::new(shader, 1))?;
                self.texture_sets[self.batch_index] = Some(BatchTextureSet { set, texture_count });
                set
            }
        };

        device.set_texture(set, "textures", self.slots.binding(default_texture))?;
        device.update_descriptor_set(set)?;
        Ok(set)
    }

    /// Release every device resource
    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        for set in self.texture_sets.drain(..).flatten() {
            device.destroy_descriptor_set(set.set);
        }
        for buffer in self.vertex_buffers.drain() {
            device.destroy_buffer(buffer);
        }
        if let Some(buffer) = self.index_buffer.take() {
            device.destroy_buffer(buffer);
        }
        self.staging.clear();
        self.reset();
    }
}

fn generate_indices(shape: BatchShape, max_primitives: usize) -> Vec<u32> {
    match shape.pattern {
        IndexPattern::Quads => (0..max_primitives as u32)
            .flat_map(|quad| {
                let base = quad * 4;
                [base, base + 1, base + 2, base + 2, base + 3, base]
            })
            .collect(),
        IndexPattern::Sequential => (0..(max_primitives * shape.indices_per_primitive) as u32).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::QuadVertex;
    use crate::passes::shader_names;
    use crate::rhi::headless::{HeadlessDevice, RecordedCommand};
    use crate::rhi::{DeviceCapabilities, PipelineDesc, TextureDesc, TextureFormat};

    struct Fixture {
        device: HeadlessDevice,
        pass: BatchPass,
        textures: Vec<TextureHandle>,
    }

    fn fixture(texture_count: usize) -> Fixture {
        let mut device = HeadlessDevice::with_standard_shaders(DeviceCapabilities::default(), 640, 480);
        let shader = device.shader(shader_names::BATCH_2D).unwrap();
        let pipeline = device.get_pipeline(&PipelineDesc::new(shader, "Batch2D")).unwrap();
        let scene_set = device.create_descriptor_set(&DescriptorDesc::new(shader, 0)).unwrap();
        let default_texture = device
            .create_texture(&TextureDesc::colour("default", TextureFormat::Rgba8, 1, 1))
            .unwrap();
        let textures = (0..texture_count)
            .map(|i| {
                device
                    .create_texture(&TextureDesc::colour(&format!("sprite{i}"), TextureFormat::Rgba8, 8, 8))
                    .unwrap()
            })
            .collect();
        Fixture {
            device,
            pass: BatchPass { pipeline, scene_set, texture_shader: Some(shader), default_texture },
            textures,
        }
    }

    fn quad(marker: f32) -> [QuadVertex; 4] {
        [QuadVertex { position: [marker, 0.0, 0.0], ..Default::default() }; 4]
    }

    fn draw_indexed_counts(device: &HeadlessDevice) -> Vec<u32> {
        device
            .commands()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::DrawIndexed { index_count } => Some(*index_count),
                _ => None,
            })
            .collect()
    }

    fn submit_quads(fx: &mut Fixture, batcher: &mut PrimitiveBatcher<QuadVertex>, count: usize) {
        batcher.begin_pass(&mut fx.device, fx.pass).unwrap();
        for i in 0..count {
            batcher.reserve(&mut fx.device).unwrap();
            batcher.push(&quad(i as f32));
        }
        batcher.end_pass(&mut fx.device).unwrap();
    }

    #[test]
    fn test_draw_calls_equal_ceil_of_quads_over_capacity() {
        for (count, expected) in [(1, 1), (10, 1), (11, 2), (25, 3), (30, 3)] {
            let mut fx = fixture(0);
            let mut batcher: PrimitiveBatcher<QuadVertex> = PrimitiveBatcher::new("Renderer2D", BatchShape::QUADS, 10, 16, 100);
            submit_quads(&mut fx, &mut batcher, count);
            assert_eq!(batcher.draw_calls(), expected, "{count} quads");
        }
    }

    #[test]
    fn test_uploads_preserve_submission_order() {
        let mut fx = fixture(0);
        let mut batcher: PrimitiveBatcher<QuadVertex> = PrimitiveBatcher::new("Renderer2D", BatchShape::QUADS, 4, 16, 100);
        submit_quads(&mut fx, &mut batcher, 10);

        let mut markers = Vec::new();
        for command in fx.device.commands() {
            if let RecordedCommand::UploadBuffer { buffer, .. } = command {
                let Some(bytes) = fx.device.buffer_data(*buffer) else { continue };
                if bytes.len() % std::mem::size_of::<QuadVertex>() != 0 || bytes.len() > 4 * 4 * 44 {
                    continue;
                }
                let vertices: Vec<QuadVertex> = bytes
                    .chunks_exact(std::mem::size_of::<QuadVertex>())
                    .map(bytemuck::pod_read_unaligned)
                    .collect();
                markers.extend(vertices.chunks(4).map(|q| q[0].position[0] as usize));
            }
        }
        assert_eq!(markers, (0..10).collect::<Vec<_>>());
        assert_eq!(draw_indexed_counts(&fx.device), vec![24, 24, 12]);
    }

    #[test]
    fn test_only_written_bytes_uploaded() {
        let mut fx = fixture(0);
        let mut batcher: PrimitiveBatcher<QuadVertex> = PrimitiveBatcher::new("Renderer2D", BatchShape::QUADS, 100, 16, 100);
        submit_quads(&mut fx, &mut batcher, 3);

        let vertex_uploads: Vec<usize> = fx
            .device
            .commands()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::UploadBuffer { bytes, .. } if *bytes == 3 * 4 * 44 => Some(*bytes),
                _ => None,
            })
            .collect();
        assert_eq!(vertex_uploads.len(), 1);
    }

    #[test]
    fn test_seventeenth_texture_forces_one_flush() {
        let mut fx = fixture(17);
        let mut batcher: PrimitiveBatcher<QuadVertex> = PrimitiveBatcher::new("Renderer2D", BatchShape::QUADS, 1666, 16, 100);
        batcher.begin_pass(&mut fx.device, fx.pass).unwrap();

        for (i, texture) in fx.textures.clone().into_iter().enumerate() {
            batcher.reserve(&mut fx.device).unwrap();
            let slot = batcher.submit_texture(&mut fx.device, texture).unwrap();
            if i < 16 {
                assert_eq!(slot, (i + 1) as f32);
                assert_eq!(batcher.draw_calls(), 0);
            } else {
                assert_eq!(slot, 1.0);
                assert_eq!(batcher.draw_calls(), 1);
            }
            batcher.push(&quad(i as f32));
        }
        batcher.end_pass(&mut fx.device).unwrap();

        assert_eq!(draw_indexed_counts(&fx.device), vec![16 * 6, 6]);
    }

    #[test]
    fn test_buffers_reused_across_frames() {
        let mut fx = fixture(0);
        let mut batcher: PrimitiveBatcher<QuadVertex> = PrimitiveBatcher::new("Renderer2D", BatchShape::QUADS, 2, 16, 100);

        for _ in 0..6 {
            batcher.reset();
            submit_quads(&mut fx, &mut batcher, 5);
            fx.device.next_frame();
        }
        // Three frames in flight, three batches each
        assert_eq!(batcher.allocated_buffers(), 9);
    }

    #[test]
    fn test_descriptor_set_recreated_only_when_texture_count_changes() {
        let mut fx = fixture(2);
        let mut batcher: PrimitiveBatcher<QuadVertex> = PrimitiveBatcher::new("Renderer2D", BatchShape::QUADS, 10, 16, 100);
        let before = fx.device.descriptor_sets_created();

        let mut frame = |fx: &mut Fixture, textures: &[TextureHandle]| {
            batcher.reset();
            batcher.begin_pass(&mut fx.device, fx.pass).unwrap();
            for texture in textures {
                batcher.reserve(&mut fx.device).unwrap();
                batcher.submit_texture(&mut fx.device, *texture).unwrap();
                batcher.push(&quad(0.0));
            }
            batcher.end_pass(&mut fx.device).unwrap();
        };

        let (a, b) = (fx.textures[0], fx.textures[1]);
        frame(&mut fx, &[a]);
        frame(&mut fx, &[b]);
        assert_eq!(fx.device.descriptor_sets_created() - before, 1);

        frame(&mut fx, &[a, b]);
        assert_eq!(fx.device.descriptor_sets_created() - before, 2);
    }

    #[test]
    fn test_destroy_releases_every_buffer() {
        let mut fx = fixture(1);
        let mut batcher: PrimitiveBatcher<QuadVertex> = PrimitiveBatcher::new("Renderer2D", BatchShape::QUADS, 4, 16, 100);
        let before = fx.device.live_buffers();

        batcher.begin_pass(&mut fx.device, fx.pass).unwrap();
        for i in 0..10 {
            batcher.reserve(&mut fx.device).unwrap();
            batcher.submit_texture(&mut fx.device, fx.textures[0]).unwrap();
            batcher.push(&quad(i as f32));
        }
        batcher.end_pass(&mut fx.device).unwrap();
        // Three vertex buffers plus the shared index buffer
        assert_eq!(fx.device.live_buffers() - before, 4);

        batcher.destroy(&mut fx.device);
        assert_eq!(fx.device.live_buffers(), before);
        assert_eq!(batcher.allocated_buffers(), 0);
    }

    #[test]
    fn test_quad_indices() {
        assert_eq!(generate_indices(BatchShape::QUADS, 2), vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
        assert_eq!(generate_indices(BatchShape::LINES, 2), vec![0, 1, 2, 3]);
    }
}
