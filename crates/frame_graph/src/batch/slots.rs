//! Texture slot table for one batch

use crate::rhi::{TextureBinding, TextureHandle};

/// Outcome of looking a texture up in the slot table
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotLookup {
    /// Texture already bound at this shader slot
    Found(f32),
    /// Texture appended at this shader slot
    Inserted(f32),
    /// No free slot; the batch must be flushed first
    Full,
}

/// Bounded, deduplicated list of textures bound by one batch.
///
/// Shader slot 0 means "no texture", so the texture at index `i` is
/// addressed as slot `i + 1`.
#[derive(Debug, Clone)]
pub struct TextureSlots {
    textures: Vec<TextureHandle>,
    capacity: usize,
}

impl TextureSlots {
    /// Empty table with room for `capacity` textures
    pub fn new(capacity: usize) -> Self {
        Self { textures: Vec::with_capacity(capacity), capacity: capacity.max(1) }
    }

    /// Slot of an already bound texture
    pub fn find(&self, texture: TextureHandle) -> Option<f32> {
        self.textures
            .iter()
            .position(|bound| *bound == texture)
            .map(|i| (i + 1) as f32)
    }

    /// Find the texture or append it if there is room
    pub fn lookup_or_insert(&mut self, texture: TextureHandle) -> SlotLookup {
        if let Some(slot) = self.find(texture) {
            return SlotLookup::Found(slot);
        }
        if self.is_full() {
            return SlotLookup::Full;
        }
        self.textures.push(texture);
        SlotLookup::Inserted(self.textures.len() as f32)
    }

    /// Descriptor binding for the bound textures.
    ///
    /// One texture binds directly; several bind as an array padded to
    /// capacity with `default_texture`; none binds nothing.
    pub fn binding(&self, default_texture: TextureHandle) -> TextureBinding {
        match self.textures.as_slice() {
            [] => TextureBinding::Empty,
            [single] => TextureBinding::Single(*single),
            textures => {
                let mut array = textures.to_vec();
                array.resize(self.capacity, default_texture);
                TextureBinding::Array(array)
            }
        }
    }

    /// Bound textures in slot order
    pub fn textures(&self) -> &[TextureHandle] {
        &self.textures
    }

    /// Number of bound textures
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Whether no texture is bound
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Whether every slot is taken
    pub fn is_full(&self) -> bool {
        self.textures.len() >= self.capacity
    }

    /// Maximum textures per batch
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Unbind everything
    pub fn clear(&mut self) {
        self.textures.clear();
    }
}
