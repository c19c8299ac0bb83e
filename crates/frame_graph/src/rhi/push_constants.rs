//! Typed push constant blocks
//!
//! A [`PushConstantLayout`] is taken from shader reflection and maps field
//! names to byte offsets. Pass code writes fields by name through
//! [`PushConstantBlock::set_field`], which checks the value's kind against
//! the reflected field instead of copying raw bytes at hand-computed offsets.

use crate::foundation::math::{Mat4, Vec2, Vec4};

/// Result type for push constant writes
pub type PushConstantResult<T> = Result<T, PushConstantError>;

/// Errors raised when writing a push constant block
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PushConstantError {
    /// The block has no field with this name
    #[error("Unknown push constant field '{0}'")]
    UnknownField(String),

    /// Value kind differs from the reflected field kind
    #[error("Push constant field '{field}' expects {expected:?}, got {actual:?}")]
    KindMismatch {
        /// Field name
        field: String,
        /// Reflected kind
        expected: PushFieldKind,
        /// Kind supplied by the caller
        actual: PushFieldKind,
    },

    /// Field extends past the end of the block
    #[error("Push constant field '{field}' at offset {offset} overruns a {size} byte block")]
    OutOfBounds {
        /// Field name
        field: String,
        /// Field offset
        offset: usize,
        /// Block size
        size: usize,
    },
}

/// Kind of a push constant field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushFieldKind {
    /// 32-bit float
    Float,
    /// 32-bit signed integer
    Int,
    /// 32-bit unsigned integer
    UInt,
    /// Two floats
    Vec2,
    /// Four floats
    Vec4,
    /// Sixteen floats, column-major
    Mat4,
}

impl PushFieldKind {
    /// Size of the field in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::UInt => 4,
            Self::Vec2 => 8,
            Self::Vec4 => 16,
            Self::Mat4 => 64,
        }
    }
}

/// One reflected field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConstantField {
    /// Field name as declared in the shader
    pub name: String,
    /// Byte offset in the block
    pub offset: usize,
    /// Field kind
    pub kind: PushFieldKind,
}

/// Reflected layout of a push constant block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushConstantLayout {
    fields: Vec<PushConstantField>,
    size: usize,
}

impl PushConstantLayout {
    /// Create a layout with an explicit block size
    pub fn new(size: usize) -> Self {
        Self { fields: Vec::new(), size }
    }

    /// Builder: declare a field at an explicit offset
    pub fn with_field(mut self, name: &str, offset: usize, kind: PushFieldKind) -> Self {
        self.fields.push(PushConstantField { name: name.to_string(), offset, kind });
        self.size = self.size.max(offset + kind.size());
        self
    }

    /// Layout with fields packed one after another in declaration order
    pub fn packed(fields: &[(&str, PushFieldKind)]) -> Self {
        fields.iter().fold(Self::new(0), |layout, (name, kind)| {
            let offset = layout.size;
            layout.with_field(name, offset, *kind)
        })
    }

    /// Find a field by name
    pub fn field(&self, name: &str) -> Option<&PushConstantField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Block size in bytes
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Values that can be written into a push constant field
pub trait PushValue {
    /// Kind this value writes
    const KIND: PushFieldKind;

    /// Append the value's bytes
    fn write_bytes(&self, out: &mut Vec<u8>);
}

impl PushValue for f32 {
    const KIND: PushFieldKind = PushFieldKind::Float;
    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(bytemuck::bytes_of(self));
    }
}

impl PushValue for i32 {
    const KIND: PushFieldKind = PushFieldKind::Int;
    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(bytemuck::bytes_of(self));
    }
}

impl PushValue for u32 {
    const KIND: PushFieldKind = PushFieldKind::UInt;
    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(bytemuck::bytes_of(self));
    }
}

impl PushValue for Vec2 {
    const KIND: PushFieldKind = PushFieldKind::Vec2;
    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(bytemuck::cast_slice(self.as_slice()));
    }
}

impl PushValue for Vec4 {
    const KIND: PushFieldKind = PushFieldKind::Vec4;
    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(bytemuck::cast_slice(self.as_slice()));
    }
}

impl PushValue for Mat4 {
    const KIND: PushFieldKind = PushFieldKind::Mat4;
    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(bytemuck::cast_slice(self.as_slice()));
    }
}

/// CPU copy of a push constant block
#[derive(Debug, Clone, PartialEq)]
pub struct PushConstantBlock {
    layout: PushConstantLayout,
    data: Vec<u8>,
}

impl PushConstantBlock {
    /// Zero-filled block for a layout
    pub fn new(layout: PushConstantLayout) -> Self {
        let data = vec![0; layout.size()];
        Self { layout, data }
    }

    /// Write a named field
    pub fn set_field<T: PushValue>(&mut self, name: &str, value: &T) -> PushConstantResult<()> {
        let field = self
            .layout
            .field(name)
            .ok_or_else(|| PushConstantError::UnknownField(name.to_string()))?;

        if field.kind != T::KIND {
            return Err(PushConstantError::KindMismatch {
                field: name.to_string(),
                expected: field.kind,
                actual: T::KIND,
            });
        }

        let end = field.offset + field.kind.size();
        if end > self.data.len() {
            return Err(PushConstantError::OutOfBounds {
                field: name.to_string(),
                offset: field.offset,
                size: self.data.len(),
            });
        }

        let mut bytes = Vec::with_capacity(field.kind.size());
        value.write_bytes(&mut bytes);
        self.data[field.offset..end].copy_from_slice(&bytes);
        Ok(())
    }

    /// Whether the layout declares a field
    pub fn has_field(&self, name: &str) -> bool {
        self.layout.field(name).is_some()
    }

    /// Raw bytes for upload
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}
