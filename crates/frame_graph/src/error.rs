//! Render graph error type

use crate::config::ConfigError;
use crate::rhi::{PushConstantError, RhiError};

/// Result type for render graph operations
pub type FrameGraphResult<T> = Result<T, FrameGraphError>;

/// Errors that abort a render graph operation.
///
/// Missing shaders, absent cameras and batch overflow are not errors; the
/// affected pass logs and skips instead.
#[derive(Debug, thiserror::Error)]
pub enum FrameGraphError {
    /// The device rejected a call
    #[error("Device error: {0}")]
    Rhi(#[from] RhiError),

    /// A push constant write did not match the shader's reflected block
    #[error("Push constant error: {0}")]
    PushConstant(#[from] PushConstantError),

    /// Settings could not be loaded or saved
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A resource the graph creates at startup is missing
    #[error("Missing resource: {0}")]
    MissingResource(&'static str),
}
