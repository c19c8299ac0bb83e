//! # Frame Graph
//!
//! The per-frame render graph of a forward PBR renderer. Given a scene
//! snapshot it culls and queues draw commands, fits cascaded shadow maps,
//! and records every GPU pass of the frame in a fixed order through an
//! abstract render device.
//!
//! ## Features
//!
//! - **Shadow Cascades**: texel-snapped orthographic cascades per directional light
//! - **Command Queues**: frustum-culled forward, shadow, 2D and text queues
//! - **Dynamic Batching**: sprites, SDF text and debug primitives in bounded batches
//! - **Post Processing**: ping-pong chain with bloom, tone mapping, FXAA and more
//! - **Debug Overlay**: depth-tested and overlay lines, points, triangles and labels
//! - **Headless Device**: a recording backend for tests and tooling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use frame_graph::prelude::*;
//!
//! fn main() -> Result<(), FrameGraphError> {
//!     let mut device = HeadlessDevice::with_standard_shaders(DeviceCapabilities::default(), 1280, 720);
//!     let mut passes = RenderPasses::new(&mut device, RenderPassesSettings::default(), 1280, 720)?;
//!
//!     let scene = Scene::new().with_camera(CameraView::new(Camera::default(), Mat4::identity()));
//!     passes.begin_scene(&mut device, &scene)?;
//!     passes.on_render(&mut device, &scene)?;
//!     println!("{} draw calls", passes.stats().num_draw_calls);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod batch;
pub mod config;
pub mod debug;
pub mod error;
pub mod foundation;
pub mod passes;
pub mod post;
pub mod rhi;
pub mod scene;
pub mod settings;
pub mod spatial;
pub mod text;

pub use error::{FrameGraphError, FrameGraphResult};

/// Common imports for graph users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, ConfigFormat},
        debug::DebugDrawList,
        error::{FrameGraphError, FrameGraphResult},
        foundation::math::{Mat4, Transform, Vec2, Vec3, Vec4},
        passes::{RenderPasses, RenderTargets},
        rhi::{headless::HeadlessDevice, DeviceCapabilities, MeshHandle, RenderDevice, TextureHandle},
        scene::{Camera, CameraView, Environment, Light, Material, MaterialFlags, Scene, SceneRenderSettings, Sprite, TextComponent},
        settings::{RenderPassesSettings, RenderPassesStats},
        spatial::{BoundingBox, Frustum},
        text::FontGeometry,
    };
}
