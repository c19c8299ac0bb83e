//! Debug overlay pass glue

use super::context::RenderContext;
use crate::debug::overlay::OverlayFrame;
use crate::debug::{DebugDrawList, DebugOverlay};
use crate::error::FrameGraphResult;
use crate::rhi::{RenderDevice, TextureHandle};
use crate::scene::CameraView;
use crate::settings::RenderPassesStats;
use crate::text::FontGeometry;
use log::info;
use std::sync::Arc;

/// Owns the overlay batchers while the debug renderer is enabled
#[derive(Debug, Default)]
pub(super) struct DebugPass {
    overlay: Option<DebugOverlay>,
    font: Option<Arc<FontGeometry>>,
}

impl DebugPass {
    pub(super) fn is_initialised(&self) -> bool {
        self.overlay.is_some()
    }

    /// Create or release the overlay
    pub(super) fn enable(&mut self, device: &mut dyn RenderDevice, enabled: bool, max_textures: usize) {
        match (enabled, self.overlay.is_some()) {
            (true, false) => {
                let mut overlay = DebugOverlay::new(max_textures);
                overlay.set_font(self.font.clone());
                self.overlay = Some(overlay);
                info!("Debug renderer enabled");
            }
            (false, true) => {
                if let Some(mut overlay) = self.overlay.take() {
                    overlay.destroy(device);
                }
                info!("Debug renderer disabled");
            }
            _ => {}
        }
    }

    pub(super) fn set_font(&mut self, font: Option<Arc<FontGeometry>>) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.set_font(font.clone());
        }
        self.font = font;
    }

    /// Label font, also the fallback font for scene text
    pub(super) fn font(&self) -> Option<&Arc<FontGeometry>> {
        self.font.as_ref()
    }

    pub(super) fn render(
        &mut self,
        device: &mut dyn RenderDevice,
        context: &mut RenderContext,
        list: &DebugDrawList,
        camera: &CameraView,
        colour: TextureHandle,
        depth: Option<TextureHandle>,
        default_texture: TextureHandle,
        stats: &mut RenderPassesStats,
    ) -> FrameGraphResult<()> {
        let Some(overlay) = self.overlay.as_mut() else {
            context.warn_once("debug-overlay", "Debug renderer enabled but not initialised, skipping debug pass");
            return Ok(());
        };
        if !list.enabled || list.is_empty() {
            return Ok(());
        }

        let (width, height) = device.texture_size(colour, 0)?;
        let frame = OverlayFrame { list, camera, colour, depth, default_texture, width, height };
        overlay.render(device, context, &frame)?;
        stats.num_draw_calls += overlay.draw_calls();
        Ok(())
    }

    pub(super) fn destroy(&mut self, device: &mut dyn RenderDevice) {
        if let Some(mut overlay) = self.overlay.take() {
            overlay.destroy(device);
        }
    }
}
