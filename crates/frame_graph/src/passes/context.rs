//! Shared render graph context
//!
//! State that is initialised once and then read by several passes lives
//! here instead of in statics: the BRDF lookup flag, the SSAO sample kernel
//! and the set of skip warnings already reported.

use super::ssao;
use crate::foundation::logging::WarnOnce;
use crate::foundation::math::Vec4;
use crate::rhi::{RenderDevice, ShaderHandle};
use rand::rngs::StdRng;
use rand::SeedableRng;

const SSAO_SEED: u64 = 0x5EED_0A0;

/// One-time initialisation flags and scratch data shared between passes
#[derive(Debug)]
pub struct RenderContext {
    /// BRDF lookup table was rendered
    pub brdf_generated: bool,
    ssao_kernel: Option<Vec<Vec4>>,
    rng: StdRng,
    warnings: WarnOnce,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext {
    /// Fresh context; nothing generated yet
    pub fn new() -> Self {
        Self {
            brdf_generated: false,
            ssao_kernel: None,
            rng: StdRng::seed_from_u64(SSAO_SEED),
            warnings: WarnOnce::new(),
        }
    }

    /// Random source for one-time sample tables
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// SSAO hemisphere kernel, generated on first use
    pub fn ssao_kernel(&mut self) -> &[Vec4] {
        let rng = &mut self.rng;
        self.ssao_kernel.get_or_insert_with(|| ssao::generate_kernel(rng))
    }

    /// Compiled shader by name.
    ///
    /// Missing or uncompiled shaders return `None` and log a warning the
    /// first time each name is requested.
    pub fn compiled_shader(&mut self, device: &dyn RenderDevice, name: &str) -> Option<ShaderHandle> {
        match device.shader(name) {
            Some(shader) if device.is_compiled(shader) => Some(shader),
            Some(_) => {
                self.warnings.warn(name, &format!("Shader {name} failed to compile, skipping its pass"));
                None
            }
            None => {
                self.warnings.warn(name, &format!("Shader {name} not found, skipping its pass"));
                None
            }
        }
    }

    /// Log a warning once per key
    pub fn warn_once(&mut self, key: &str, message: &str) -> bool {
        self.warnings.warn(key, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::shader_names;
    use crate::rhi::headless::HeadlessDevice;
    use crate::rhi::DeviceCapabilities;

    #[test]
    fn test_ssao_kernel_generated_once() {
        let mut context = RenderContext::new();
        let first = context.ssao_kernel().to_vec();
        let second = context.ssao_kernel().to_vec();
        assert_eq!(first.len(), ssao::KERNEL_SIZE);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_shader_returns_none() {
        let mut device = HeadlessDevice::with_standard_shaders(DeviceCapabilities::default(), 64, 64);
        let mut context = RenderContext::new();
        assert!(context.compiled_shader(&device, shader_names::BLOOM).is_some());

        device.set_compiled(shader_names::BLOOM, false);
        assert!(context.compiled_shader(&device, shader_names::BLOOM).is_none());

        device.remove_shader(shader_names::FXAA);
        assert!(context.compiled_shader(&device, shader_names::FXAA).is_none());
        // Already reported
        assert!(!context.warn_once(shader_names::FXAA, "again"));
    }
}
