//! Logging utilities and structured logging support

use std::collections::HashSet;

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system
pub fn init() {
    env_logger::init();
}

/// Remembers which warnings were already emitted so per-frame skips
/// are reported once instead of every frame.
#[derive(Debug, Default)]
pub struct WarnOnce {
    seen: HashSet<String>,
}

impl WarnOnce {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `message` at warn level the first time `key` is seen.
    /// Returns true when the warning was emitted.
    pub fn warn(&mut self, key: &str, message: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string());
        log::warn!("{message}");
        true
    }

    /// Forget every recorded key
    pub fn reset(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warn_once_only_emits_first_time() {
        let mut once = WarnOnce::new();
        assert!(once.warn("Bloom", "missing shader Bloom"));
        assert!(!once.warn("Bloom", "missing shader Bloom"));
        assert!(once.warn("FXAA", "missing shader FXAA"));

        once.reset();
        assert!(once.warn("Bloom", "missing shader Bloom"));
    }
}
