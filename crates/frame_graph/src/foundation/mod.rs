//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the render graph:
//! - Math types and projection helpers
//! - Logging utilities

pub mod math;
pub mod logging;
