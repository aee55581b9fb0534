//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types for culling
//! - Vulkan version packing
//! - Logging utilities

pub mod logging;
pub mod math;
pub mod version;
