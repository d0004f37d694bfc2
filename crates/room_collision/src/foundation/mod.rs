//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types, world-unit constants and conversions
//! - Logging utilities

pub mod math;
pub mod logging;
