//! # Core Module
//!
//! Shared settings used by every subsystem of the collision core.
//!
//! ## Organization
//!
//! - **Config**: Typed configuration for trees, room graph walks, LOS and logging

pub mod config;

// Re-export foundation for convenience
pub use crate::foundation;

// Re-export commonly used config types
pub use config::{
    CollisionConfig,
    BoundingTreeConfig,
    RoomGraphConfig,
    LosConfig,
    PointCollisionConfig,
    LoggingConfig,
    Config,
    ConfigError,
};
