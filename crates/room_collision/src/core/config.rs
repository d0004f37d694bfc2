//! # Collision Configuration
//!
//! All tunables of the collision core live here, grouped per subsystem.
//!
//! ## Configuration Categories
//!
//! - **Tree Config**: margins and re-insertion thresholds for bounding trees
//! - **Room Graph Config**: neighbor closure depth and portal walk limits
//! - **LOS Config**: ray-march hop limit
//! - **Point Collision Config**: slope classification
//! - **Logging Config**: default log level for binaries

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};

/// # Bounding Tree Configuration
///
/// Margins are in world units and are added on every axis of a leaf's box.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundingTreeConfig {
    /// Margin used for moveable and static objects in room object trees
    pub object_margin: f32,
    /// Margin used for static room triangles
    pub triangle_margin: f32,
    /// A fattened leaf is re-inserted once it exceeds the tight box expanded by
    /// `oversize_factor * margin`
    pub oversize_factor: f32,
}

impl BoundingTreeConfig {
    /// Create the default tree configuration
    pub fn new() -> Self {
        Self {
            object_margin: 64.0,
            triangle_margin: 0.0,
            oversize_factor: 4.0,
        }
    }

    /// Set the object margin
    pub fn with_object_margin(mut self, margin: f32) -> Self {
        self.object_margin = margin;
        self
    }

    /// Set the oversize factor
    pub fn with_oversize_factor(mut self, factor: f32) -> Self {
        self.oversize_factor = factor;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.object_margin >= 0.0) || !(self.triangle_margin >= 0.0) {
            return Err("Tree margins must be non-negative".to_string());
        }
        if !(self.oversize_factor >= 1.0) {
            return Err("Oversize factor must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for BoundingTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Room Graph Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomGraphConfig {
    /// Depth of the breadth-first neighbor closure computed per room
    pub neighbor_search_depth: u32,
    /// Upper bound on portal hops in a single vertical or side walk
    pub max_portal_hops: u32,
}

impl RoomGraphConfig {
    /// Create the default room graph configuration
    pub fn new() -> Self {
        Self {
            neighbor_search_depth: 2,
            max_portal_hops: 256,
        }
    }

    /// Set the neighbor search depth
    pub fn with_neighbor_search_depth(mut self, depth: u32) -> Self {
        self.neighbor_search_depth = depth;
        self
    }

    /// Set the portal hop limit
    pub fn with_max_portal_hops(mut self, hops: u32) -> Self {
        self.max_portal_hops = hops;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_portal_hops == 0 {
            return Err("Max portal hops must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for RoomGraphConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Line Of Sight Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LosConfig {
    /// Upper bound on room switches during one ray march
    pub max_portal_hops: u32,
}

impl LosConfig {
    /// Create the default LOS configuration
    pub fn new() -> Self {
        Self { max_portal_hops: 128 }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_portal_hops == 0 {
            return Err("LOS max portal hops must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for LosConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Point Collision Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PointCollisionConfig {
    /// Surfaces steeper than this angle (from horizontal) are flagged steep
    pub steep_slope_degrees: f32,
}

impl PointCollisionConfig {
    /// Create the default point collision configuration
    pub fn new() -> Self {
        Self { steep_slope_degrees: 45.0 }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=90.0).contains(&self.steep_slope_degrees) {
            return Err("Steep slope angle must be within 0..=90 degrees".to_string());
        }
        Ok(())
    }
}

impl Default for PointCollisionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Logging Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level filter for binaries
    pub level: String,
}

impl LoggingConfig {
    /// Create the default logging configuration
    pub fn new() -> Self {
        Self { level: "info".to_string() }
    }

    /// Set log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Collision Configuration
///
/// Top-level configuration handed to [`crate::level::World::new`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Bounding tree settings
    pub tree: BoundingTreeConfig,
    /// Room graph walk settings
    pub room_graph: RoomGraphConfig,
    /// Line of sight settings
    pub los: LosConfig,
    /// Point collision settings
    pub point_collision: PointCollisionConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl CollisionConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tree settings
    pub fn with_tree(mut self, tree: BoundingTreeConfig) -> Self {
        self.tree = tree;
        self
    }

    /// Replace the room graph settings
    pub fn with_room_graph(mut self, room_graph: RoomGraphConfig) -> Self {
        self.room_graph = room_graph;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), String> {
        self.tree.validate()?;
        self.room_graph.validate()?;
        self.los.validate()?;
        self.point_collision.validate()?;
        Ok(())
    }

    /// Load from a `.toml` or `.ron` file and validate
    pub fn load_validated(path: &str) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

impl Config for CollisionConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CollisionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = "[tree]\nobject_margin = 16.0\n\n[logging]\nlevel = \"debug\"\n";
        let config = CollisionConfig::from_str_with_format(text, "collision.toml").unwrap();
        assert_eq!(config.tree.object_margin, 16.0);
        assert_eq!(config.tree.oversize_factor, 4.0);
        assert_eq!(config.room_graph.neighbor_search_depth, 2);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_ron_round_trip_through_text() {
        let config = CollisionConfig::new()
            .with_room_graph(RoomGraphConfig::new().with_neighbor_search_depth(3));
        let text = ron::ser::to_string(&config).unwrap();
        let parsed = CollisionConfig::from_str_with_format(&text, "collision.ron").unwrap();
        assert_eq!(parsed.room_graph.neighbor_search_depth, 3);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = CollisionConfig::from_str_with_format("", "collision.yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_invalid_oversize_factor() {
        let config = CollisionConfig::new()
            .with_tree(BoundingTreeConfig::new().with_oversize_factor(0.5));
        assert!(config.validate().is_err());
    }
}
