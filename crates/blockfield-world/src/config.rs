//! World configuration.
//!
//! Parameters can come from a TOML file; missing keys fall back to
//! defaults, and command-line overrides are applied on top by the caller.

use std::path::Path;
use std::time::Duration;

use blockfield_core::constants::{DEFAULT_CHUNK_DEPTH, DEFAULT_MIN_HEIGHT};
use blockfield_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::generation::TerrainConfig;
use crate::grid::HeightRange;
use crate::WorldSeed;

/// World and streaming parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Seed for terrain noise.
    pub seed: WorldSeed,
    /// Ring radius, in chunks, that is generated around the viewpoint.
    pub simulation_distance: u32,
    /// Ring radius, in chunks, that gets geometry. Never above `simulation_distance`.
    pub render_distance: u32,
    /// Vertical size of a chunk column in blocks.
    pub chunk_depth: i32,
    /// Lowest block layer.
    pub min_height: i32,
    /// Interval between producer queue pops.
    pub queue_interval_ms: u64,
    /// World ticks per second on the consumer side.
    pub ticks_per_second: u32,
    /// Capacity of the producer to consumer channel.
    pub producer_channel_capacity: usize,
    /// Capacity of the consumer to producer channel.
    pub consumer_channel_capacity: usize,
    /// Terrain shape.
    pub terrain: TerrainConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            simulation_distance: 3,
            render_distance: 2,
            chunk_depth: DEFAULT_CHUNK_DEPTH,
            min_height: DEFAULT_MIN_HEIGHT,
            queue_interval_ms: 150,
            ticks_per_second: 5,
            producer_channel_capacity: 1024,
            consumer_channel_capacity: 64,
            terrain: TerrainConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded world config from {:?}", path);
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: WorldSeed) -> Self {
        self.seed = seed;
        self
    }

    /// Set the simulation distance.
    pub fn with_simulation_distance(mut self, distance: u32) -> Self {
        self.simulation_distance = distance;
        self
    }

    /// Set the render distance.
    pub fn with_render_distance(mut self, distance: u32) -> Self {
        self.render_distance = distance;
        self
    }

    /// Set the chunk depth.
    pub fn with_chunk_depth(mut self, depth: i32) -> Self {
        self.chunk_depth = depth;
        self
    }

    /// Set the producer queue interval.
    pub fn with_queue_interval_ms(mut self, ms: u64) -> Self {
        self.queue_interval_ms = ms;
        self
    }

    /// Set the terrain parameters.
    pub fn with_terrain(mut self, terrain: TerrainConfig) -> Self {
        self.terrain = terrain;
        self
    }

    /// Check invariants, clamping what can be clamped.
    pub fn validate(&mut self) -> Result<()> {
        if self.chunk_depth <= 0 {
            return Err(Error::Config(format!(
                "chunk_depth must be positive, got {}",
                self.chunk_depth
            )));
        }
        if self.ticks_per_second == 0 {
            return Err(Error::Config("ticks_per_second must be positive".into()));
        }
        if self.queue_interval_ms == 0 {
            return Err(Error::Config("queue_interval_ms must be positive".into()));
        }
        if self.producer_channel_capacity == 0 || self.consumer_channel_capacity == 0 {
            return Err(Error::Config("channel capacities must be positive".into()));
        }
        if self.render_distance > self.simulation_distance {
            warn!(
                "render_distance {} exceeds simulation_distance {}, clamping",
                self.render_distance, self.simulation_distance
            );
            self.render_distance = self.simulation_distance;
        }
        Ok(())
    }

    pub const fn height_range(&self) -> HeightRange {
        HeightRange::new(self.min_height, self.chunk_depth)
    }

    pub const fn queue_interval(&self) -> Duration {
        Duration::from_millis(self.queue_interval_ms)
    }

    /// Time between world ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.ticks_per_second.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WorldConfig::default();
        assert_eq!(config.simulation_distance, 3);
        assert_eq!(config.render_distance, 2);
        assert_eq!(config.chunk_depth, 384);
        assert_eq!(config.queue_interval(), Duration::from_millis(150));
        assert_eq!(config.tick_interval(), Duration::from_millis(200));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = WorldConfig::from_toml_str(
            r#"
            seed = 42
            render_distance = 1

            [terrain]
            dirt_depth = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.render_distance, 1);
        assert_eq!(config.simulation_distance, 3);
        assert_eq!(config.terrain.dirt_depth, 5);
        assert_eq!(config.terrain.octaves, TerrainConfig::default().octaves);
    }

    #[test]
    fn toml_roundtrip() {
        let config = WorldConfig::default().with_seed(9).with_chunk_depth(64);
        let text = config.to_toml_string().unwrap();
        assert_eq!(WorldConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn bad_toml_is_config_error() {
        let err = WorldConfig::from_toml_str("seed = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn validate_clamps_render_distance() {
        let mut config = WorldConfig::default()
            .with_simulation_distance(1)
            .with_render_distance(4);
        config.validate().unwrap();
        assert_eq!(config.render_distance, 1);
    }

    #[test]
    fn validate_rejects_empty_columns() {
        let mut config = WorldConfig::default().with_chunk_depth(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = WorldConfig::load("/nonexistent/blockfield.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
