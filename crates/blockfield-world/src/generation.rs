//! Procedural terrain generation.

use blockfield_core::constants::CHUNK_SIZE;
use blockfield_core::{BlockId, ChunkPos};
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::grid::{BlockGrid, HeightRange};
use crate::WorldSeed;

/// Terrain generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Number of noise octaves for detail.
    pub octaves: usize,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Smallest horizontal scale of the detail noise, in blocks.
    pub min_detail_scale: f64,
    /// Largest horizontal scale of the detail noise, in blocks.
    pub max_detail_scale: f64,
    /// Horizontal scale of the noise that picks the detail scale.
    pub mountain_scale: f64,
    /// Horizontal scale of the noise that picks the amplitude.
    pub terrain_scale: f64,
    /// Lowest amplitude as a fraction of the chunk depth.
    pub min_amplitude: f64,
    /// Highest amplitude as a fraction of the chunk depth.
    pub max_amplitude: f64,
    /// Depth of dirt layer below surface.
    pub dirt_depth: u32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            octaves: 1,
            lacunarity: 2.0,
            persistence: 0.5,
            min_detail_scale: 50.0,
            max_detail_scale: 150.0,
            mountain_scale: 400.0,
            terrain_scale: 200.0,
            min_amplitude: 0.1,
            max_amplitude: 0.7,
            dirt_depth: 3,
        }
    }
}

/// Black-box height and surface functions consumed by the generator.
///
/// Implementations must be deterministic for a given seed.
pub trait TerrainSource: Send {
    /// Number of filled blocks in the column at world `(x, z)`.
    fn height(&self, x: i32, z: i32) -> i32;

    /// Block placed on top of the column at world `(x, z)`.
    fn biome(&self, x: i32, z: i32) -> BlockId;
}

/// Linear remap of `value` from `[from_min, from_max]` to `[to_min, to_max]`.
fn scale_between(value: f64, to_min: f64, to_max: f64, from_min: f64, from_max: f64) -> f64 {
    (to_max - to_min) * (value - from_min) / (from_max - from_min) + to_min
}

/// Noise-driven terrain.
///
/// Three 2D fields combine: a mountain field picks how stretched the detail
/// noise is, a terrain field picks how tall it gets, and the detail field
/// gives the actual shape.
pub struct NoiseTerrain {
    config: TerrainConfig,
    chunk_depth: i32,
    detail: Fbm<Perlin>,
    mountain: Perlin,
    terrain: Perlin,
}

impl NoiseTerrain {
    pub fn new(seed: WorldSeed, config: TerrainConfig, chunk_depth: i32) -> Self {
        let seed = seed as u32;
        let detail = Fbm::<Perlin>::new(seed)
            .set_octaves(config.octaves)
            .set_lacunarity(config.lacunarity)
            .set_persistence(config.persistence);

        Self {
            config,
            chunk_depth,
            detail,
            mountain: Perlin::new(seed.wrapping_add(1)),
            terrain: Perlin::new(seed.wrapping_add(2)),
        }
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }
}

impl TerrainSource for NoiseTerrain {
    fn height(&self, x: i32, z: i32) -> i32 {
        let (x, z) = (f64::from(x), f64::from(z));
        let depth = f64::from(self.chunk_depth);
        let c = &self.config;

        let mountain = scale_between(
            self.mountain.get([x / c.mountain_scale, z / c.mountain_scale]),
            c.min_detail_scale,
            c.max_detail_scale,
            -1.0,
            1.0,
        );
        let amplitude = scale_between(
            self.terrain.get([x / c.terrain_scale, z / c.terrain_scale]),
            depth * c.min_amplitude,
            depth * c.max_amplitude,
            -1.0,
            1.0,
        );

        let n = ((self.detail.get([x / mountain, z / mountain]) + 1.0) * amplitude).max(1.0);
        (n.round() as i32).clamp(1, self.chunk_depth)
    }

    fn biome(&self, _x: i32, _z: i32) -> BlockId {
        BlockId::GRASS_BLOCK
    }
}

/// Constant-height terrain, mostly useful for tests and demos.
#[derive(Debug, Clone, Copy)]
pub struct FlatTerrain {
    pub height: i32,
    pub surface: BlockId,
}

impl TerrainSource for FlatTerrain {
    fn height(&self, _x: i32, _z: i32) -> i32 {
        self.height
    }

    fn biome(&self, _x: i32, _z: i32) -> BlockId {
        self.surface
    }
}

/// Fills chunk columns from a [`TerrainSource`].
pub struct ChunkGenerator {
    source: Box<dyn TerrainSource>,
    bounds: HeightRange,
    dirt_depth: i32,
}

impl ChunkGenerator {
    pub fn new(source: Box<dyn TerrainSource>, bounds: HeightRange, dirt_depth: u32) -> Self {
        Self {
            source,
            bounds,
            dirt_depth: dirt_depth as i32,
        }
    }

    /// Generator using [`NoiseTerrain`].
    pub fn noise(seed: WorldSeed, config: TerrainConfig, bounds: HeightRange) -> Self {
        let dirt_depth = config.dirt_depth;
        let source = NoiseTerrain::new(seed, config, bounds.depth);
        Self::new(Box::new(source), bounds, dirt_depth)
    }

    pub fn bounds(&self) -> HeightRange {
        self.bounds
    }

    /// Column height at world `(x, z)`, clamped to `[1, depth]`.
    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        self.source.height(x, z).clamp(1, self.bounds.depth)
    }

    /// Block kind at `layer` (0 = bottom) of a column `height` blocks tall.
    fn block_at_layer(&self, layer: i32, height: i32, surface: BlockId) -> BlockId {
        if layer >= height {
            BlockId::AIR
        } else if layer == height - 1 {
            surface
        } else if layer >= height - 1 - self.dirt_depth {
            BlockId::DIRT
        } else {
            BlockId::STONE
        }
    }

    /// Generate the block grid of one chunk column.
    ///
    /// Neighbouring columns are not consulted: faces on the chunk border
    /// start out visible and are reconciled by whoever stitches chunks.
    #[cfg_attr(
        feature = "profiling",
        tracing::instrument(level = "trace", skip_all, fields(x = pos.x, z = pos.z))
    )]
    pub fn generate(&self, pos: ChunkPos) -> BlockGrid {
        let mut grid = BlockGrid::new(pos, self.bounds);
        let base = pos.origin(self.bounds.min_height);

        for lx in 0..CHUNK_SIZE {
            for lz in 0..CHUNK_SIZE {
                let (x, z) = (base.x + lx, base.z + lz);
                let height = self.height_at(x, z);
                let surface = self.source.biome(x, z);

                for layer in 0..height {
                    let block = self.block_at_layer(layer, height, surface);
                    grid.fill(base.relative(lx, layer, lz), block);
                }
            }
        }

        grid
    }
}
