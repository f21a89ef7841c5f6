//! Chunk lifecycle, surface meshing and streaming for the Blockfield client.

pub mod backend;
pub mod block_state;
pub mod chunk;
pub mod client;
pub mod codec;
pub mod config;
pub mod generation;
pub mod grid;
pub mod level;
pub mod mesh;
pub mod protocol;
pub mod registry;
pub mod streaming;

pub use backend::{HeadlessBackend, InstanceBatch, RenderBackend, SceneStats};
pub use block_state::{BlockState, BlockWorld, FaceSet};
pub use chunk::{Chunk, ChunkState};
pub use client::WorldClient;
pub use codec::{SerializedBlock, SerializedChunk, SerializedFace};
pub use config::WorldConfig;
pub use generation::{ChunkGenerator, FlatTerrain, NoiseTerrain, TerrainConfig, TerrainSource};
pub use grid::{BlockGrid, HeightRange};
pub use level::{Level, LevelSnapshot, LevelStats, LoadProgress, StreamMode};
pub use mesh::{face_transform, FaceInstance, FaceMeshAccumulator};
pub use protocol::{ConsumerMessage, ProducerMessage};
pub use registry::{
    BlockKind, BlockRegistry, RegistryBuilder, SequentialAtlas, TextureAtlas, TextureId, TextureLayout,
};
pub use streaming::{rings, ChunkLoader, ProducerHandle, QueuedChunk};

/// World seed for procedural generation.
pub type WorldSeed = u64;
