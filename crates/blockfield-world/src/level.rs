//! The level: every known chunk, plus loaded and dirty bookkeeping.

use std::fmt;
use std::sync::Arc;

use blockfield_core::{Aabb, BlockId, BlockPos, ChunkPos, Direction, Error, Result};
use glam::Vec3;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::backend::RenderBackend;
use crate::block_state::{place_block, BlockState, BlockWorld};
use crate::chunk::{Chunk, ChunkState};
use crate::codec::SerializedChunk;
use crate::grid::HeightRange;
use crate::protocol::{ConsumerMessage, ProducerMessage};
use crate::registry::BlockRegistry;

/// Whether chunk geometry is being requested yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// Only block data is streamed until the simulation radius is filled once.
    #[default]
    SimulateOnly,
    /// Chunks inside the render radius are loaded into the scene.
    Rendering,
}

/// Generated chunk count against the count announced by the producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadProgress {
    pub generated: usize,
    pub expected: usize,
}

impl LoadProgress {
    /// Completion in `[0, 1]`; zero until an expectation is known.
    pub fn fraction(&self) -> f32 {
        if self.expected == 0 {
            0.0
        } else {
            (self.generated as f32 / self.expected as f32).min(1.0)
        }
    }
}

/// Level statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelStats {
    pub known_chunks: usize,
    pub loaded_chunks: usize,
    pub dirty_chunks: usize,
    pub blocks: usize,
    pub planes: usize,
    pub rendered_planes: usize,
}

/// In-memory copy of every chunk's blocks and faces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub bounds: HeightRange,
    pub chunks: Vec<SerializedChunk>,
    /// Chunks whose terrain had arrived when the snapshot was taken.
    pub generated: Vec<ChunkPos>,
}

impl LevelSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Owns every chunk the consumer knows about.
///
/// Chunks are created on first write or when terrain arrives, and are never
/// dropped; unloading only detaches their geometry.
pub struct Level {
    registry: Arc<BlockRegistry>,
    backend: Box<dyn RenderBackend>,
    bounds: HeightRange,
    chunks: HashMap<ChunkPos, Chunk>,
    loaded: HashSet<ChunkPos>,
    dirty: HashSet<ChunkPos>,
    mode: StreamMode,
    last_center: Option<ChunkPos>,
    last_mode: StreamMode,
    progress: LoadProgress,
}

impl Level {
    pub fn new(
        registry: Arc<BlockRegistry>,
        backend: Box<dyn RenderBackend>,
        bounds: HeightRange,
    ) -> Self {
        Self {
            registry,
            backend,
            bounds,
            chunks: HashMap::new(),
            loaded: HashSet::new(),
            dirty: HashSet::new(),
            mode: StreamMode::SimulateOnly,
            last_center: None,
            last_mode: StreamMode::SimulateOnly,
            progress: LoadProgress::default(),
        }
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    pub const fn bounds(&self) -> HeightRange {
        self.bounds
    }

    pub const fn mode(&self) -> StreamMode {
        self.mode
    }

    pub const fn progress(&self) -> LoadProgress {
        self.progress
    }

    pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    pub fn contains_chunk(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    pub fn is_loaded(&self, pos: ChunkPos) -> bool {
        self.loaded.contains(&pos)
    }

    pub fn is_dirty(&self, pos: ChunkPos) -> bool {
        self.dirty.contains(&pos)
    }

    /// Loaded chunk positions, sorted.
    pub fn loaded_chunks(&self) -> Vec<ChunkPos> {
        let mut loaded: Vec<_> = self.loaded.iter().copied().collect();
        loaded.sort_unstable();
        loaded
    }

    fn chunk_entry(&mut self, pos: ChunkPos) -> &mut Chunk {
        self.chunks
            .entry(pos)
            .or_insert_with(|| Chunk::new(pos, self.bounds, Arc::clone(&self.registry)))
    }

    /// Replace the block at `pos`, creating its chunk if needed.
    pub fn set_block(&mut self, pos: BlockPos, kind: BlockId) -> Result<()> {
        if !self.bounds.contains(pos.y) {
            return Err(Error::OutOfBounds(format!(
                "y = {} outside {}..{}",
                pos.y,
                self.bounds.min_height,
                self.bounds.max_height()
            )));
        }
        if !self.registry.contains(kind) {
            return Err(Error::UnknownBlock(kind.0));
        }

        let chunk = pos.chunk_pos();
        self.chunk_entry(chunk);
        self.mark_dirty(chunk);
        place_block(self, pos, kind);
        Ok(())
    }

    /// Stored state, or a transient air state. Never creates a chunk.
    pub fn get_block(&self, pos: BlockPos) -> BlockState {
        self.chunks
            .get(&pos.chunk_pos())
            .and_then(|chunk| chunk.get(pos).copied())
            .unwrap_or_else(|| BlockState::air(pos))
    }

    /// The six neighbours of `pos`, resolved across chunk seams.
    pub fn get_neighbours(&self, pos: BlockPos) -> [(Direction, BlockState); 6] {
        Direction::ALL.map(|dir| (dir, self.get_block(pos.offset(dir, 1))))
    }

    pub fn is_solid(&self, pos: BlockPos) -> bool {
        self.block_at(pos).is_solid()
    }

    /// Whether a world-space point lies inside a solid block.
    pub fn is_solid_at(&self, point: Vec3) -> bool {
        self.is_solid(BlockPos::containing(point))
    }

    /// Whether any solid block overlaps `aabb`. Touching counts.
    pub fn intersects_solid(&self, aabb: &Aabb) -> bool {
        aabb.blocks().any(|pos| self.is_solid(pos))
    }

    /// Visit every cell of the box centred on `center` spanning `xz_range`
    /// horizontally and `y_range` vertically. Stops when `f` returns false.
    pub fn for_each_block_near<F>(&self, center: BlockPos, xz_range: i32, y_range: i32, mut f: F)
    where
        F: FnMut(&BlockState) -> bool,
    {
        let (hx, hy) = (xz_range / 2, y_range / 2);
        for x in center.x - hx..=center.x + hx {
            for z in center.z - hx..=center.z + hx {
                for y in center.y - hy..=center.y + hy {
                    if !f(&self.get_block(BlockPos::new(x, y, z))) {
                        return;
                    }
                }
            }
        }
    }

    /// Flag a chunk for rebuild. Returns false if it was already flagged.
    pub fn mark_dirty(&mut self, pos: ChunkPos) -> bool {
        self.dirty.insert(pos)
    }

    /// Rebuild every loaded dirty chunk once. Unloaded dirty chunks stay dirty.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn recompute_dirty(&mut self) -> usize {
        let ready: Vec<ChunkPos> = self
            .dirty
            .iter()
            .filter(|pos| self.loaded.contains(*pos))
            .copied()
            .collect();

        for pos in &ready {
            if let Some(chunk) = self.chunks.get_mut(pos) {
                chunk.recompute(self.backend.as_mut());
            }
            self.dirty.remove(pos);
        }

        if !ready.is_empty() {
            trace!("Recomputed {} dirty chunks", ready.len());
        }
        ready.len()
    }

    /// Attach a chunk's geometry. Unknown chunks are ignored.
    pub fn load_chunk(&mut self, pos: ChunkPos) -> bool {
        let Some(chunk) = self.chunks.get_mut(&pos) else {
            trace!("Ignoring load of unknown chunk {}", pos);
            return false;
        };
        chunk.load(self.backend.as_mut());
        self.loaded.insert(pos);
        self.dirty.remove(&pos);
        debug!("Loaded chunk {}", pos);
        true
    }

    /// Detach a chunk's geometry. Unknown chunks are ignored.
    pub fn unload_chunk(&mut self, pos: ChunkPos) -> bool {
        let Some(chunk) = self.chunks.get_mut(&pos) else {
            trace!("Ignoring unload of unknown chunk {}", pos);
            return false;
        };
        chunk.unload();
        self.loaded.remove(&pos);
        debug!("Unloaded chunk {}", pos);
        true
    }

    /// Report the viewpoint. Returns an update for the producer only when the
    /// viewpoint chunk or the stream mode changed since the last report.
    pub fn manage_chunks(&mut self, viewpoint: BlockPos) -> Option<ConsumerMessage> {
        let center = viewpoint.chunk_pos();
        if self.last_center == Some(center) && self.last_mode == self.mode {
            return None;
        }
        self.last_center = Some(center);
        self.last_mode = self.mode;

        Some(ConsumerMessage::Update {
            pos: center,
            loaded_chunks: self.loaded_chunks(),
        })
    }

    /// Apply one producer message, returning a reply if one is due.
    pub fn handle_message(&mut self, message: ProducerMessage) -> Result<Option<ConsumerMessage>> {
        match message {
            ProducerMessage::Ready => {
                info!("Chunk producer ready");
                Ok(None)
            }
            ProducerMessage::ToSimulate(count) => {
                debug!("Expecting {} simulated chunks", count);
                self.progress.expected = count;
                Ok(self.check_render_switch())
            }
            ProducerMessage::Generate { x, z, chunk } => {
                let pos = ChunkPos::new(x, z);
                if chunk.chunk_pos != pos {
                    return Err(Error::Deserialization(format!(
                        "generate for {pos} carries chunk {}",
                        chunk.chunk_pos
                    )));
                }
                self.insert_serialized(&chunk)?;
                self.progress.generated += 1;
                debug!(
                    "Generated chunk {} ({}/{})",
                    pos, self.progress.generated, self.progress.expected
                );
                Ok(self.check_render_switch())
            }
            ProducerMessage::Load { x, z } => {
                self.load_chunk(ChunkPos::new(x, z));
                Ok(None)
            }
            ProducerMessage::Unload { x, z } => {
                self.unload_chunk(ChunkPos::new(x, z));
                Ok(None)
            }
        }
    }

    fn check_render_switch(&mut self) -> Option<ConsumerMessage> {
        let LoadProgress {
            generated,
            expected,
        } = self.progress;
        if self.mode == StreamMode::SimulateOnly && expected > 0 && generated >= expected {
            self.mode = StreamMode::Rendering;
            info!("Simulation radius ready ({} chunks), starting render", generated);
            return Some(ConsumerMessage::StartRender);
        }
        None
    }

    /// Materialize generated terrain.
    ///
    /// A new chunk takes the payload as is and is then stitched to its known
    /// neighbours. A chunk that only holds local edits is rebuilt from the
    /// terrain with the edits laid over it, then stitched the same way.
    /// Terrain for an already generated chunk is ignored.
    pub fn insert_serialized(&mut self, payload: &SerializedChunk) -> Result<ChunkPos> {
        let grid = payload.decode(&self.registry, self.bounds)?;
        let pos = grid.pos();

        match self.chunks.get(&pos).map(Chunk::state) {
            None => {
                self.chunks
                    .insert(pos, Chunk::from_grid(grid, Arc::clone(&self.registry)));
                self.stitch(pos);
            }
            Some(ChunkState::Created) => {
                let mut merged = grid;
                let mut was_loaded = false;
                if let Some(mut edited) = self.chunks.remove(&pos) {
                    for state in edited.grid().iter() {
                        place_block(&mut merged, state.pos, state.kind);
                    }
                    was_loaded = edited.is_loaded();
                    edited.unload();
                }
                debug!("Merged terrain into edited chunk {}", pos);

                self.chunks
                    .insert(pos, Chunk::from_grid(merged, Arc::clone(&self.registry)));
                self.stitch(pos);
                if was_loaded {
                    self.load_chunk(pos);
                }
            }
            Some(ChunkState::Generated) => {
                debug!("Ignoring repeated terrain for chunk {}", pos);
                return Ok(pos);
            }
        }

        self.mark_dirty(pos);
        Ok(pos)
    }

    /// Hide faces on both sides of every seam where two solid blocks meet.
    fn stitch(&mut self, pos: ChunkPos) {
        let Some(chunk) = self.chunks.get(&pos) else {
            return;
        };
        for (block, dir) in chunk.grid().border_faces() {
            let neighbour = block.offset(dir, 1);
            if self.block_at(neighbour).is_solid() {
                self.set_face(block, dir, false);
                self.set_face(neighbour, dir.opposite(), false);
            }
        }
    }

    /// Copy every chunk's blocks and faces.
    pub fn snapshot(&self) -> LevelSnapshot {
        let mut positions: Vec<_> = self.chunks.keys().copied().collect();
        positions.sort_unstable();

        let mut chunks = Vec::with_capacity(positions.len());
        let mut generated = Vec::new();
        for pos in positions {
            if let Some(chunk) = self.chunks.get(&pos) {
                chunks.push(SerializedChunk::encode(chunk.grid()));
                if chunk.state() == ChunkState::Generated {
                    generated.push(pos);
                }
            }
        }

        LevelSnapshot {
            bounds: self.bounds,
            chunks,
            generated,
        }
    }

    /// Rebuild a level from a snapshot. Nothing is loaded; every chunk starts dirty.
    pub fn restore(
        snapshot: &LevelSnapshot,
        registry: Arc<BlockRegistry>,
        backend: Box<dyn RenderBackend>,
    ) -> Result<Self> {
        let mut level = Self::new(registry, backend, snapshot.bounds);
        let generated: HashSet<ChunkPos> = snapshot.generated.iter().copied().collect();

        for payload in &snapshot.chunks {
            let grid = payload.decode(&level.registry, level.bounds)?;
            let pos = grid.pos();
            let mut chunk = Chunk::from_grid(grid, Arc::clone(&level.registry));
            if !generated.contains(&pos) {
                chunk.set_state(ChunkState::Created);
            }
            level.chunks.insert(pos, chunk);
            level.mark_dirty(pos);
        }

        Ok(level)
    }

    pub fn stats(&self) -> LevelStats {
        let mut stats = LevelStats {
            known_chunks: self.chunks.len(),
            loaded_chunks: self.loaded.len(),
            dirty_chunks: self.dirty.len(),
            ..LevelStats::default()
        };
        for chunk in self.chunks.values() {
            stats.blocks += chunk.grid().len();
            stats.planes += chunk.planes();
            stats.rendered_planes += chunk.mesh().rendered_planes();
        }
        stats
    }
}

impl BlockWorld for Level {
    fn block_at(&self, pos: BlockPos) -> BlockId {
        self.chunks
            .get(&pos.chunk_pos())
            .map_or(BlockId::AIR, |chunk| chunk.block_at(pos))
    }

    fn min_height(&self) -> i32 {
        self.bounds.min_height
    }

    fn remove_state(&mut self, pos: BlockPos) -> Option<BlockState> {
        let chunk_pos = pos.chunk_pos();
        let state = self.chunks.get_mut(&chunk_pos)?.remove_state(pos)?;
        self.mark_dirty(chunk_pos);
        Some(state)
    }

    fn insert_state(&mut self, state: BlockState) {
        let chunk_pos = state.pos.chunk_pos();
        self.chunk_entry(chunk_pos).insert_state(state);
        self.mark_dirty(chunk_pos);
    }

    fn set_face(&mut self, pos: BlockPos, dir: Direction, visible: bool) -> bool {
        let chunk_pos = pos.chunk_pos();
        let Some(chunk) = self.chunks.get_mut(&chunk_pos) else {
            return false;
        };
        let changed = chunk.set_face(pos, dir, visible);
        if changed {
            self.mark_dirty(chunk_pos);
        }
        changed
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("bounds", &self.bounds)
            .field("mode", &self.mode)
            .field("progress", &self.progress)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
