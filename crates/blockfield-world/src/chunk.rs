//! Chunk column: block grid plus its face mesh.

use std::sync::Arc;

use blockfield_core::{BlockId, BlockPos, ChunkPos, Direction, Error, Result};

use crate::backend::RenderBackend;
use crate::block_state::{place_block, BlockState, BlockWorld};
use crate::grid::{BlockGrid, HeightRange};
use crate::mesh::{face_transform, FaceInstance, FaceMeshAccumulator};
use crate::registry::BlockRegistry;

/// Where a chunk is in its lifecycle on the consumer side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChunkState {
    /// Created by a write or lookup before any terrain arrived.
    #[default]
    Created,
    /// Terrain has been filled in.
    Generated,
}

/// A chunk column.
///
/// Every visible face of every stored block owns exactly one accumulator
/// slot, so [`Chunk::planes`] always equals the number of visible faces.
pub struct Chunk {
    grid: BlockGrid,
    mesh: FaceMeshAccumulator,
    registry: Arc<BlockRegistry>,
    state: ChunkState,
    loaded: bool,
}

impl Chunk {
    /// Create a new empty chunk at the given position.
    pub fn new(pos: ChunkPos, bounds: HeightRange, registry: Arc<BlockRegistry>) -> Self {
        Self {
            grid: BlockGrid::new(pos, bounds),
            mesh: FaceMeshAccumulator::new(pos),
            registry,
            state: ChunkState::Created,
            loaded: false,
        }
    }

    /// Build a generated chunk from a grid whose faces are already computed.
    pub fn from_grid(grid: BlockGrid, registry: Arc<BlockRegistry>) -> Self {
        let mut chunk = Self::new(grid.pos(), grid.bounds(), registry);
        for state in grid.iter() {
            chunk.insert_state(BlockState::new(state.kind, state.pos, state.faces));
        }
        chunk.state = ChunkState::Generated;
        chunk
    }

    #[inline]
    pub const fn pos(&self) -> ChunkPos {
        self.grid.pos()
    }

    #[inline]
    pub const fn state(&self) -> ChunkState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ChunkState) {
        self.state = state;
    }

    #[inline]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn grid(&self) -> &BlockGrid {
        &self.grid
    }

    pub fn mesh(&self) -> &FaceMeshAccumulator {
        &self.mesh
    }

    /// Required slot count of the face mesh.
    #[inline]
    pub const fn planes(&self) -> usize {
        self.mesh.planes()
    }

    pub fn get(&self, pos: BlockPos) -> Option<&BlockState> {
        self.grid.get(pos)
    }

    /// Stored state, or a transient air state for an empty cell.
    pub fn get_block(&self, pos: BlockPos) -> BlockState {
        self.grid.get_block(pos)
    }

    /// Place `kind` at `pos` inside this column.
    ///
    /// Neighbours in other chunks are treated as air; use
    /// [`crate::level::Level::set_block`] for seam-aware edits.
    pub fn set_block(&mut self, pos: BlockPos, kind: BlockId) -> Result<()> {
        if !self.grid.covers(pos) {
            return Err(Error::OutOfBounds(format!(
                "{pos} is outside chunk {}",
                self.pos()
            )));
        }
        place_block(self, pos, kind);
        Ok(())
    }

    /// Attach the face mesh to the visible scene.
    pub fn load(&mut self, backend: &mut dyn RenderBackend) {
        self.mesh.add(backend);
        self.loaded = true;
    }

    /// Detach the face mesh. Block data is kept.
    pub fn unload(&mut self) {
        self.mesh.remove();
        self.loaded = false;
    }

    /// Rebuild the live batch from the current slots.
    pub fn recompute(&mut self, backend: &mut dyn RenderBackend) {
        self.mesh.recompute_mesh(backend);
    }

    fn show_face(&mut self, state: &mut BlockState, dir: Direction) {
        let slot = self.mesh.allocate();
        let texture = self.registry.texture(state.kind, dir);
        self.mesh.set_matrix_at(
            slot,
            FaceInstance::new(face_transform(dir, state.pos), texture),
        );
        state.slots[dir.index()] = Some(slot);
    }

    fn hide_face(&mut self, state: &mut BlockState, dir: Direction) {
        if let Some(slot) = state.slots[dir.index()].take() {
            self.mesh.free(slot);
        }
    }
}

impl BlockWorld for Chunk {
    fn block_at(&self, pos: BlockPos) -> BlockId {
        self.grid.block_at(pos)
    }

    fn min_height(&self) -> i32 {
        self.grid.bounds().min_height
    }

    fn remove_state(&mut self, pos: BlockPos) -> Option<BlockState> {
        let mut state = self.grid.take(pos)?;
        for dir in state.faces.directions() {
            self.hide_face(&mut state, dir);
        }
        Some(state)
    }

    fn insert_state(&mut self, mut state: BlockState) {
        if !self.pos().contains(state.pos) {
            return;
        }
        state.slots = [None; 6];
        for dir in state.faces.directions() {
            self.show_face(&mut state, dir);
        }
        if let Some(mut old) = self.grid.put(state) {
            for dir in old.faces.directions() {
                self.hide_face(&mut old, dir);
            }
        }
    }

    fn set_face(&mut self, pos: BlockPos, dir: Direction, visible: bool) -> bool {
        let Some(mut state) = self.grid.get(pos).copied() else {
            return false;
        };
        if state.is_face_visible(dir) == visible {
            return false;
        }

        state.faces.set_dir(dir, visible);
        if visible {
            self.show_face(&mut state, dir);
        } else {
            self.hide_face(&mut state, dir);
        }
        self.grid.put(state);
        true
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos())
            .field("state", &self.state)
            .field("loaded", &self.loaded)
            .field("blocks", &self.grid.len())
            .field("mesh", &self.mesh)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::block_state::FaceSet;
    use crate::registry::SequentialAtlas;

    fn registry() -> Arc<BlockRegistry> {
        Arc::new(BlockRegistry::standard(&mut SequentialAtlas::new()).unwrap())
    }

    fn chunk() -> Chunk {
        Chunk::new(ChunkPos::new(0, 0), HeightRange::new(0, 32), registry())
    }

    #[test]
    fn dirt_on_bare_ground() {
        let mut chunk = chunk();
        chunk.set_block(BlockPos::new(0, 0, 0), BlockId::DIRT).unwrap();
        let state = chunk.get_block(BlockPos::new(0, 0, 0));
        assert_eq!(state.faces, FaceSet::all() - FaceSet::DOWN);
        assert_eq!(chunk.planes(), 5);
    }

    #[test]
    fn stacking_then_removing() {
        let mut chunk = chunk();
        let bottom = BlockPos::new(0, 0, 0);
        let top = BlockPos::new(0, 1, 0);

        chunk.set_block(bottom, BlockId::DIRT).unwrap();
        chunk.set_block(top, BlockId::DIRT).unwrap();
        assert!(!chunk.get_block(bottom).is_face_visible(Direction::Up));
        assert_eq!(chunk.planes(), 4 + 5);

        chunk.set_block(top, BlockId::AIR).unwrap();
        assert!(chunk.get_block(bottom).is_face_visible(Direction::Up));
        assert!(chunk.get_block(top).is_air());
        assert_eq!(chunk.planes(), 5);
    }

    #[test]
    fn same_kind_twice_is_idempotent() {
        let mut chunk = chunk();
        let pos = BlockPos::new(5, 3, 5);
        chunk.set_block(pos, BlockId::STONE).unwrap();
        chunk.set_block(pos.below(1), BlockId::STONE).unwrap();
        let faces = chunk.get_block(pos).faces;
        let planes = chunk.planes();

        chunk.set_block(pos, BlockId::STONE).unwrap();
        chunk.set_block(pos, BlockId::STONE).unwrap();
        assert_eq!(chunk.get_block(pos).faces, faces);
        assert_eq!(chunk.planes(), planes);
    }

    #[test]
    fn every_visible_face_owns_a_filled_slot() {
        let mut chunk = chunk();
        for x in 0..4 {
            for y in 0..3 {
                chunk.set_block(BlockPos::new(x, y, 2), BlockId::GRASS_BLOCK).unwrap();
            }
        }
        chunk.set_block(BlockPos::new(1, 1, 2), BlockId::AIR).unwrap();

        let mut visible = 0;
        for state in chunk.grid().iter() {
            for dir in Direction::ALL {
                let slot = state.slot(dir);
                assert_eq!(slot.is_some(), state.is_face_visible(dir));
                if let Some(slot) = slot {
                    visible += 1;
                    assert!(chunk.mesh().instance_at(slot).is_some());
                }
            }
        }
        assert_eq!(visible, chunk.planes());
        assert_eq!(chunk.mesh().instances().count(), chunk.planes());
    }

    #[test]
    fn grass_faces_use_per_direction_textures() {
        let registry = registry();
        let mut chunk = Chunk::new(ChunkPos::new(0, 0), HeightRange::new(0, 8), Arc::clone(&registry));
        let pos = BlockPos::new(1, 1, 1);
        chunk.set_block(pos, BlockId::GRASS_BLOCK).unwrap();

        let state = chunk.get_block(pos);
        let up = chunk.mesh().instance_at(state.slot(Direction::Up).unwrap()).unwrap();
        let down = chunk.mesh().instance_at(state.slot(Direction::Down).unwrap()).unwrap();
        assert_eq!(up.texture, registry.texture(BlockId::GRASS_BLOCK, Direction::Up));
        assert_eq!(down.texture, registry.texture(BlockId::DIRT, Direction::Up));
    }

    #[test]
    fn load_attaches_and_unload_keeps_blocks() {
        let mut backend = HeadlessBackend::new();
        let mut chunk = chunk();
        chunk.set_block(BlockPos::new(2, 0, 2), BlockId::STONE).unwrap();

        chunk.load(&mut backend);
        assert!(chunk.is_loaded());
        assert_eq!(backend.visible_instances(chunk.pos()).len(), 5);

        chunk.unload();
        assert!(!chunk.is_loaded());
        assert!(!backend.is_attached(chunk.pos()));
        assert_eq!(chunk.get_block(BlockPos::new(2, 0, 2)).kind, BlockId::STONE);
    }

    #[test]
    fn from_grid_keeps_faces() {
        let mut grid = BlockGrid::new(ChunkPos::new(1, 0), HeightRange::new(0, 8));
        grid.set_block(BlockPos::new(16, 0, 0), BlockId::DIRT).unwrap();
        grid.set_block(BlockPos::new(17, 0, 0), BlockId::DIRT).unwrap();

        let chunk = Chunk::from_grid(grid.clone(), registry());
        assert_eq!(chunk.state(), ChunkState::Generated);
        assert_eq!(chunk.planes(), grid.visible_faces());
        for state in grid.iter() {
            assert_eq!(chunk.get_block(state.pos).faces, state.faces);
        }
    }

    #[test]
    fn writes_outside_column_are_rejected() {
        let mut chunk = chunk();
        assert!(chunk.set_block(BlockPos::new(0, 32, 0), BlockId::DIRT).is_err());
        assert!(chunk.set_block(BlockPos::new(-1, 0, 0), BlockId::DIRT).is_err());
        assert_eq!(chunk.planes(), 0);
    }
}
