//! Sparse block grid of a single chunk column.

use blockfield_core::{BlockId, BlockPos, ChunkPos, Direction, Error, LocalPos, Result};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::block_state::{place_block, BlockState, BlockWorld};

/// Vertical extent of every chunk column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightRange {
    /// Lowest block layer.
    pub min_height: i32,
    /// Number of layers.
    pub depth: i32,
}

impl HeightRange {
    pub const fn new(min_height: i32, depth: i32) -> Self {
        Self { min_height, depth }
    }

    /// One past the highest block layer.
    #[inline]
    pub const fn max_height(self) -> i32 {
        self.min_height + self.depth
    }

    #[inline]
    pub const fn contains(self, y: i32) -> bool {
        y >= self.min_height && y < self.max_height()
    }
}

/// Block states of one chunk, keyed by chunk-local position.
///
/// Used on its own by the producer (neighbours outside the column read as
/// air) and wrapped by [`crate::chunk::Chunk`] on the consumer side.
#[derive(Clone, Debug)]
pub struct BlockGrid {
    pos: ChunkPos,
    bounds: HeightRange,
    blocks: HashMap<LocalPos, BlockState>,
}

impl BlockGrid {
    pub fn new(pos: ChunkPos, bounds: HeightRange) -> Self {
        Self {
            pos,
            bounds,
            blocks: HashMap::new(),
        }
    }

    #[inline]
    pub const fn pos(&self) -> ChunkPos {
        self.pos
    }

    #[inline]
    pub const fn bounds(&self) -> HeightRange {
        self.bounds
    }

    /// Whether `pos` is inside this column and its height range.
    #[inline]
    pub fn covers(&self, pos: BlockPos) -> bool {
        self.pos.contains(pos) && self.bounds.contains(pos.y)
    }

    pub fn get(&self, pos: BlockPos) -> Option<&BlockState> {
        if !self.pos.contains(pos) {
            return None;
        }
        self.blocks.get(&pos.local_pos())
    }

    pub(crate) fn get_mut(&mut self, pos: BlockPos) -> Option<&mut BlockState> {
        if !self.pos.contains(pos) {
            return None;
        }
        self.blocks.get_mut(&pos.local_pos())
    }

    /// Stored state, or a transient air state for an empty cell.
    pub fn get_block(&self, pos: BlockPos) -> BlockState {
        self.get(pos).copied().unwrap_or_else(|| BlockState::air(pos))
    }

    /// Place `kind` at `pos`, updating faces of in-column neighbours.
    pub fn set_block(&mut self, pos: BlockPos, kind: BlockId) -> Result<()> {
        if !self.covers(pos) {
            return Err(Error::OutOfBounds(format!(
                "{pos} is outside chunk {} (y in {}..{})",
                self.pos,
                self.bounds.min_height,
                self.bounds.max_height()
            )));
        }
        self.fill(pos, kind);
        Ok(())
    }

    /// Unchecked [`BlockGrid::set_block`] for generators that stay in range.
    pub(crate) fn fill(&mut self, pos: BlockPos, kind: BlockId) {
        debug_assert!(self.covers(pos));
        place_block(self, pos, kind);
    }

    /// Store a state verbatim.
    pub(crate) fn put(&mut self, state: BlockState) -> Option<BlockState> {
        self.blocks.insert(state.pos.local_pos(), state)
    }

    pub(crate) fn take(&mut self, pos: BlockPos) -> Option<BlockState> {
        if !self.pos.contains(pos) {
            return None;
        }
        self.blocks.remove(&pos.local_pos())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All stored states in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockState> {
        self.blocks.values()
    }

    /// Total number of visible faces.
    pub fn visible_faces(&self) -> usize {
        self.blocks.values().map(|state| state.faces.count()).sum()
    }

    /// Visible faces that point out of the column, as `(block, direction)`.
    pub fn border_faces(&self) -> Vec<(BlockPos, Direction)> {
        let mut out = Vec::new();
        for (local, state) in &self.blocks {
            for dir in [
                Direction::North,
                Direction::South,
                Direction::West,
                Direction::East,
            ] {
                if local.on_border(dir) && state.is_face_visible(dir) {
                    out.push((state.pos, dir));
                }
            }
        }
        out
    }
}

impl BlockWorld for BlockGrid {
    fn block_at(&self, pos: BlockPos) -> BlockId {
        self.get(pos).map_or(BlockId::AIR, |state| state.kind)
    }

    fn min_height(&self) -> i32 {
        self.bounds.min_height
    }

    fn remove_state(&mut self, pos: BlockPos) -> Option<BlockState> {
        self.take(pos)
    }

    fn insert_state(&mut self, state: BlockState) {
        if self.pos.contains(state.pos) {
            self.put(state);
        }
    }

    fn set_face(&mut self, pos: BlockPos, dir: Direction, visible: bool) -> bool {
        let Some(state) = self.get_mut(pos) else {
            return false;
        };
        if state.is_face_visible(dir) == visible {
            return false;
        }
        state.faces.set_dir(dir, visible);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_state::FaceSet;

    fn grid() -> BlockGrid {
        BlockGrid::new(ChunkPos::new(0, 0), HeightRange::new(0, 16))
    }

    #[test]
    fn miss_reads_as_transient_air() {
        let grid = grid();
        let state = grid.get_block(BlockPos::new(1, 1, 1));
        assert!(state.is_air());
        assert!(grid.is_empty());
    }

    #[test]
    fn lone_block_on_floor() {
        let mut grid = grid();
        grid.set_block(BlockPos::new(0, 0, 0), BlockId::DIRT).unwrap();
        let state = grid.get_block(BlockPos::new(0, 0, 0));
        assert_eq!(state.faces, FaceSet::all() - FaceSet::DOWN);
    }

    #[test]
    fn stacking_hides_touching_faces() {
        let mut grid = grid();
        grid.set_block(BlockPos::new(2, 0, 2), BlockId::DIRT).unwrap();
        grid.set_block(BlockPos::new(2, 1, 2), BlockId::DIRT).unwrap();
        assert!(!grid.get_block(BlockPos::new(2, 0, 2)).is_face_visible(Direction::Up));
        assert!(!grid.get_block(BlockPos::new(2, 1, 2)).is_face_visible(Direction::Down));
        assert_eq!(grid.visible_faces(), 4 + 5);

        grid.set_block(BlockPos::new(2, 1, 2), BlockId::AIR).unwrap();
        assert!(grid.get_block(BlockPos::new(2, 0, 2)).is_face_visible(Direction::Up));
        assert_eq!(grid.visible_faces(), 5);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn removing_support_exposes_bottom_face() {
        let mut grid = grid();
        grid.set_block(BlockPos::new(4, 0, 4), BlockId::STONE).unwrap();
        grid.set_block(BlockPos::new(4, 1, 4), BlockId::STONE).unwrap();
        grid.set_block(BlockPos::new(4, 0, 4), BlockId::AIR).unwrap();
        // (4,1,4) now sits above an empty floor cell, not on the floor itself.
        assert!(grid.get_block(BlockPos::new(4, 1, 4)).is_face_visible(Direction::Down));
    }

    #[test]
    fn rejects_positions_outside_column() {
        let mut grid = grid();
        assert!(grid.set_block(BlockPos::new(16, 0, 0), BlockId::DIRT).is_err());
        assert!(grid.set_block(BlockPos::new(0, 16, 0), BlockId::DIRT).is_err());
        assert!(grid.set_block(BlockPos::new(0, -1, 0), BlockId::DIRT).is_err());
    }

    #[test]
    fn border_faces_point_outward() {
        let mut grid = grid();
        grid.set_block(BlockPos::new(0, 3, 15), BlockId::STONE).unwrap();
        let mut faces = grid.border_faces();
        faces.sort_by_key(|(_, dir)| dir.index());
        assert_eq!(
            faces,
            vec![
                (BlockPos::new(0, 3, 15), Direction::South),
                (BlockPos::new(0, 3, 15), Direction::West),
            ]
        );
    }

    #[test]
    fn height_range_bounds() {
        let range = HeightRange::new(-64, 384);
        assert_eq!(range.max_height(), 320);
        assert!(range.contains(-64));
        assert!(range.contains(319));
        assert!(!range.contains(320));
    }
}
