//! Transferable chunk representation.
//!
//! A [`SerializedChunk`] carries, for every occupied cell, the block kind
//! index, the absolute position and all six face flags. Cells sit in a
//! sparse nested array indexed `[x][y - min_height][z]` with chunk-local
//! `x`/`z`; trailing empty cells are omitted. Geometry is not carried and is
//! rebuilt by the receiver.

use blockfield_core::{BlockId, BlockPos, ChunkPos, Direction, Error, Result};
use serde::{Deserialize, Serialize};

use crate::block_state::{BlockState, FaceSet};
use crate::grid::{BlockGrid, HeightRange};
use crate::registry::BlockRegistry;

/// Visibility of one face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedFace {
    pub direction: Direction,
    pub value: bool,
}

/// One occupied cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedBlock {
    pub block: BlockId,
    pub pos: BlockPos,
    pub faces: Vec<SerializedFace>,
}

impl SerializedBlock {
    fn encode(state: &BlockState) -> Self {
        Self {
            block: state.kind,
            pos: state.pos,
            faces: Direction::ALL
                .iter()
                .map(|&direction| SerializedFace {
                    direction,
                    value: state.is_face_visible(direction),
                })
                .collect(),
        }
    }

    fn decode_faces(&self) -> Result<FaceSet> {
        let mut seen = FaceSet::empty();
        let mut faces = FaceSet::empty();
        for face in &self.faces {
            if seen.has(face.direction) {
                return Err(Error::Deserialization(format!(
                    "block at {} lists face {} twice",
                    self.pos, face.direction
                )));
            }
            seen.set_dir(face.direction, true);
            faces.set_dir(face.direction, face.value);
        }
        if seen != FaceSet::all() {
            return Err(Error::Deserialization(format!(
                "block at {} lists {} of 6 faces",
                self.pos,
                seen.count()
            )));
        }
        Ok(faces)
    }
}

/// Sparse `[x][y][z]` cell array.
pub type BlockArray = Vec<Vec<Vec<Option<SerializedBlock>>>>;

/// A chunk's block grid in transferable form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedChunk {
    pub chunk_pos: ChunkPos,
    pub blocks: BlockArray,
}

fn slot<T: Default>(v: &mut Vec<T>, index: usize) -> &mut T {
    if v.len() <= index {
        v.resize_with(index + 1, T::default);
    }
    &mut v[index]
}

impl SerializedChunk {
    /// Capture every occupied cell of `grid`.
    pub fn encode(grid: &BlockGrid) -> Self {
        let min_height = grid.bounds().min_height;
        let mut blocks = BlockArray::new();
        for state in grid.iter() {
            let local = state.pos.local_pos();
            let column = slot(&mut blocks, usize::from(local.x));
            let row = slot(column, (state.pos.y - min_height) as usize);
            *slot(row, usize::from(local.z)) = Some(SerializedBlock::encode(state));
        }

        Self {
            chunk_pos: grid.pos(),
            blocks,
        }
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells().count()
    }

    pub fn is_empty(&self) -> bool {
        self.cells().next().is_none()
    }

    fn cells(&self) -> impl Iterator<Item = ((usize, usize, usize), &SerializedBlock)> {
        self.blocks.iter().enumerate().flat_map(|(x, column)| {
            column.iter().enumerate().flat_map(move |(y, row)| {
                row.iter()
                    .enumerate()
                    .filter_map(move |(z, cell)| cell.as_ref().map(|b| ((x, y, z), b)))
            })
        })
    }

    /// Rebuild the block grid.
    ///
    /// Any mismatch between a cell's array index and its position, a
    /// position outside the chunk, an unknown block kind or an incomplete
    /// face list is a hard error.
    pub fn decode(&self, registry: &BlockRegistry, bounds: HeightRange) -> Result<BlockGrid> {
        let mut grid = BlockGrid::new(self.chunk_pos, bounds);

        for ((x, y, z), block) in self.cells() {
            let pos = block.pos;
            if !grid.covers(pos) {
                return Err(Error::Deserialization(format!(
                    "block at {pos} does not belong to chunk {}",
                    self.chunk_pos
                )));
            }

            let local = pos.local_pos();
            let expected = (
                usize::from(local.x),
                (pos.y - bounds.min_height) as usize,
                usize::from(local.z),
            );
            if expected != (x, y, z) {
                return Err(Error::Deserialization(format!(
                    "block at {pos} stored at index [{x}][{y}][{z}]"
                )));
            }

            if block.block.is_air() || !registry.contains(block.block) {
                return Err(Error::Deserialization(format!(
                    "block at {pos} has invalid kind index {}",
                    block.block.0
                )));
            }

            let faces = block.decode_faces()?;
            grid.put(BlockState::new(block.block, pos, faces));
        }

        Ok(grid)
    }

    /// Compact binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}
