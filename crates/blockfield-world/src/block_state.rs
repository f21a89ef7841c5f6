//! Per-cell block state and the incremental face visibility algorithm.

use bitflags::bitflags;
use blockfield_core::{BlockId, BlockPos, Direction};

bitflags! {
    /// Set of visible faces, one bit per [`Direction`] wire index.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FaceSet: u8 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const NORTH = 1 << 2;
        const SOUTH = 1 << 3;
        const WEST = 1 << 4;
        const EAST = 1 << 5;
    }
}

impl FaceSet {
    #[inline]
    pub const fn of(dir: Direction) -> Self {
        Self::from_bits_retain(1 << dir.index())
    }

    #[inline]
    pub const fn has(self, dir: Direction) -> bool {
        self.contains(Self::of(dir))
    }

    #[inline]
    pub fn set_dir(&mut self, dir: Direction, visible: bool) {
        self.set(Self::of(dir), visible);
    }

    /// Number of visible faces.
    #[inline]
    pub const fn count(self) -> usize {
        self.bits().count_ones() as usize
    }

    /// Visible directions in wire-index order.
    pub fn directions(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |dir| self.has(*dir))
    }
}

impl From<Direction> for FaceSet {
    fn from(dir: Direction) -> Self {
        Self::of(dir)
    }
}

/// State of one occupied cell.
///
/// The owning chunk is not referenced; it is found again through
/// `pos.chunk_pos()` when needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockState {
    pub kind: BlockId,
    pub pos: BlockPos,
    pub faces: FaceSet,
    /// Accumulator slot per direction, `None` while the face has no geometry.
    pub slots: [Option<usize>; 6],
}

impl BlockState {
    pub const fn new(kind: BlockId, pos: BlockPos, faces: FaceSet) -> Self {
        Self {
            kind,
            pos,
            faces,
            slots: [None; 6],
        }
    }

    /// Transient state reported for positions that hold nothing.
    pub const fn air(pos: BlockPos) -> Self {
        Self::new(BlockId::AIR, pos, FaceSet::empty())
    }

    #[inline]
    pub const fn is_air(&self) -> bool {
        self.kind.is_air()
    }

    #[inline]
    pub const fn is_face_visible(&self, dir: Direction) -> bool {
        self.faces.has(dir)
    }

    #[inline]
    pub const fn slot(&self, dir: Direction) -> Option<usize> {
        self.slots[dir.index()]
    }
}

/// Storage the face algorithm runs against.
///
/// Implemented by a single chunk grid (neighbours outside the column read as
/// air) and by the level (neighbours resolved across chunk seams).
pub trait BlockWorld {
    /// Kind stored at `pos`, air when unset.
    fn block_at(&self, pos: BlockPos) -> BlockId;

    /// Lowest block layer; DOWN faces on it never show.
    fn min_height(&self) -> i32;

    /// Remove whatever is stored at `pos`, releasing its face geometry.
    fn remove_state(&mut self, pos: BlockPos) -> Option<BlockState>;

    /// Store a freshly placed block, allocating geometry for its visible faces.
    fn insert_state(&mut self, state: BlockState);

    /// Change one face of the block at `pos`. Returns whether anything changed.
    fn set_face(&mut self, pos: BlockPos, dir: Direction, visible: bool) -> bool;
}

/// Faces of a block placed at `pos` given its current neighbours.
pub fn initial_faces<W: BlockWorld + ?Sized>(world: &W, pos: BlockPos) -> FaceSet {
    let mut faces = FaceSet::empty();
    for dir in Direction::ALL {
        if world.block_at(pos.offset(dir, 1)).is_air() {
            faces |= FaceSet::of(dir);
        }
    }
    if pos.y <= world.min_height() {
        faces.remove(FaceSet::DOWN);
    }
    faces
}

/// Replace the block at `pos` with `kind`, keeping every affected face correct.
///
/// Only the cell and its six neighbours are touched.
pub fn place_block<W: BlockWorld + ?Sized>(world: &mut W, pos: BlockPos, kind: BlockId) {
    world.remove_state(pos);

    if kind.is_air() {
        for dir in Direction::ALL {
            let neighbour = pos.offset(dir, 1);
            let toward = dir.opposite();
            let on_floor = toward == Direction::Down && neighbour.y <= world.min_height();
            if world.block_at(neighbour).is_solid() && !on_floor {
                world.set_face(neighbour, toward, true);
            }
        }
        return;
    }

    let faces = initial_faces(world, pos);
    world.insert_state(BlockState::new(kind, pos, faces));

    for dir in Direction::ALL {
        let neighbour = pos.offset(dir, 1);
        if world.block_at(neighbour).is_solid() {
            world.set_face(neighbour, dir.opposite(), false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_set_matches_direction_index() {
        for dir in Direction::ALL {
            assert_eq!(FaceSet::of(dir).bits(), 1 << dir.index());
        }
        let set = FaceSet::UP | FaceSet::WEST;
        assert_eq!(set.count(), 2);
        assert_eq!(
            set.directions().collect::<Vec<_>>(),
            vec![Direction::Up, Direction::West]
        );
    }

    #[test]
    fn set_dir_toggles() {
        let mut set = FaceSet::all();
        set.set_dir(Direction::Down, false);
        assert!(!set.has(Direction::Down));
        assert_eq!(set.count(), 5);
        set.set_dir(Direction::Down, true);
        assert_eq!(set, FaceSet::all());
    }

    #[test]
    fn air_state_is_empty() {
        let state = BlockState::air(BlockPos::new(1, 2, 3));
        assert!(state.is_air());
        assert!(state.faces.is_empty());
        assert!(state.slots.iter().all(Option::is_none));
    }
}
