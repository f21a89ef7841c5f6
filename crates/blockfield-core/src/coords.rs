//! Coordinate systems for the block world.

use std::fmt;
use std::str::FromStr;

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::constants::{CHUNK_BITS, CHUNK_SIZE};
use crate::direction::Direction;
use crate::error::{Error, Result};
use crate::math::Aabb;

/// Integer position of a single block in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    /// Create a new block position
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Block containing a continuous world position.
    ///
    /// Non-finite input is an upstream bug and aborts.
    #[inline]
    pub fn containing(pos: Vec3) -> Self {
        assert!(
            pos.is_finite(),
            "vector not fully defined: {}, {}, {}",
            pos.x,
            pos.y,
            pos.z
        );
        Self::new(
            pos.x.floor() as i32,
            pos.y.floor() as i32,
            pos.z.floor() as i32,
        )
    }

    /// Checked variant of [`BlockPos::containing`].
    pub fn try_containing(pos: Vec3) -> Result<Self> {
        if pos.is_finite() {
            Ok(Self::containing(pos))
        } else {
            Err(Error::MalformedCoordinate {
                x: pos.x,
                y: pos.y,
                z: pos.z,
            })
        }
    }

    #[inline]
    pub const fn relative(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    #[inline]
    pub const fn above(self, amount: i32) -> Self {
        self.relative(0, amount, 0)
    }

    #[inline]
    pub const fn below(self, amount: i32) -> Self {
        self.relative(0, -amount, 0)
    }

    /// Step `amount` blocks in `dir`.
    #[inline]
    pub const fn offset(self, dir: Direction, amount: i32) -> Self {
        let d = dir.offset();
        self.relative(d.x * amount, d.y * amount, d.z * amount)
    }

    /// Get the chunk column containing this position
    #[inline]
    pub const fn chunk_pos(self) -> ChunkPos {
        ChunkPos::new(self.x >> CHUNK_BITS, self.z >> CHUNK_BITS)
    }

    /// Get the position relative to the owning chunk's origin
    #[inline]
    pub const fn local_pos(self) -> LocalPos {
        let mask = CHUNK_SIZE - 1;
        LocalPos::new((self.x & mask) as u8, self.y, (self.z & mask) as u8)
    }

    /// Unit box occupied by this block.
    #[inline]
    pub fn aabb(self) -> Aabb {
        Aabb::unit_block(self)
    }

    #[inline]
    pub const fn to_ivec3(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }

    #[inline]
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    /// Stable string key.
    pub fn key(self) -> String {
        format!("B{}={}={}", self.x, self.y, self.z)
    }
}

impl From<IVec3> for BlockPos {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Position of a block relative to its chunk's origin.
///
/// Horizontal components are in `0..CHUNK_SIZE`; the vertical component
/// is the world Y unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalPos {
    pub x: u8,
    pub y: i32,
    pub z: u8,
}

impl LocalPos {
    /// Create a new local position
    #[inline]
    pub const fn new(x: u8, y: i32, z: u8) -> Self {
        debug_assert!((x as i32) < CHUNK_SIZE);
        debug_assert!((z as i32) < CHUNK_SIZE);
        Self { x, y, z }
    }

    /// Whether this position lies on the chunk border facing `dir`.
    #[inline]
    pub const fn on_border(self, dir: Direction) -> bool {
        match dir {
            Direction::West => self.x == 0,
            Direction::East => self.x as i32 == CHUNK_SIZE - 1,
            Direction::North => self.z == 0,
            Direction::South => self.z as i32 == CHUNK_SIZE - 1,
            Direction::Up | Direction::Down => false,
        }
    }
}

/// Chunk column position in chunk coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    /// Create a new chunk position
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    #[inline]
    pub const fn relative(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }

    /// World position of the chunk's lowest corner at `y`.
    #[inline]
    pub const fn origin(self, y: i32) -> BlockPos {
        BlockPos::new(self.x << CHUNK_BITS, y, self.z << CHUNK_BITS)
    }

    /// World position of a local position inside this chunk.
    #[inline]
    pub const fn to_world(self, local: LocalPos) -> BlockPos {
        BlockPos::new(
            (self.x << CHUNK_BITS) + local.x as i32,
            local.y,
            (self.z << CHUNK_BITS) + local.z as i32,
        )
    }

    /// Whether `pos` lies in this column.
    #[inline]
    pub const fn contains(self, pos: BlockPos) -> bool {
        let c = pos.chunk_pos();
        c.x == self.x && c.z == self.z
    }

    /// Ring index of `other` around `self`.
    #[inline]
    pub const fn chebyshev_distance(self, other: Self) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dz = (self.z - other.z).unsigned_abs();
        if dx > dz {
            dx
        } else {
            dz
        }
    }

    /// Stable string key, `"<x>=<z>"`.
    pub fn key(self) -> String {
        format!("{}={}", self.x, self.z)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.x, self.z)
    }
}

impl FromStr for ChunkPos {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (x, z) = s
            .split_once('=')
            .ok_or_else(|| Error::InvalidData(format!("chunk key without separator: {s:?}")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<i32>()
                .map_err(|e| Error::InvalidData(format!("chunk key {s:?}: {e}")))
        };
        Ok(Self::new(parse(x)?, parse(z)?))
    }
}
