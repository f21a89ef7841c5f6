//! Block identifiers.

use serde::{Deserialize, Serialize};

/// Stable registry index of a block kind.
///
/// Block ID 0 is reserved for air (empty space). Every position that was
/// never written reads back as air.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct BlockId(pub u16);

impl BlockId {
    /// Air block (empty space)
    pub const AIR: Self = Self(0);
    /// Stone block
    pub const STONE: Self = Self(1);
    /// Grass-topped dirt block
    pub const GRASS_BLOCK: Self = Self(2);
    /// Dirt block
    pub const DIRT: Self = Self(3);

    /// Returns true if this block is air (empty)
    #[inline]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this block is solid (not air)
    #[inline]
    pub const fn is_solid(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_id_air() {
        assert!(BlockId::AIR.is_air());
        assert!(!BlockId::AIR.is_solid());
        assert_eq!(BlockId::default(), BlockId::AIR);
    }

    #[test]
    fn block_id_solid() {
        assert!(!BlockId::STONE.is_air());
        assert!(BlockId::DIRT.is_solid());
        assert!(BlockId::GRASS_BLOCK.is_solid());
    }

    #[test]
    fn serializes_as_bare_index() {
        assert_eq!(serde_json::to_string(&BlockId::DIRT).unwrap(), "3");
    }
}
