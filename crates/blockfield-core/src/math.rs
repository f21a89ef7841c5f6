//! Axis-aligned boxes for containment queries.

use glam::Vec3;

use crate::coords::BlockPos;
use crate::direction::{Axis, Direction};

/// Axis-Aligned Bounding Box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Create an AABB spanning two opposite corners in any order
    #[inline]
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Box occupied by a single block
    #[inline]
    pub fn unit_block(pos: BlockPos) -> Self {
        let min = pos.to_vec3();
        Self {
            min,
            max: min + Vec3::ONE,
        }
    }

    /// Get the center of the AABB
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size of the AABB
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Check if a point is inside the AABB
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Check if this AABB intersects another
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Move the box by `delta`
    #[inline]
    pub fn translate(&self, delta: Vec3) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    /// Flat box covering the side of this box that faces `dir`.
    pub fn face(&self, dir: Direction) -> Self {
        let (mut min, mut max) = (self.min, self.max);
        let positive = dir.is_positive();
        match dir.axis() {
            Axis::X => {
                let x = if positive { self.max.x } else { self.min.x };
                min.x = x;
                max.x = x;
            }
            Axis::Y => {
                let y = if positive { self.max.y } else { self.min.y };
                min.y = y;
                max.y = y;
            }
            Axis::Z => {
                let z = if positive { self.max.z } else { self.min.z };
                min.z = z;
                max.z = z;
            }
        }
        Self { min, max }
    }

    /// Every block position the box overlaps.
    pub fn blocks(&self) -> impl Iterator<Item = BlockPos> {
        let lo = BlockPos::containing(self.min);
        let hi = BlockPos::containing(self.max);
        (lo.x..=hi.x).flat_map(move |x| {
            (lo.y..=hi.y).flat_map(move |y| (lo.z..=hi.z).map(move |z| BlockPos::new(x, y, z)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_corners() {
        let aabb = Aabb::new(Vec3::new(1.0, 0.0, 2.0), Vec3::new(0.0, 1.0, -1.0));
        assert_eq!(aabb.min, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn aabb_contains_point() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.contains_point(Vec3::splat(0.5)));
        assert!(aabb.contains_point(Vec3::ZERO));
        assert!(aabb.contains_point(Vec3::ONE));
        assert!(!aabb.contains_point(Vec3::new(2.0, 0.5, 0.5)));
    }

    #[test]
    fn aabb_intersects() {
        let a = Aabb::unit_block(BlockPos::new(0, 0, 0));
        let b = a.translate(Vec3::new(0.5, 0.5, 0.5));
        let c = a.translate(Vec3::new(2.0, 0.0, 0.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn face_is_flat_on_the_right_side() {
        let aabb = Aabb::unit_block(BlockPos::new(2, 3, 4));
        let up = aabb.face(Direction::Up);
        assert_eq!(up.min.y, 4.0);
        assert_eq!(up.max.y, 4.0);
        let north = aabb.face(Direction::North);
        assert_eq!(north.min.z, 4.0);
        assert_eq!(north.max.z, 4.0);
        let east = aabb.face(Direction::East);
        assert_eq!(east.min.x, 3.0);
        assert_eq!(east.size().x, 0.0);
    }

    #[test]
    fn blocks_covers_overlap() {
        let aabb = Aabb::new(Vec3::new(0.2, 0.2, 0.2), Vec3::new(1.5, 0.8, 0.8));
        let blocks: Vec<_> = aabb.blocks().collect();
        assert_eq!(blocks, vec![BlockPos::new(0, 0, 0), BlockPos::new(1, 0, 0)]);
    }
}
