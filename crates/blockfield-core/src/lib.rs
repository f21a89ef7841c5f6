//! Core types for the Blockfield voxel client.
//!
//! This crate provides the foundational value types used throughout the client:
//! - Coordinate systems (block, chunk, chunk-local)
//! - Face directions and axes
//! - Axis-aligned boxes for containment queries
//! - Block identifiers
//! - Common error types

pub mod coords;
pub mod direction;
pub mod error;
pub mod math;
pub mod types;

pub use coords::{BlockPos, ChunkPos, LocalPos};
pub use direction::{Axis, Direction};
pub use error::{Error, Result};
pub use math::Aabb;
pub use types::BlockId;

/// Client-wide constants
pub mod constants {
    /// Horizontal size of a chunk column in blocks per axis
    pub const CHUNK_SIZE: i32 = 16;
    /// Bits needed to represent a horizontal position within a chunk (4 bits for 0-15)
    pub const CHUNK_BITS: u32 = 4;
    /// Default vertical depth of a chunk column
    pub const DEFAULT_CHUNK_DEPTH: i32 = 384;
    /// Default lowest block layer of the world
    pub const DEFAULT_MIN_HEIGHT: i32 = 0;
    /// Edge length of a block
    pub const BLOCK_SIZE: f32 = 1.0;
}
