//! World positions and chunk addressing.

use crate::DimensionId;
use serde::{Deserialize, Serialize};

/// Width of a chunk column in blocks.
pub const CHUNK_SIZE: i32 = 16;

/// A continuous position in a dimension's block coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPos {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl WorldPos {
    /// Create a new position.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Centre of the block at integer coordinates.
    pub fn block_centre(x: i32, y: i32, z: i32) -> Self {
        Self::new(f64::from(x) + 0.5, f64::from(y) + 0.5, f64::from(z) + 0.5)
    }

    /// Squared straight-line distance to `other`.
    pub fn distance_squared(&self, other: &WorldPos) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Chunk column containing this position.
    pub fn chunk(&self) -> ChunkPos {
        ChunkPos::containing(self.x.floor() as i32, self.z.floor() as i32)
    }
}

/// Chunk column coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    /// Chunk X.
    pub x: i32,
    /// Chunk Z.
    pub z: i32,
}

impl ChunkPos {
    /// Create a new chunk position.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the block column at `(block_x, block_z)`.
    pub fn containing(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x.div_euclid(CHUNK_SIZE),
            z: block_z.div_euclid(CHUNK_SIZE),
        }
    }

    /// Chebyshev distance in chunks.
    pub fn chebyshev_distance(&self, other: &ChunkPos) -> u32 {
        let dx = (i64::from(self.x) - i64::from(other.x)).unsigned_abs();
        let dz = (i64::from(self.z) - i64::from(other.z)).unsigned_abs();
        dx.max(dz).min(u64::from(u32::MAX)) as u32
    }
}

/// A chunk within a specific dimension; the unit of tracking subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkAddress {
    /// Dimension the chunk lives in.
    pub dimension: DimensionId,
    /// Chunk column.
    pub chunk: ChunkPos,
}

impl ChunkAddress {
    /// Create a new chunk address.
    pub const fn new(dimension: DimensionId, chunk: ChunkPos) -> Self {
        Self { dimension, chunk }
    }

    /// Chunk address of a world position.
    pub fn of(dimension: DimensionId, pos: &WorldPos) -> Self {
        Self::new(dimension, pos.chunk())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_containing_handles_negative_blocks() {
        assert_eq!(ChunkPos::containing(0, 15), ChunkPos::new(0, 0));
        assert_eq!(ChunkPos::containing(16, -1), ChunkPos::new(1, -1));
        assert_eq!(ChunkPos::containing(-16, -17), ChunkPos::new(-1, -2));
    }

    #[test]
    fn world_pos_chunk_floors() {
        assert_eq!(WorldPos::new(-0.5, 64.0, 31.9).chunk(), ChunkPos::new(-1, 1));
    }

    #[test]
    fn distance_squared_is_euclidean() {
        let a = WorldPos::new(0.0, 0.0, 0.0);
        let b = WorldPos::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance_squared(&b), 25.0);
    }

    #[test]
    fn chebyshev_distance_takes_max_axis() {
        let a = ChunkPos::new(0, 0);
        assert_eq!(a.chebyshev_distance(&ChunkPos::new(3, -5)), 5);
        assert_eq!(a.chebyshev_distance(&a), 0);
    }
}
