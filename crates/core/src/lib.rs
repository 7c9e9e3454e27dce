#![warn(missing_docs)]
//! Core primitives shared across the workspace.

pub mod computer;
pub mod dimension;
pub mod position;

// Re-export commonly used types
pub use computer::{ComputerFamily, ComputerId, ComputerState, UnknownComputerState};
pub use dimension::DimensionId;
pub use position::{ChunkAddress, ChunkPos, WorldPos, CHUNK_SIZE};
