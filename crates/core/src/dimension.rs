//! Dimension identifiers.
//!
//! Every world position that reaches the network layer is dimension-scoped:
//! radius and tracking delivery only ever consider peers standing in the same
//! dimension as the origin. Datapacks may add dimensions beyond the vanilla
//! three, so the identifier is an open numeric id rather than a closed enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a world dimension.
///
/// This is intentionally small (u16) for efficient network encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DimensionId(pub u16);

impl DimensionId {
    /// The Overworld dimension.
    pub const OVERWORLD: Self = Self(0);
    /// The Nether dimension.
    pub const NETHER: Self = Self(1);
    /// The End dimension.
    pub const END: Self = Self(2);

    /// Default (Overworld) dimension.
    pub const DEFAULT: Self = Self::OVERWORLD;

    /// Parse the canonical key used in configs/logs.
    ///
    /// Vanilla dimensions use their names; anything else is `dim<N>`.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "overworld" => Some(Self::OVERWORLD),
            "nether" => Some(Self::NETHER),
            "end" => Some(Self::END),
            other => other
                .strip_prefix("dim")
                .and_then(|n| n.parse::<u16>().ok())
                .map(Self),
        }
    }
}

impl Default for DimensionId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for DimensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::OVERWORLD => f.write_str("overworld"),
            Self::NETHER => f.write_str("nether"),
            Self::END => f.write_str("end"),
            Self(n) => write!(f, "dim{n}"),
        }
    }
}
