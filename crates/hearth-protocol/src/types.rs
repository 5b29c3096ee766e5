//! Identity types shared by every layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for a player.
///
/// Newtype over `u32`: the wire format carries identities as 4 little-endian
/// bytes, so the in-memory type is the same width. `#[serde(transparent)]`
/// keeps it a bare number in JSON snapshots.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl PlayerId {
    /// Little-endian wire encoding.
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Decodes a little-endian wire identity.
    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}
