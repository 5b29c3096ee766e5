//! Room configuration.

use serde::{Deserialize, Serialize};

/// Settings for a [`Room`](crate::Room).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Maximum number of members. Joins beyond this are refused.
    pub max_players: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self { max_players: 5 }
    }
}
