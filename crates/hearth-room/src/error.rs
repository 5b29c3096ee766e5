//! Error types for the room layer.

use hearth_protocol::{PlayerId, RoomRejection};

/// Why a join was refused. The room is unchanged in both cases.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room already holds `max_players` members.
    #[error("room is full ({0} players)")]
    RoomFull(usize),

    /// The player is already a member.
    #[error("player {0} is already in the room")]
    AlreadyJoined(PlayerId),
}

impl RoomError {
    /// The wire reason sent back to the player.
    pub fn rejection(&self) -> RoomRejection {
        match self {
            Self::RoomFull(_) => RoomRejection::Full,
            Self::AlreadyJoined(_) => RoomRejection::AlreadyJoined,
        }
    }
}
