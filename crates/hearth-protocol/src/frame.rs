//! Frame codec: the channel tag + payload envelope every message travels in.
//!
//! ```text
//! +----------------+---------------------------+
//! | tag: u16 (LE)  | payload: channel-specific |
//! +----------------+---------------------------+
//! ```
//!
//! Decoding only validates the envelope (length and tag range). Payload
//! shape is checked when a frame is turned into a typed
//! [`ClientMessage`](crate::ClientMessage).

use std::fmt;

use crate::ProtocolError;

/// Width of the channel tag in bytes.
pub const TAG_LEN: usize = 2;

/// The closed set of message channels.
///
/// Adding a channel here forces every `match` on it (dispatch, direction
/// checks) to be revisited at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Channel {
    /// Client→server chat text; rebroadcast with the sender's name.
    Chat = 0,
    /// Server→client: identity + x + y.
    Position = 1,
    /// Server→client on login: JSON player snapshot.
    PlayerData = 2,
    /// Client→server: exactly two little-endian `f32`s.
    Destination = 3,
    /// Server→client presence: identity + x + y.
    PlayerConnected = 4,
    /// Server→client presence: identity.
    PlayerDisconnected = 5,
    /// Client→server request to join the room.
    JoinRoom = 6,
    /// Server→client to room members: identity + padded name.
    RoomJoined = 7,
    /// Server→client: one-byte rejection reason.
    RoomRejected = 8,
}

impl Channel {
    /// Every channel, in tag order.
    pub const ALL: [Channel; 9] = [
        Channel::Chat,
        Channel::Position,
        Channel::PlayerData,
        Channel::Destination,
        Channel::PlayerConnected,
        Channel::PlayerDisconnected,
        Channel::JoinRoom,
        Channel::RoomJoined,
        Channel::RoomRejected,
    ];

    /// The numeric wire tag.
    pub fn tag(self) -> u16 {
        self as u16
    }

    /// Looks up a channel by its wire tag.
    pub fn from_tag(tag: u16) -> Option<Self> {
        Self::ALL.get(usize::from(tag)).copied()
    }
}

impl TryFrom<u16> for Channel {
    type Error = ProtocolError;

    fn try_from(tag: u16) -> Result<Self, Self::Error> {
        Self::from_tag(tag).ok_or(ProtocolError::UnknownChannel(tag))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}({})", self.tag())
    }
}

/// A decoded wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub channel: Channel,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(channel: Channel, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// Serializes the frame. Never fails.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(TAG_LEN + self.payload.len());
        buf.extend_from_slice(&self.channel.tag().to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parses a frame from raw bytes.
    ///
    /// # Errors
    /// - [`ProtocolError::MalformedFrame`] if `data` is shorter than the tag
    /// - [`ProtocolError::UnknownChannel`] if the tag is out of range
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let Some((tag, payload)) = data.split_first_chunk::<TAG_LEN>() else {
            return Err(ProtocolError::MalformedFrame(format!(
                "{} bytes is shorter than the {TAG_LEN}-byte channel tag",
                data.len()
            )));
        };
        let channel = Channel::try_from(u16::from_le_bytes(*tag))?;
        Ok(Self::new(channel, payload))
    }
}
