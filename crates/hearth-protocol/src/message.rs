//! Typed messages on top of [`Frame`].
//!
//! Inbound frames become a [`ClientMessage`] (the only things a client is
//! allowed to say). Outbound frames are built with the `Frame::*`
//! constructors below so every payload layout lives in one place.

use serde::Serialize;

use crate::{Channel, Frame, PlayerId, ProtocolError, Vector};

/// Fixed width of a display name on the wire, null-padded.
pub const NAME_WIDTH: usize = 16;

/// Size of a Destination payload: two `f32`s.
const DESTINATION_LEN: usize = 8;

/// Size of a Position / PlayerConnected payload: identity + two `f32`s.
const POSITION_LEN: usize = 12;

/// A message a client may send.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Raw chat text.
    Chat(Vec<u8>),
    /// Where the player wants to walk to.
    Destination(Vector),
    /// Ask for a place in the room.
    JoinRoom,
}

/// A client message tagged with the identity of the session that read it.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub player_id: PlayerId,
    pub message: ClientMessage,
}

impl TryFrom<Frame> for ClientMessage {
    type Error = ProtocolError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        match frame.channel {
            Channel::Chat => Ok(Self::Chat(frame.payload)),
            Channel::Destination => {
                decode_destination(&frame.payload).map(Self::Destination)
            }
            Channel::JoinRoom => Ok(Self::JoinRoom),
            Channel::Position
            | Channel::PlayerData
            | Channel::PlayerConnected
            | Channel::PlayerDisconnected
            | Channel::RoomJoined
            | Channel::RoomRejected => {
                Err(ProtocolError::UnexpectedChannel(frame.channel))
            }
        }
    }
}

fn decode_destination(payload: &[u8]) -> Result<Vector, ProtocolError> {
    let bytes: &[u8; DESTINATION_LEN] = payload.try_into().map_err(|_| {
        ProtocolError::MalformedFrame(format!(
            "destination payload must be {DESTINATION_LEN} bytes, got {}",
            payload.len()
        ))
    })?;
    let v = read_vector(bytes);
    if !v.is_finite() {
        return Err(ProtocolError::MalformedFrame(
            "destination is not a finite point".into(),
        ));
    }
    Ok(v)
}

fn read_vector(bytes: &[u8; DESTINATION_LEN]) -> Vector {
    let (x, y) = bytes.split_at(4);
    let x = f32::from_le_bytes([x[0], x[1], x[2], x[3]]);
    let y = f32::from_le_bytes([y[0], y[1], y[2], y[3]]);
    Vector::new(f64::from(x), f64::from(y))
}

fn write_vector(buf: &mut Vec<u8>, v: Vector) {
    buf.extend_from_slice(&(v.x as f32).to_le_bytes());
    buf.extend_from_slice(&(v.y as f32).to_le_bytes());
}

fn id_and_vector(id: PlayerId, v: Vector) -> Vec<u8> {
    let mut buf = Vec::with_capacity(POSITION_LEN);
    buf.extend_from_slice(&id.to_le_bytes());
    write_vector(&mut buf, v);
    buf
}

/// Copies `name` into a null-padded fixed-width field, truncating bytes
/// beyond [`NAME_WIDTH`].
pub fn pad_name(name: &str) -> [u8; NAME_WIDTH] {
    let mut out = [0u8; NAME_WIDTH];
    let bytes = name.as_bytes();
    let n = bytes.len().min(NAME_WIDTH);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Parses a Position or PlayerConnected payload.
pub fn parse_position(
    payload: &[u8],
) -> Result<(PlayerId, Vector), ProtocolError> {
    let bytes: &[u8; POSITION_LEN] = payload.try_into().map_err(|_| {
        ProtocolError::MalformedFrame(format!(
            "position payload must be {POSITION_LEN} bytes, got {}",
            payload.len()
        ))
    })?;
    let (id, rest) = bytes.split_at(4);
    let id = PlayerId::from_le_bytes([id[0], id[1], id[2], id[3]]);
    let mut xy = [0u8; DESTINATION_LEN];
    xy.copy_from_slice(rest);
    Ok((id, read_vector(&xy)))
}

/// Why a room join was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RoomRejection {
    Full = 1,
    AlreadyJoined = 2,
}

impl RoomRejection {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl Frame {
    /// Chat relay: the sender's padded name followed by the original text.
    pub fn chat(sender_name: &str, text: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(NAME_WIDTH + text.len());
        payload.extend_from_slice(&pad_name(sender_name));
        payload.extend_from_slice(text);
        Self::new(Channel::Chat, payload)
    }

    /// A player's current position.
    pub fn position(id: PlayerId, position: Vector) -> Self {
        Self::new(Channel::Position, id_and_vector(id, position))
    }

    /// JSON snapshot sent to a player right after login.
    ///
    /// # Errors
    /// [`ProtocolError::Encode`] if the snapshot can't be serialized.
    pub fn player_data<T: Serialize>(
        snapshot: &T,
    ) -> Result<Self, ProtocolError> {
        let json = serde_json::to_vec(snapshot).map_err(ProtocolError::Encode)?;
        Ok(Self::new(Channel::PlayerData, json))
    }

    /// Presence: a player came online at `position`.
    pub fn player_connected(id: PlayerId, position: Vector) -> Self {
        Self::new(Channel::PlayerConnected, id_and_vector(id, position))
    }

    /// Presence: a player's session ended.
    pub fn player_disconnected(id: PlayerId) -> Self {
        Self::new(Channel::PlayerDisconnected, id.to_le_bytes().to_vec())
    }

    /// A player was admitted to the room.
    pub fn room_joined(id: PlayerId, name: &str) -> Self {
        let mut payload = Vec::with_capacity(4 + NAME_WIDTH);
        payload.extend_from_slice(&id.to_le_bytes());
        payload.extend_from_slice(&pad_name(name));
        Self::new(Channel::RoomJoined, payload)
    }

    /// A room join was refused.
    pub fn room_rejected(reason: RoomRejection) -> Self {
        Self::new(Channel::RoomRejected, vec![reason.code()])
    }
}
