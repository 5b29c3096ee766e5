//! Wire protocol for Hearth.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Identity** ([`PlayerId`]): the fixed-width key every other layer
//!   uses to correlate sessions and player state.
//! - **Frames** ([`Frame`], [`Channel`]): a 2-byte little-endian channel
//!   tag followed by an opaque payload.
//! - **Messages** ([`ClientMessage`], [`Inbound`]): the closed set of
//!   things a client may send, plus constructors for every frame the
//!   server sends back.
//! - **Vector math** ([`Vector`]): positions and movement stepping.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and session
//! (player identity). It doesn't know about connections, locks, or tasks.
//!
//! ```text
//! Transport (bytes) → Protocol (Frame / ClientMessage) → Session (hub, pumps)
//! ```

mod error;
mod frame;
mod message;
mod types;
mod vector;

pub use error::ProtocolError;
pub use frame::{Channel, Frame, TAG_LEN};
pub use message::{
    ClientMessage, Inbound, NAME_WIDTH, RoomRejection, pad_name,
    parse_position,
};
pub use types::PlayerId;
pub use vector::Vector;
