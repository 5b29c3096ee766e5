//! The room gate for Hearth.
//!
//! A [`Room`] is a fixed-capacity list of members. Joining is the only
//! mutation; it is refused once the room is full or when the player is
//! already in it. A successful join reports who was there before, so the
//! newcomer can be shown the whole roster.
//!
//! # Key types
//!
//! - [`Room`]: cloneable handle to the shared member list
//! - [`RoomConfig`]: capacity
//! - [`RoomMember`]: identity and display name of a member
//! - [`Joined`]: the new member and the roster it joined
//! - [`RoomError`]: why a join was refused

mod config;
mod error;
mod room;

pub use config::RoomConfig;
pub use error::RoomError;
pub use room::{Joined, Room, RoomMember};
