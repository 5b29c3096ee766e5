//! Authoritative player state for Hearth.
//!
//! - [`PlayerManager`]: positions, destinations, the movement tick, and
//!   the periodic flush to storage.
//! - [`PlayerStore`]: where positions are persisted and names come from.
//!
//! Player state and sessions are separate tables joined only by
//! [`PlayerId`](hearth_protocol::PlayerId). A player stays tracked after its
//! session ends until the next flush has saved it.

#![allow(async_fn_in_trait)]

mod players;
mod store;

pub use players::{FlushReport, PlayerManager, PlayerSeed, PlayerState};
pub use store::{MemoryPlayerStore, PlayerRecord, PlayerStore, StoreError};
