//! # Hearth
//!
//! Real-time session server for small multiplayer worlds.
//!
//! Clients connect over WebSocket with an `authorization: <id>:<token>`
//! header. Once admitted, a player can chat, set a destination that the
//! server walks it toward on a fixed tick, and ask for a place in the room.
//! Positions are kept in memory and handed to a [`PlayerStore`] on a slow
//! interval.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearth::prelude::*;
//!
//! # async fn start() -> Result<(), HearthError> {
//! let tokens: MemoryTokenStore = [(PlayerId(1), "s3cret".to_string())].into_iter().collect();
//! let server = HearthServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(TokenAuthenticator::new(tokens), MemoryPlayerStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod dispatch;
mod error;
mod handler;
mod logging;
mod server;

pub use config::{
    AccountSettings, ConfigError, HearthConfig, LoggingSettings, ServerSettings,
    SessionSettings, WorldSettings,
};
pub use error::HearthError;
pub use logging::init_logging;
pub use server::{HearthServer, HearthServerBuilder};

/// Everything needed to embed a server.
pub mod prelude {
    pub use crate::{HearthConfig, HearthError, HearthServer, HearthServerBuilder};
    pub use hearth_protocol::{Channel, Frame, PlayerId, Vector};
    pub use hearth_room::RoomConfig;
    pub use hearth_session::{
        Authenticator, Credential, MemoryTokenStore, SessionConfig, SessionError,
        TokenAuthenticator, TokenStore,
    };
    pub use hearth_world::{MemoryPlayerStore, PlayerRecord, PlayerStore, StoreError};
}

// Re-export sub-crates for advanced usage.
pub use hearth_protocol as protocol;
pub use hearth_room as room;
pub use hearth_session as session;
pub use hearth_tick as tick;
pub use hearth_transport as transport;
pub use hearth_world as world;
