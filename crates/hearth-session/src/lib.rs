//! Session layer for Hearth.
//!
//! This crate owns everything between an accepted connection and the
//! dispatch loop:
//!
//! 1. **Authentication** ([`Credential`], [`Authenticator`],
//!    [`TokenStore`]) decides whether a connection may become a session.
//! 2. **The hub** ([`Hub`]) records the one live session per identity and
//!    fans frames out to their outbound queues.
//! 3. **The pumps** ([`spawn_pumps`]) run the inbound and outbound loops of
//!    each session.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)     ← admits connections, runs the dispatch loop
//!     ↕
//! Session (this crate) ← hub, pumps, auth
//!     ↕
//! Protocol / Transport (below) ← frames, connections
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod hub;
mod pump;
mod session;

pub use auth::{
    Authenticator, Credential, MemoryTokenStore, TokenAuthenticator,
    TokenStore,
};
pub use error::SessionError;
pub use hub::Hub;
pub use pump::{PumpHandles, spawn_pumps};
pub use session::{SessionConfig, SessionHandle, outbound_queue};
