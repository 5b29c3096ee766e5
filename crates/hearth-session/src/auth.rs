//! Authentication hooks for admitting a connection.
//!
//! Hearth doesn't issue credentials. A client presents `"<id>:<token>"` in
//! the `authorization` header of its upgrade request; the server parses it
//! into a [`Credential`] and asks an [`Authenticator`] whether it is valid.
//!
//! The stock authenticator, [`TokenAuthenticator`], compares the presented
//! token with whatever a [`TokenStore`] holds for that identity. Production
//! deployments back the store with their account database;
//! [`MemoryTokenStore`] covers development and tests.

use std::collections::HashMap;
use std::future::Future;

use hearth_protocol::PlayerId;
use tokio::sync::RwLock;

use crate::SessionError;

/// A parsed `"<id>:<token>"` credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub player_id: PlayerId,
    pub token: String,
}

impl Credential {
    /// Parses the raw `authorization` header value.
    ///
    /// # Errors
    /// [`SessionError::Unauthorized`] if there is no `:` separator, the id
    /// is not an unsigned 32-bit number, or the token is empty.
    pub fn parse(header: &str) -> Result<Self, SessionError> {
        let (id, token) = header.split_once(':').ok_or_else(|| {
            SessionError::Unauthorized("expected <id>:<token>".into())
        })?;
        let id: u32 = id.trim().parse().map_err(|_| {
            SessionError::Unauthorized(format!("invalid player id {id:?}"))
        })?;
        if token.is_empty() {
            return Err(SessionError::Unauthorized("empty token".into()));
        }
        Ok(Self {
            player_id: PlayerId(id),
            token: token.to_owned(),
        })
    }
}

/// Decides whether a credential may open a session.
pub trait Authenticator: Send + Sync + 'static {
    /// Returns `Ok(())` if the credential is valid.
    ///
    /// # Errors
    /// - [`SessionError::Unauthorized`] for a wrong or unknown credential
    /// - [`SessionError::Store`] if the backing store failed
    fn verify(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// Looks up the current token issued to an identity.
pub trait TokenStore: Send + Sync + 'static {
    /// Returns the stored token, or `None` if the identity has none. Absence
    /// is not an error.
    fn get(
        &self,
        player_id: PlayerId,
    ) -> impl Future<Output = Result<Option<String>, SessionError>> + Send;
}

/// An [`Authenticator`] that compares against a [`TokenStore`].
#[derive(Debug)]
pub struct TokenAuthenticator<S> {
    store: S,
}

impl<S: TokenStore> TokenAuthenticator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: TokenStore> Authenticator for TokenAuthenticator<S> {
    async fn verify(&self, credential: &Credential) -> Result<(), SessionError> {
        match self.store.get(credential.player_id).await? {
            Some(token) if token == credential.token => Ok(()),
            Some(_) => Err(SessionError::Unauthorized("token mismatch".into())),
            None => Err(SessionError::Unauthorized(format!(
                "no token for player {}",
                credential.player_id
            ))),
        }
    }
}

/// In-memory [`TokenStore`].
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<PlayerId, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or replaces) the token for an identity.
    pub async fn insert(&self, player_id: PlayerId, token: impl Into<String>) {
        self.tokens.write().await.insert(player_id, token.into());
    }
}

impl FromIterator<(PlayerId, String)> for MemoryTokenStore {
    fn from_iter<I: IntoIterator<Item = (PlayerId, String)>>(iter: I) -> Self {
        Self {
            tokens: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    async fn get(
        &self,
        player_id: PlayerId,
    ) -> Result<Option<String>, SessionError> {
        Ok(self.tokens.read().await.get(&player_id).cloned())
    }
}
