//! Per-connection admission: credential check, registration, and the login
//! burst.
//!
//! Each accepted peer gets its own Tokio task running this handler.
//! The flow is:
//!   1. Read the upgrade request and parse its `authorization` header
//!   2. Refuse identities that are already online, then verify the token
//!   3. Load the player (memory first, then the store)
//!   4. Register the session in the hub, then complete the upgrade
//!   5. Write the login frames and start the session pumps
//!
//! Any refusal before step 4 completes is answered with `401` before the
//! upgrade and leaves no state behind.

use std::sync::Arc;

use hearth_protocol::Frame;
use hearth_session::{Authenticator, Credential, SessionError, outbound_queue, spawn_pumps};
use hearth_transport::{Connection, Handshake, TransportError, Upgrade};
use hearth_world::{PlayerSeed, PlayerStore};

use crate::HearthError;
use crate::server::ServerState;

/// Handles a single peer from its upgrade request until its pumps are
/// running.
pub(crate) async fn handle_connection<U, A, S>(
    mut upgrade: U,
    state: Arc<ServerState<A, S>>,
) -> Result<(), HearthError>
where
    U: Upgrade<Error = TransportError>,
    A: Authenticator,
    S: PlayerStore,
{
    let conn_id = upgrade.id();
    let peer_addr = upgrade.peer_addr();
    let handshake = upgrade.read_request().await?;
    tracing::debug!(%conn_id, %peer_addr, "upgrade requested");

    let seed = match admit(&handshake, &state).await {
        Ok(seed) => seed,
        Err(e) => {
            tracing::info!(%conn_id, %peer_addr, error = %e, "connection refused");
            upgrade.refuse().await?;
            return Err(e);
        }
    };
    let player_id = seed.id;

    let (handle, outbound_rx) =
        outbound_queue(conn_id, state.session_config.outbound_capacity);
    if let Err(e) = state.hub.register(player_id, handle).await {
        // Lost a race with another login of the same identity.
        tracing::info!(%conn_id, %player_id, error = %e, "connection refused");
        upgrade.refuse().await?;
        return Err(e.into());
    }

    let conn = match upgrade.accept(state.session_config.max_frame_size).await {
        Ok(conn) => conn,
        Err(e) => {
            state.hub.release(player_id, conn_id).await;
            return Err(e.into());
        }
    };

    let player = state.players.ensure(seed).await;
    state.players.clear_destination(player_id).await;

    // Written straight to the socket; the outbound queue only holds the
    // broadcasts that arrive meanwhile.
    let mut burst = match Frame::player_data(&player) {
        Ok(frame) => vec![frame],
        Err(e) => {
            state.hub.release(player_id, conn_id).await;
            return Err(e.into());
        }
    };
    state
        .hub
        .broadcast_all_except(&Frame::player_connected(player_id, player.position), player_id)
        .await;
    burst.extend(state.players.login_positions(player_id, &state.hub).await);

    for frame in &burst {
        let sent = tokio::time::timeout(
            state.session_config.write_wait,
            conn.send(&frame.encode()),
        )
        .await;
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                state.hub.release(player_id, conn_id).await;
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(%conn_id, %player_id, "login burst write deadline expired");
                state.hub.release(player_id, conn_id).await;
                return Err(TransportError::Send("login burst timed out".into()).into());
            }
        }
    }

    tracing::info!(
        %conn_id,
        %player_id,
        name = %player.name,
        positions = burst.len() - 1,
        "player connected"
    );

    spawn_pumps(
        conn,
        player_id,
        outbound_rx,
        state.hub.clone(),
        state.inbound_tx.clone(),
        &state.session_config,
    );
    Ok(())
}

/// Decides whether the upgrade may become a session and returns the
/// player to track. Touches no shared state.
async fn admit<A, S>(
    handshake: &Handshake,
    state: &ServerState<A, S>,
) -> Result<PlayerSeed, HearthError>
where
    A: Authenticator,
    S: PlayerStore,
{
    let header = handshake
        .authorization
        .as_deref()
        .ok_or_else(|| SessionError::Unauthorized("missing authorization header".into()))?;
    let credential = Credential::parse(header)?;
    let player_id = credential.player_id;

    if state.hub.is_online(player_id).await {
        return Err(SessionError::DuplicateIdentity(player_id).into());
    }
    state.auth.verify(&credential).await?;

    // A player who reconnects before the next flush keeps its in-memory
    // position.
    if let Some(tracked) = state.players.snapshot(player_id).await {
        return Ok(tracked.into());
    }
    let record = state.store.load_player(player_id).await?;
    Ok(PlayerSeed::from_record(player_id, record))
}
