//! The single dispatch loop that applies client messages.
//!
//! Every session reader feeds one bounded queue; this loop drains it in
//! arrival order, so messages from one player are applied in the order
//! they were read.

use std::sync::Arc;

use hearth_protocol::{ClientMessage, Frame, Inbound, PlayerId};
use hearth_room::Joined;
use hearth_session::Authenticator;
use hearth_world::PlayerStore;
use tokio::sync::{mpsc, watch};

use crate::server::ServerState;

pub(crate) async fn dispatch_loop<A: Authenticator, S: PlayerStore>(
    state: Arc<ServerState<A, S>>,
    mut inbound_rx: mpsc::Receiver<Inbound>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let inbound = tokio::select! {
            _ = stop.changed() => break,
            inbound = inbound_rx.recv() => match inbound {
                Some(inbound) => inbound,
                None => break,
            },
        };
        dispatch(&state, inbound).await;
    }
    tracing::debug!("dispatch loop stopped");
}

/// Applies one message.
pub(crate) async fn dispatch<A: Authenticator, S: PlayerStore>(
    state: &ServerState<A, S>,
    inbound: Inbound,
) {
    let Inbound { player_id, message } = inbound;
    match message {
        ClientMessage::Chat(text) => relay_chat(state, player_id, &text).await,
        ClientMessage::Destination(destination) => {
            if !state.players.set_destination(player_id, destination).await {
                tracing::debug!(%player_id, "destination for untracked player ignored");
            }
        }
        ClientMessage::JoinRoom => join_room(state, player_id).await,
    }
}

async fn relay_chat<A: Authenticator, S: PlayerStore>(
    state: &ServerState<A, S>,
    player_id: PlayerId,
    text: &[u8],
) {
    let Some(sender) = state.players.snapshot(player_id).await else {
        tracing::debug!(%player_id, "chat from untracked player dropped");
        return;
    };
    tracing::debug!(%player_id, len = text.len(), "chat");
    state.hub.broadcast_all(&Frame::chat(&sender.name, text)).await;
}

async fn join_room<A: Authenticator, S: PlayerStore>(state: &ServerState<A, S>, player_id: PlayerId) {
    let name = state
        .players
        .snapshot(player_id)
        .await
        .map(|p| p.name)
        .unwrap_or_default();

    match state.room.join(player_id, name).await {
        Ok(Joined { member, earlier }) => {
            // The newcomer sees the roster in join order, ending with itself.
            for existing in &earlier {
                state
                    .hub
                    .broadcast_to(member.id, &Frame::room_joined(existing.id, &existing.name))
                    .await;
            }
            let mut members: Vec<PlayerId> = earlier.iter().map(|m| m.id).collect();
            members.push(member.id);
            state
                .hub
                .broadcast_to_set(&members, &Frame::room_joined(member.id, &member.name))
                .await;
        }
        Err(e) => {
            tracing::info!(%player_id, error = %e, "room join refused");
            state
                .hub
                .broadcast_to(player_id, &Frame::room_rejected(e.rejection()))
                .await;
        }
    }
}
