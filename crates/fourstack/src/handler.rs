//! Per-connection orchestrator: the read loop, dispatch, and teardown.
//!
//! Each admitted client gets one task running [`handle_client`]. The
//! flow is:
//!
//!   1. Register the connection with the registry
//!   2. Loop: receive → decode → dispatch by message type
//!   3. On EOF/error: route through the disconnect path and drop the
//!      registration
//!
//! Rejected operations are answered with an `error` frame and the
//! connection keeps going; only transport failure ends the loop.

use std::sync::Arc;

use fourstack_protocol::{
    decode_client, ClientRequest, MoveRequest, ReconnectRequest, RoomStatus,
    ServerFrame,
};
use fourstack_registry::ClientHandle;
use fourstack_room::{
    DisconnectOutcome, MoveOutcome, RejoinOutcome, Room, RoomError,
    Settlement,
};
use fourstack_stats::StatsStore;
use fourstack_transport::{AcceptedClient, ClientSender, ConnectionId};
use uuid::Uuid;

use crate::server::Shared;
use crate::{matchmaker, timers};

/// Handles one connection from admission to close.
pub(crate) async fn handle_client<S: StatsStore>(
    client: AcceptedClient,
    shared: Arc<Shared<S>>,
) {
    let conn_id = client.id;
    let username = client.username.clone();
    let (tx, writer, mut reader) = client.into_channel();

    shared.registry.register(
        &username,
        ClientHandle {
            id: conn_id,
            sender: tx.clone(),
        },
    );
    tracing::info!(%conn_id, %username, "client connected");

    loop {
        let text = match reader.recv().await {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::info!(%username, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%username, error = %e, "recv error");
                break;
            }
        };

        let frame = match decode_client(&text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(%username, error = %e, "failed to decode frame");
                continue;
            }
        };

        match ClientRequest::from_frame(&frame) {
            ClientRequest::NewGame => {
                matchmaker::new_game(&shared, &username, &tx).await;
            }
            ClientRequest::GameUpdate(mv) => {
                handle_move(&shared, &username, &tx, &mv).await;
            }
            ClientRequest::Reconnect(req) => {
                handle_reconnect(&shared, &username, &tx, &req).await;
            }
            ClientRequest::Unknown(kind) => {
                tracing::debug!(%username, %kind, "ignoring unknown message type");
            }
        }
    }

    teardown(&shared, conn_id).await;
    writer.abort();
}

/// The disconnect path: room first (it owns the consequences), then
/// the registry entry.
async fn teardown<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    conn_id: ConnectionId,
) {
    // A stale connection (superseded by a reconnect) gets no say.
    let Some(username) = shared.registry.drop_connection(conn_id) else {
        return;
    };
    let Some(room_id) = shared.registry.room_of(&username) else {
        return;
    };
    let Some(room) = shared.rooms.get(room_id) else {
        shared.registry.unbind_room(&username, room_id);
        return;
    };

    match room.disconnect(&username) {
        DisconnectOutcome::DeleteRoom => {
            shared.rooms.remove(room_id);
            shared.registry.unbind_room(&username, room_id);
        }
        DisconnectOutcome::GraceStarted => {
            timers::schedule_grace(shared, room_id, username);
        }
        DisconnectOutcome::Ignored => {}
    }
}

// ---------------------------------------------------------------------------
// place_disc
// ---------------------------------------------------------------------------

async fn handle_move<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    username: &str,
    tx: &ClientSender,
    mv: &MoveRequest,
) {
    if let Err(e) = run_move(shared, username, mv).await {
        tracing::debug!(%username, error = %e, "move rejected");
        let _ = tx.send(ServerFrame::error(e.to_string()));
    }
}

async fn run_move<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    username: &str,
    mv: &MoveRequest,
) -> Result<(), RoomError> {
    let room = resolve_room(shared, mv.room_id.as_deref())?;
    let outcome = room.place_disc(username, mv)?;
    finish_move(shared, &room, outcome).await;
    Ok(())
}

/// Acts on a move's consequences, with the room lock long released.
pub(crate) async fn finish_move<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    room: &Arc<Room>,
    outcome: MoveOutcome,
) {
    settle(shared, outcome.settlement).await;
    if outcome.finished {
        timers::schedule_cleanup(shared, room.id());
    } else if outcome.bot_turn {
        timers::schedule_bot_move(shared, room.id());
    }
}

// ---------------------------------------------------------------------------
// reconnect
// ---------------------------------------------------------------------------

async fn handle_reconnect<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    username: &str,
    tx: &ClientSender,
    req: &ReconnectRequest,
) {
    if let Err(e) = run_reconnect(shared, username, tx, req).await {
        tracing::debug!(%username, error = %e, "reconnect rejected");
        let _ = tx.send(ServerFrame::error(e.to_string()));
    }
}

async fn run_reconnect<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    username: &str,
    tx: &ClientSender,
    req: &ReconnectRequest,
) -> Result<(), RoomError> {
    let room = resolve_room(shared, req.room_id.as_deref())?;

    // Reconnecting into a decided game gets the outcome, not an error.
    if room.status() == RoomStatus::Finished {
        let _ = tx.send(room.finished_snapshot(username));
        return Ok(());
    }

    match room.rejoin(username, tx.clone())? {
        RejoinOutcome::Rejoined => {
            shared.registry.bind_room(username, room.id());
            Ok(())
        }
        RejoinOutcome::Expired { settlement } => {
            let _ = tx.send(ServerFrame::error(
                RoomError::ReconnectExpired.to_string(),
            ));
            settle(shared, settlement).await;
            timers::schedule_cleanup(shared, room.id());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Maps a raw `room_id` field to a live room, with the protocol's error
/// granularity: missing field vs unresolvable room.
fn resolve_room<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    room_id: Option<&str>,
) -> Result<Arc<Room>, RoomError> {
    let raw = room_id.ok_or(RoomError::InvalidRoomId)?;
    let id = Uuid::parse_str(raw).map_err(|_| RoomError::NotFound)?;
    shared.rooms.get(id).ok_or(RoomError::NotFound)
}

/// Persists a terminal settlement through the stats port.
///
/// Failures are logged and swallowed — the game stays finished no
/// matter what the store thinks.
pub(crate) async fn settle<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    settlement: Option<Settlement>,
) {
    let Some(settlement) = settlement else {
        return;
    };
    match settlement {
        Settlement::Win { winner, loser } => {
            for username in [&winner, &loser] {
                if let Err(e) = shared.stats.upsert(username).await {
                    tracing::error!(%username, error = %e, "stats upsert failed");
                }
            }
            if let Err(e) = shared.stats.apply_win(&winner, &loser).await {
                tracing::error!(%winner, %loser, error = %e, "failed to record win");
            }
        }
        Settlement::Draw { a, b } => {
            for username in [&a, &b] {
                if let Err(e) = shared.stats.upsert(username).await {
                    tracing::error!(%username, error = %e, "stats upsert failed");
                }
            }
            if let Err(e) = shared.stats.apply_draw(&a, &b).await {
                tracing::error!(player_a = %a, player_b = %b, error = %e, "failed to record draw");
            }
        }
    }
}
