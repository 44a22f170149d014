//! Matchmaking: what a `new_game` message sets in motion.
//!
//! 1. A player already bound to a room forfeits it (the opponent wins,
//!    stats and all — abandoning a game is losing it).
//! 2. The oldest waiting room takes the player as its second seat.
//! 3. No waiting room? Create one and arm the bot-join timer.

use std::sync::Arc;

use fourstack_protocol::ServerFrame;
use fourstack_room::{GraceOutcome, Room};
use fourstack_stats::StatsStore;
use fourstack_transport::ClientSender;

use crate::server::Shared;
use crate::{handler, timers};

pub(crate) async fn new_game<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    username: &str,
    tx: &ClientSender,
) {
    forfeit_previous(shared, username, tx).await;

    // Pair with the oldest waiting room (never the player's own).
    if let Some(room) = shared.rooms.take_waiting_excluding(username) {
        let room_id = room.id();
        match room.admit_human(username, tx.clone()) {
            Ok(info) => {
                shared.rooms.insert_playing(room_id);
                shared.registry.bind_room(username, room_id);
                if info.bot_turn {
                    timers::schedule_bot_move(shared, room_id);
                }
            }
            Err(e) => {
                // The pop is atomic, so this is a room dying between
                // pop and admit — tell the player to try again.
                tracing::warn!(%username, %room_id, error = %e, "waiting room refused join");
                let _ = tx.send(ServerFrame::error(e.to_string()));
            }
        }
        return;
    }

    // Open a fresh room and wait for an opponent.
    let room =
        Room::create(username, tx.clone(), shared.config.reconnect_grace);
    let room_id = room.id();
    shared.rooms.insert_waiting(Arc::clone(&room));
    shared.registry.bind_room(username, room_id);
    let _ = tx.send(ServerFrame::NewGameResponse(room.summary()));
    timers::schedule_bot_join(shared, room_id);
}

/// Resolves the player's previous room, if the registry still points at
/// one.
async fn forfeit_previous<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    username: &str,
    tx: &ClientSender,
) {
    let Some(prev_id) = shared.registry.room_of(username) else {
        return;
    };

    let Some(prev) = shared.rooms.get(prev_id) else {
        // Stale binding: the room went away under us (server-side
        // cleanup won the race).
        let _ =
            tx.send(ServerFrame::info("Previous game was closed by the server"));
        shared.registry.unbind_room(username, prev_id);
        return;
    };

    let _ = tx.send(ServerFrame::info("Previous game has been terminated"));
    shared.registry.unbind_room(username, prev_id);
    match prev.forfeit(username) {
        GraceOutcome::Finished { settlement } => {
            handler::settle(shared, settlement).await;
            timers::schedule_cleanup(shared, prev_id);
        }
        GraceOutcome::DeleteRoom => {
            shared.rooms.remove(prev_id);
        }
        GraceOutcome::NoOp => {}
    }
}
