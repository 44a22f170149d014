//! Scheduled one-shots: bot join, bot move, rejoin grace, room cleanup.
//!
//! The idiom for every timer is the same: sleep, then take the locks
//! and inspect *current* state — never act on the state observed when
//! the timer was armed. A timer that lost its race (a human joined, the
//! player rejoined, the room is gone) just exits.

use std::sync::Arc;

use fourstack_room::GraceOutcome;
use fourstack_stats::StatsStore;
use tokio::time::sleep;
use uuid::Uuid;

use crate::handler;
use crate::server::Shared;

/// Armed when a waiting room is created: after the join window, seat
/// the bot if no human arrived.
pub(crate) fn schedule_bot_join<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    room_id: Uuid,
) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        sleep(shared.config.bot_join_delay).await;

        // Claiming the waiting slot is the race decider: if the slot is
        // gone, a human was matched in (or the creator left).
        if !shared.rooms.remove_waiting(room_id) {
            return;
        }
        let Some(room) = shared.rooms.get(room_id) else {
            return;
        };
        match room.admit_bot() {
            Ok(info) => {
                shared.rooms.insert_playing(room_id);
                if info.bot_turn {
                    schedule_bot_move(&shared, room_id);
                }
            }
            Err(e) => {
                tracing::debug!(%room_id, error = %e, "bot join skipped");
            }
        }
    });
}

/// The bot's turn: think for the configured pause, then re-check that
/// the move is still wanted and make it.
pub(crate) fn schedule_bot_move<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    room_id: Uuid,
) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        sleep(shared.config.bot_think_delay).await;
        let Some(room) = shared.rooms.get(room_id) else {
            return;
        };
        // bot_move re-validates status and turn under the room lock.
        let outcome = room.bot_move();
        handler::finish_move(&shared, &room, outcome).await;
    });
}

/// Armed on each disconnection from a playing room: when the grace
/// window closes, resolve whatever is still unresolved.
pub(crate) fn schedule_grace<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    room_id: Uuid,
    username: String,
) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        sleep(shared.config.reconnect_grace).await;
        let Some(room) = shared.rooms.get(room_id) else {
            return;
        };
        match room.grace_timeout(&username) {
            GraceOutcome::NoOp => {
                // Rejoined in time, or the game ended another way.
            }
            GraceOutcome::DeleteRoom => {
                remove_room_now(&shared, room_id);
            }
            GraceOutcome::Finished { settlement } => {
                handler::settle(&shared, settlement).await;
                schedule_cleanup(&shared, room_id);
            }
        }
    });
}

/// Armed when a room finishes: linger so final writes flush, then purge
/// it from every index and release its players.
pub(crate) fn schedule_cleanup<S: StatsStore>(
    shared: &Arc<Shared<S>>,
    room_id: Uuid,
) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        sleep(shared.config.finished_linger).await;
        remove_room_now(&shared, room_id);
    });
}

fn remove_room_now<S: StatsStore>(shared: &Arc<Shared<S>>, room_id: Uuid) {
    if let Some(room) = shared.rooms.remove(room_id) {
        for username in room.player_names() {
            shared.registry.unbind_room(&username, room_id);
        }
        tracing::info!(%room_id, "room removed");
    }
}
