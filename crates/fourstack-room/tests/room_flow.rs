//! Integration tests for the room state machine, driven through the
//! public API with capture channels standing in for client transports.
//!
//! Time-dependent behavior (the rejoin grace) is tested by compressing
//! the configured duration to zero or stretching it to an hour — never
//! by sleeping.

use std::sync::Arc;
use std::time::Duration;

use fourstack_protocol::{
    CellColor, MoveRequest, RoomStatus, ServerFrame,
};
use fourstack_room::{
    DisconnectOutcome, GraceOutcome, RejoinOutcome, Room, RoomError,
    Settlement, BOT_USERNAME,
};
use fourstack_transport::ClientSender;
use tokio::sync::mpsc::{self, UnboundedReceiver};

type Rx = UnboundedReceiver<ServerFrame>;

fn channel() -> (ClientSender, Rx) {
    mpsc::unbounded_channel()
}

/// Collects every frame currently queued for a client.
fn drain(rx: &mut Rx) -> Vec<ServerFrame> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

fn place(room_id: &str, col: usize, row: usize, color: CellColor) -> MoveRequest {
    MoveRequest {
        room_id: Some(room_id.to_string()),
        action: Some("place_disc".to_string()),
        column: Some(col),
        row: Some(row),
        player_color: Some(color),
    }
}

/// A started human-vs-human game: alice (red, to move) vs bob (blue).
fn started_pair() -> (Arc<Room>, Rx, Rx) {
    let (alice_tx, mut alice_rx) = channel();
    let (bob_tx, mut bob_rx) = channel();
    let room = Room::create("alice", alice_tx, Duration::from_secs(3600));
    room.admit_human("bob", bob_tx).expect("bob joins");
    drain(&mut alice_rx);
    drain(&mut bob_rx);
    (room, alice_rx, bob_rx)
}

// =========================================================================
// Admission and start
// =========================================================================

#[test]
fn test_create_room_is_waiting_with_creator_turn() {
    let (tx, _rx) = channel();
    let room = Room::create("alice", tx, Duration::from_secs(30));
    assert_eq!(room.status(), RoomStatus::Waiting);
    assert_eq!(room.current_turn(), "alice");
    assert_eq!(room.player_names(), vec!["alice".to_string()]);
}

#[test]
fn test_admit_human_starts_game_with_color_assignment() {
    let (alice_tx, mut alice_rx) = channel();
    let (bob_tx, mut bob_rx) = channel();
    let room = Room::create("alice", alice_tx, Duration::from_secs(30));

    let info = room.admit_human("bob", bob_tx).expect("bob joins");
    assert!(!info.bot_turn);
    assert_eq!(room.status(), RoomStatus::Playing);

    // The creator sees only game_started.
    let frames = drain(&mut alice_rx);
    assert_eq!(frames.len(), 1);
    let ServerFrame::GameStarted(p) = &frames[0] else {
        panic!("expected game_started, got {frames:?}");
    };
    assert_eq!(p.player_username, "alice");
    assert_eq!(p.player_color, CellColor::Red);
    assert_eq!(p.opponent_color, CellColor::Blue);
    assert_eq!(p.opponent_username, "bob");
    assert_eq!(p.current_turn, "alice");
    assert_eq!(p.total_players, 2);

    // The newcomer sees game_joined, then their game_started.
    let frames = drain(&mut bob_rx);
    assert_eq!(frames.len(), 2);
    assert!(matches!(&frames[0], ServerFrame::GameJoined(s) if s.total_players == 2));
    let ServerFrame::GameStarted(p) = &frames[1] else {
        panic!("expected game_started, got {frames:?}");
    };
    assert_eq!(p.player_color, CellColor::Blue);
    assert_eq!(p.opponent_username, "alice");
}

#[test]
fn test_admit_bot_starts_game_against_human() {
    let (alice_tx, mut alice_rx) = channel();
    let room = Room::create("alice", alice_tx, Duration::from_secs(30));

    room.admit_bot().expect("bot joins");
    assert_eq!(room.status(), RoomStatus::Playing);

    let frames = drain(&mut alice_rx);
    assert_eq!(frames.len(), 1);
    let ServerFrame::GameStarted(p) = &frames[0] else {
        panic!("expected game_started");
    };
    assert_eq!(p.opponent_username, BOT_USERNAME);
    assert_eq!(p.player_color, CellColor::Red);
    assert_eq!(p.opponent_color, CellColor::Blue);
    assert_eq!(
        p.opponent_type,
        fourstack_protocol::OpponentType::Bot
    );
}

#[test]
fn test_admit_bot_rejected_once_playing() {
    let (room, _a, _b) = started_pair();
    assert!(room.admit_bot().is_err());
}

// =========================================================================
// place_disc validation
// =========================================================================

#[test]
fn test_place_disc_out_of_turn_is_rejected() {
    let (room, _a, mut bob_rx) = started_pair();
    let id = room.id().to_string();

    let err = room
        .place_disc("bob", &place(&id, 0, 5, CellColor::Blue))
        .unwrap_err();
    assert_eq!(err, RoomError::NotYourTurn);
    assert!(drain(&mut bob_rx).is_empty(), "no update for a rejected move");
}

#[test]
fn test_place_disc_in_waiting_room_is_rejected() {
    let (tx, _rx) = channel();
    let room = Room::create("alice", tx, Duration::from_secs(30));
    let id = room.id().to_string();
    let err = room
        .place_disc("alice", &place(&id, 0, 5, CellColor::Red))
        .unwrap_err();
    assert_eq!(err, RoomError::NotYourTurn);
}

#[test]
fn test_place_disc_wrong_action_is_rejected() {
    let (room, _a, _b) = started_pair();
    let id = room.id().to_string();
    let mut req = place(&id, 0, 5, CellColor::Red);
    req.action = Some("flip_table".to_string());
    assert_eq!(
        room.place_disc("alice", &req).unwrap_err(),
        RoomError::InvalidAction
    );
}

#[test]
fn test_place_disc_missing_fields_are_rejected() {
    let (room, _a, _b) = started_pair();
    let id = room.id().to_string();

    let mut req = place(&id, 0, 5, CellColor::Red);
    req.column = None;
    assert_eq!(
        room.place_disc("alice", &req).unwrap_err(),
        RoomError::InvalidPlacement
    );

    let mut req = place(&id, 0, 5, CellColor::Red);
    req.player_color = Some(CellColor::Neutral);
    assert_eq!(
        room.place_disc("alice", &req).unwrap_err(),
        RoomError::InvalidPlacement
    );
}

#[test]
fn test_place_disc_with_opponents_color_is_rejected() {
    let (room, _a, _b) = started_pair();
    let id = room.id().to_string();
    assert_eq!(
        room.place_disc("alice", &place(&id, 0, 5, CellColor::Blue))
            .unwrap_err(),
        RoomError::InvalidPlacement
    );
}

#[test]
fn test_place_disc_out_of_bounds_is_rejected() {
    let (room, _a, _b) = started_pair();
    let id = room.id().to_string();
    assert_eq!(
        room.place_disc("alice", &place(&id, 7, 0, CellColor::Red))
            .unwrap_err(),
        RoomError::InvalidPlacement
    );
}

#[test]
fn test_placed_disc_is_never_overwritten() {
    let (room, mut alice_rx, mut bob_rx) = started_pair();
    let id = room.id().to_string();

    room.place_disc("alice", &place(&id, 0, 5, CellColor::Red))
        .expect("valid move");
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    let err = room
        .place_disc("bob", &place(&id, 0, 5, CellColor::Blue))
        .unwrap_err();
    assert_eq!(err, RoomError::InvalidPlacement);
    assert_eq!(room.grid().cell(0, 5), Some(CellColor::Red));
    assert!(drain(&mut bob_rx).is_empty());
}

#[test]
fn test_valid_move_flips_turn_and_updates_both_players() {
    let (room, mut alice_rx, mut bob_rx) = started_pair();
    let id = room.id().to_string();

    let outcome = room
        .place_disc("alice", &place(&id, 3, 5, CellColor::Red))
        .expect("valid move");
    assert!(!outcome.finished);
    assert!(!outcome.bot_turn);
    assert_eq!(room.current_turn(), "bob");

    for rx in [&mut alice_rx, &mut bob_rx] {
        let frames = drain(rx);
        assert_eq!(frames.len(), 1);
        let ServerFrame::GameUpdate(u) = &frames[0] else {
            panic!("expected game_update");
        };
        assert_eq!(u.status, RoomStatus::Playing);
        assert_eq!(u.current_turn, "bob");
        assert_eq!(u.winner, None);
        assert_eq!(u.grid_data.cell(3, 5), Some(CellColor::Red));
    }
}

// =========================================================================
// Winning, drawing, finishing
// =========================================================================

/// The vertical-win script: alice stacks column 0 while bob stacks
/// column 1; alice's fourth disc wins.
#[test]
fn test_vertical_win_names_the_mover() {
    let (room, mut alice_rx, mut bob_rx) = started_pair();
    let id = room.id().to_string();

    let script = [
        ("alice", 0, 5, CellColor::Red),
        ("bob", 1, 5, CellColor::Blue),
        ("alice", 0, 4, CellColor::Red),
        ("bob", 1, 4, CellColor::Blue),
        ("alice", 0, 3, CellColor::Red),
        ("bob", 1, 3, CellColor::Blue),
    ];
    for (who, col, row, color) in script {
        let outcome = room
            .place_disc(who, &place(&id, col, row, color))
            .expect("scripted move");
        assert!(!outcome.finished);
    }

    let outcome = room
        .place_disc("alice", &place(&id, 0, 2, CellColor::Red))
        .expect("winning move");
    assert!(outcome.finished);
    assert_eq!(
        outcome.settlement,
        Some(Settlement::Win {
            winner: "alice".to_string(),
            loser: "bob".to_string(),
        })
    );
    assert_eq!(room.status(), RoomStatus::Finished);
    assert_eq!(room.winner(), "alice");

    // Both players' final update carries the winner.
    for rx in [&mut alice_rx, &mut bob_rx] {
        let frames = drain(rx);
        let ServerFrame::GameUpdate(last) = frames.last().expect("updates")
        else {
            panic!("expected game_update");
        };
        assert_eq!(last.status, RoomStatus::Finished);
        assert_eq!(last.winner.as_deref(), Some("alice"));
    }
}

#[test]
fn test_finished_update_is_the_last_frame() {
    let (room, mut alice_rx, mut bob_rx) = started_pair();
    let id = room.id().to_string();

    for (who, col, row, color) in [
        ("alice", 0, 5, CellColor::Red),
        ("bob", 1, 5, CellColor::Blue),
        ("alice", 0, 4, CellColor::Red),
        ("bob", 1, 4, CellColor::Blue),
        ("alice", 0, 3, CellColor::Red),
        ("bob", 1, 3, CellColor::Blue),
        ("alice", 0, 2, CellColor::Red),
    ] {
        room.place_disc(who, &place(&id, col, row, color))
            .expect("scripted move");
    }
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    // Any further move is rejected without emitting an update.
    let err = room
        .place_disc("bob", &place(&id, 2, 5, CellColor::Blue))
        .unwrap_err();
    assert_eq!(err, RoomError::NotFound);
    assert!(drain(&mut alice_rx).is_empty());
    assert!(drain(&mut bob_rx).is_empty());
}

/// A full scripted draw: a column pattern with no four-in-a-row anywhere
/// in the final position (so no prefix of it can win either).
#[test]
fn test_board_filling_without_win_is_a_draw() {
    let (room, mut alice_rx, mut bob_rx) = started_pair();
    let id = room.id().to_string();

    // Column order; the room's own turn tracking decides who moves.
    let mut schedule = Vec::new();
    for col in [0usize, 1, 2] {
        schedule.extend(std::iter::repeat(col).take(6));
    }
    schedule.push(6);
    for col in [3usize, 4, 5] {
        schedule.extend(std::iter::repeat(col).take(6));
    }
    schedule.extend(std::iter::repeat(6).take(5));

    let mut last_outcome = None;
    for col in schedule {
        let who = room.current_turn();
        let color = if who == "alice" {
            CellColor::Red
        } else {
            CellColor::Blue
        };
        let row = room.grid().lowest_empty_row(col).expect("column open");
        let outcome = room
            .place_disc(&who, &place(&id, col, row, color))
            .expect("scripted move");
        last_outcome = Some(outcome);
    }

    let outcome = last_outcome.expect("moves were played");
    assert!(outcome.finished);
    assert_eq!(
        outcome.settlement,
        Some(Settlement::Draw {
            a: "alice".to_string(),
            b: "bob".to_string(),
        })
    );
    assert_eq!(room.status(), RoomStatus::Finished);
    assert_eq!(room.winner(), "");

    for rx in [&mut alice_rx, &mut bob_rx] {
        let frames = drain(rx);
        let ServerFrame::GameUpdate(last) = frames.last().expect("updates")
        else {
            panic!("expected game_update");
        };
        assert_eq!(last.status, RoomStatus::Finished);
        assert_eq!(last.winner.as_deref(), Some(""));
    }
}

// =========================================================================
// Bot games
// =========================================================================

#[test]
fn test_bot_move_plays_blue_and_returns_turn() {
    let (alice_tx, mut alice_rx) = channel();
    let room = Room::create("alice", alice_tx, Duration::from_secs(30));
    room.admit_bot().expect("bot joins");
    let id = room.id().to_string();

    let outcome = room
        .place_disc("alice", &place(&id, 0, 5, CellColor::Red))
        .expect("human move");
    assert!(outcome.bot_turn, "bot should be scheduled");
    assert_eq!(room.current_turn(), BOT_USERNAME);

    let outcome = room.bot_move();
    assert!(!outcome.finished);
    assert_eq!(room.current_turn(), "alice");

    // alice saw her own update and the bot's.
    let updates: Vec<_> = drain(&mut alice_rx)
        .into_iter()
        .filter(|f| matches!(f, ServerFrame::GameUpdate(_)))
        .collect();
    assert_eq!(updates.len(), 2);

    // Exactly one blue disc landed, obeying gravity.
    let grid = room.grid();
    let blues: Vec<(usize, usize)> = (0..7)
        .flat_map(|c| (0..6).map(move |r| (c, r)))
        .filter(|&(c, r)| grid.cell(c, r) == Some(CellColor::Blue))
        .collect();
    assert_eq!(blues.len(), 1);
    let (c, r) = blues[0];
    assert!(r == 5 || grid.cell(c, r + 1) != Some(CellColor::Neutral));
}

#[test]
fn test_bot_move_out_of_turn_does_nothing() {
    let (alice_tx, mut alice_rx) = channel();
    let room = Room::create("alice", alice_tx, Duration::from_secs(30));
    room.admit_bot().expect("bot joins");
    drain(&mut alice_rx);

    // It's alice's turn; a stray timer fire must be a no-op.
    let outcome = room.bot_move();
    assert!(!outcome.finished);
    assert!(outcome.settlement.is_none());
    assert!(drain(&mut alice_rx).is_empty());
    assert_eq!(room.current_turn(), "alice");
}

#[test]
fn test_bot_game_never_settles_stats() {
    let (alice_tx, _alice_rx) = channel();
    let room = Room::create("alice", alice_tx, Duration::from_secs(30));
    room.admit_bot().expect("bot joins");

    // alice abandons: the bot "wins", but nothing is persisted.
    let outcome = room.forfeit("alice");
    let GraceOutcome::Finished { settlement } = outcome else {
        panic!("expected Finished");
    };
    assert!(settlement.is_none());
    assert_eq!(room.winner(), BOT_USERNAME);
}

// =========================================================================
// Disconnect, rejoin, grace
// =========================================================================

#[test]
fn test_disconnect_from_waiting_room_deletes_it() {
    let (tx, _rx) = channel();
    let room = Room::create("alice", tx, Duration::from_secs(30));
    assert_eq!(room.disconnect("alice"), DisconnectOutcome::DeleteRoom);
}

#[test]
fn test_disconnect_from_playing_room_starts_grace() {
    let (room, mut alice_rx, mut bob_rx) = started_pair();

    assert_eq!(room.disconnect("bob"), DisconnectOutcome::GraceStarted);
    assert!(room.is_disconnected("bob"));

    let frames = drain(&mut alice_rx);
    assert_eq!(frames.len(), 1);
    let ServerFrame::PlayerDisconnected { username, message } = &frames[0]
    else {
        panic!("expected player_disconnected");
    };
    assert_eq!(username, "bob");
    assert!(message.contains("seconds to reconnect"));

    // The disconnected player's stale channel gets nothing new.
    assert!(drain(&mut bob_rx).is_empty());
}

#[test]
fn test_disconnect_from_finished_room_is_ignored() {
    let (room, _a, _b) = started_pair();
    room.forfeit("bob");
    assert_eq!(room.disconnect("alice"), DisconnectOutcome::Ignored);
}

#[test]
fn test_rejoin_within_grace_restores_seat() {
    let (room, mut alice_rx, _bob_rx) = started_pair();
    room.disconnect("bob");
    drain(&mut alice_rx);

    let (new_tx, mut new_rx) = channel();
    let outcome = room.rejoin("bob", new_tx).expect("rejoin accepted");
    assert!(matches!(outcome, RejoinOutcome::Rejoined));
    assert!(!room.is_disconnected("bob"));

    // The rejoiner gets the full personalized snapshot, turn preserved.
    let frames = drain(&mut new_rx);
    assert_eq!(frames.len(), 1);
    let ServerFrame::GameRejoined(p) = &frames[0] else {
        panic!("expected game_rejoined");
    };
    assert_eq!(p.player_username, "bob");
    assert_eq!(p.player_color, CellColor::Blue);
    assert_eq!(p.current_turn, "alice");
    assert_eq!(p.status, RoomStatus::Playing);

    // The other player is told.
    let frames = drain(&mut alice_rx);
    assert_eq!(frames.len(), 1);
    assert!(matches!(
        &frames[0],
        ServerFrame::PlayerRejoined { username } if username == "bob"
    ));

    // The grace timer now finds nothing to do.
    assert!(matches!(room.grace_timeout("bob"), GraceOutcome::NoOp));
}

#[test]
fn test_rejoin_of_connected_player_is_rejected() {
    let (room, _a, _b) = started_pair();
    let (tx, _rx) = channel();
    assert_eq!(
        room.rejoin("bob", tx).unwrap_err(),
        RoomError::NotDisconnected
    );
}

#[test]
fn test_rejoin_after_grace_expiry_forfeits() {
    // Zero grace: the window is already closed when the rejoin arrives.
    let (alice_tx, mut alice_rx) = channel();
    let (bob_tx, _bob_rx) = channel();
    let room = Room::create("alice", alice_tx, Duration::ZERO);
    room.admit_human("bob", bob_tx).expect("bob joins");
    drain(&mut alice_rx);

    room.disconnect("bob");
    drain(&mut alice_rx);

    let (new_tx, _new_rx) = channel();
    let outcome = room.rejoin("bob", new_tx).expect("seat existed");
    let RejoinOutcome::Expired { settlement } = outcome else {
        panic!("expected Expired");
    };
    assert_eq!(
        settlement,
        Some(Settlement::Win {
            winner: "alice".to_string(),
            loser: "bob".to_string(),
        })
    );
    assert_eq!(room.status(), RoomStatus::Finished);

    // The survivor's final update explains what happened.
    let frames = drain(&mut alice_rx);
    let ServerFrame::GameUpdate(u) = frames.last().expect("final update")
    else {
        panic!("expected game_update");
    };
    assert_eq!(u.winner.as_deref(), Some("alice"));
    assert_eq!(u.message.as_deref(), Some("Opponent failed to reconnect in time"));
}

#[test]
fn test_grace_timeout_declares_survivor_winner() {
    let (room, mut alice_rx, _bob_rx) = started_pair();
    room.disconnect("bob");
    drain(&mut alice_rx);

    let outcome = room.grace_timeout("bob");
    let GraceOutcome::Finished { settlement } = outcome else {
        panic!("expected Finished");
    };
    assert_eq!(
        settlement,
        Some(Settlement::Win {
            winner: "alice".to_string(),
            loser: "bob".to_string(),
        })
    );
    assert_eq!(room.winner(), "alice");

    let frames = drain(&mut alice_rx);
    let ServerFrame::GameUpdate(u) = frames.last().expect("final update")
    else {
        panic!("expected game_update");
    };
    assert_eq!(u.status, RoomStatus::Finished);
    assert_eq!(u.winner.as_deref(), Some("alice"));
}

#[test]
fn test_grace_timeout_with_both_players_gone_deletes_room() {
    let (room, _a, _b) = started_pair();
    room.disconnect("alice");
    room.disconnect("bob");
    assert!(matches!(
        room.grace_timeout("alice"),
        GraceOutcome::DeleteRoom
    ));
}

#[test]
fn test_grace_timeout_after_game_ended_is_noop() {
    let (room, _a, _b) = started_pair();
    room.disconnect("bob");
    room.forfeit("bob"); // resolved another way first
    assert!(matches!(room.grace_timeout("bob"), GraceOutcome::NoOp));
}

// =========================================================================
// Forfeit
// =========================================================================

#[test]
fn test_forfeit_declares_other_player_winner_once() {
    let (room, mut alice_rx, mut bob_rx) = started_pair();
    drain(&mut alice_rx);

    let outcome = room.forfeit("alice");
    let GraceOutcome::Finished { settlement } = outcome else {
        panic!("expected Finished");
    };
    assert_eq!(
        settlement,
        Some(Settlement::Win {
            winner: "bob".to_string(),
            loser: "alice".to_string(),
        })
    );
    assert_eq!(room.winner(), "bob");

    let frames = drain(&mut bob_rx);
    let ServerFrame::GameUpdate(u) = frames.last().expect("final update")
    else {
        panic!("expected game_update");
    };
    assert_eq!(u.winner.as_deref(), Some("bob"));

    // A second forfeit settles nothing — exactly once.
    assert!(matches!(room.forfeit("alice"), GraceOutcome::NoOp));
}

#[test]
fn test_forfeit_of_waiting_room_deletes_it() {
    let (tx, _rx) = channel();
    let room = Room::create("alice", tx, Duration::from_secs(30));
    assert!(matches!(room.forfeit("alice"), GraceOutcome::DeleteRoom));
}

// =========================================================================
// Finished-room snapshot
// =========================================================================

#[test]
fn test_finished_snapshot_personalizes_message() {
    let (room, _a, _b) = started_pair();
    room.forfeit("bob"); // alice wins

    let ServerFrame::GameUpdate(for_winner) = room.finished_snapshot("alice")
    else {
        panic!("expected game_update");
    };
    assert_eq!(for_winner.winner.as_deref(), Some("alice"));
    assert_eq!(for_winner.message.as_deref(), Some("You won the game!"));

    let ServerFrame::GameUpdate(for_loser) = room.finished_snapshot("bob")
    else {
        panic!("expected game_update");
    };
    assert_eq!(for_loser.message.as_deref(), Some("You lost the game."));
}
