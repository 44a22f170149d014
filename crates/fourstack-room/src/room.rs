//! The per-match state machine.
//!
//! A [`Room`] owns everything mutable about one game behind a single
//! mutex:
//!
//! ```text
//!           admit (human | bot)            four-in-a-row / draw /
//!                 │                        forfeit / grace expiry
//!   waiting ──────┴──────→ playing ────────────────→ finished
//! ```
//!
//! Mutators lock, re-read state, mutate, and queue outbound frames
//! through the per-client channels — queuing is non-blocking, so it is
//! safe under the lock. Terminal transitions come back to the caller as
//! a [`Settlement`] so the stats write happens *after* the lock is
//! released; the room is already `finished` by then, so nothing races.
//!
//! The bot occupies a normal player seat under the reserved name
//! [`BOT_USERNAME`] with no delivery channel. Fan-out filters on channel
//! presence; only stats decisions compare names.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use fourstack_protocol::{
    CellColor, GameStartPayload, GameUpdatePayload, Grid, MoveRequest,
    OpponentType, RoomStatus, RoomSummary, ServerFrame,
};
use fourstack_transport::ClientSender;
use uuid::Uuid;

use crate::{board, RoomError};

/// The reserved username the bot plays under.
pub const BOT_USERNAME: &str = "bot";

/// A terminal game result involving only human players.
///
/// Bot games never settle — the bot is not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// `winner` takes the rating and the win; `loser` the loss.
    Win { winner: String, loser: String },
    /// Both players drew.
    Draw { a: String, b: String },
}

/// What a move changed, for the orchestrator to act on.
#[derive(Debug)]
pub struct MoveOutcome {
    /// The game just ended — schedule the room's cleanup linger.
    pub finished: bool,
    /// It is now the bot's turn — schedule a bot move.
    pub bot_turn: bool,
    /// Stats to persist, if the ending involved two humans.
    pub settlement: Option<Settlement>,
}

impl MoveOutcome {
    fn idle() -> Self {
        Self {
            finished: false,
            bot_turn: false,
            settlement: None,
        }
    }
}

/// Result of admitting the second player.
#[derive(Debug)]
pub struct StartInfo {
    /// The opening turn belongs to the bot — schedule its move.
    pub bot_turn: bool,
}

/// What a disconnect requires of the caller.
#[derive(Debug, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// Waiting room abandoned: remove it and unbind the player.
    DeleteRoom,
    /// Playing room: the grace window is open, arm the timer.
    GraceStarted,
    /// Finished room or unknown player: nothing to do.
    Ignored,
}

/// What a grace expiry (or forfeit) requires of the caller.
#[derive(Debug)]
pub enum GraceOutcome {
    /// The player came back in time (or the room already resolved).
    NoOp,
    /// Nobody left to award the game to: remove the room outright.
    DeleteRoom,
    /// A winner was declared: settle stats, schedule cleanup.
    Finished { settlement: Option<Settlement> },
}

/// Result of a rejoin attempt that found the player's seat.
#[derive(Debug)]
pub enum RejoinOutcome {
    /// Seat restored on the new transport.
    Rejoined,
    /// The window had already closed: the room finished in the
    /// survivor's favor. The caller owes the rejoiner the expiry error.
    Expired { settlement: Option<Settlement> },
}

/// One seat at the table.
struct PlayerSlot {
    username: String,
    /// `None` for the bot. For a disconnected human this goes stale —
    /// sends to a dead channel are dropped — until a rejoin replaces it.
    sender: Option<ClientSender>,
}

struct RoomInner {
    status: RoomStatus,
    opponent: Option<OpponentType>,
    /// Seat order is color order: `players[0]` (the creator) is red.
    players: Vec<PlayerSlot>,
    disconnected: HashMap<String, Instant>,
    current_turn: String,
    grid: Grid,
    /// Empty until finished; stays empty on a draw.
    winner: String,
    reconnect_grace: Duration,
}

/// Authoritative state for one match.
pub struct Room {
    id: Uuid,
    inner: Mutex<RoomInner>,
}

impl Room {
    /// Creates a waiting room with its first (red) player.
    pub fn create(
        username: &str,
        sender: ClientSender,
        reconnect_grace: Duration,
    ) -> Arc<Self> {
        let id = Uuid::new_v4();
        tracing::info!(room_id = %id, %username, "room created");
        Arc::new(Self {
            id,
            inner: Mutex::new(RoomInner {
                status: RoomStatus::Waiting,
                opponent: None,
                players: vec![PlayerSlot {
                    username: username.to_string(),
                    sender: Some(sender),
                }],
                disconnected: HashMap::new(),
                current_turn: username.to_string(),
                grid: Grid::new(),
                winner: String::new(),
                reconnect_grace,
            }),
        })
    }

    /// The room's process-unique id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, RoomInner> {
        // A poisoned lock means a task panicked mid-mutation; the room
        // is torn down by its owner shortly after, so keep answering.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Snapshots ---------------------------------------------------------

    /// Snapshot without color assignments (`new_game_response` /
    /// `game_joined` payload).
    pub fn summary(&self) -> RoomSummary {
        let inner = self.lock();
        RoomSummary {
            room_id: self.id.to_string(),
            status: inner.status,
            current_turn: inner.current_turn.clone(),
            total_players: inner.players.len(),
            players: inner.player_names(),
            grid_data: inner.grid.clone(),
        }
    }

    /// Final snapshot for a reconnect that arrived after the game ended,
    /// with the personalized outcome message.
    pub fn finished_snapshot(&self, username: &str) -> ServerFrame {
        let inner = self.lock();
        let message = if inner.winner.is_empty() {
            "The game has ended."
        } else if inner.winner == username {
            "You won the game!"
        } else {
            "You lost the game."
        };
        ServerFrame::GameUpdate(GameUpdatePayload {
            room_id: self.id.to_string(),
            status: inner.status,
            current_turn: inner.current_turn.clone(),
            grid_data: inner.grid.clone(),
            winner: Some(inner.winner.clone()),
            message: Some(message.to_string()),
        })
    }

    pub fn status(&self) -> RoomStatus {
        self.lock().status
    }

    pub fn has_player(&self, username: &str) -> bool {
        self.lock().players.iter().any(|s| s.username == username)
    }

    pub fn is_disconnected(&self, username: &str) -> bool {
        self.lock().disconnected.contains_key(username)
    }

    pub fn player_names(&self) -> Vec<String> {
        self.lock().player_names()
    }

    pub fn current_turn(&self) -> String {
        self.lock().current_turn.clone()
    }

    pub fn winner(&self) -> String {
        self.lock().winner.clone()
    }

    pub fn grid(&self) -> Grid {
        self.lock().grid.clone()
    }

    // -- Admission ---------------------------------------------------------

    /// Seats the second human and starts the game.
    pub fn admit_human(
        &self,
        username: &str,
        sender: ClientSender,
    ) -> Result<StartInfo, RoomError> {
        let mut inner = self.lock();
        if inner.status != RoomStatus::Waiting || inner.players.len() >= 2 {
            return Err(RoomError::NotFound);
        }
        inner.opponent = Some(OpponentType::Human);
        inner.players.push(PlayerSlot {
            username: username.to_string(),
            sender: Some(sender),
        });
        tracing::info!(room_id = %self.id, %username, "player joined");

        let summary = RoomSummary {
            room_id: self.id.to_string(),
            status: inner.status,
            current_turn: inner.current_turn.clone(),
            total_players: inner.players.len(),
            players: inner.player_names(),
            grid_data: inner.grid.clone(),
        };
        inner.deliver_to(username, ServerFrame::GameJoined(summary));

        Ok(self.start(&mut inner))
    }

    /// Seats the bot (join-timer fire) and starts the game.
    ///
    /// Only valid while the room is still waiting with one player; the
    /// timer re-checks under this lock rather than trusting its earlier
    /// view.
    pub fn admit_bot(&self) -> Result<StartInfo, RoomError> {
        let mut inner = self.lock();
        if inner.status != RoomStatus::Waiting || inner.players.len() != 1 {
            return Err(RoomError::NotFound);
        }
        inner.opponent = Some(OpponentType::Bot);
        inner.players.push(PlayerSlot {
            username: BOT_USERNAME.to_string(),
            sender: None,
        });
        tracing::info!(room_id = %self.id, "bot admitted");

        Ok(self.start(&mut inner))
    }

    /// Transitions to `playing` and fans out personalized
    /// `game_started` frames.
    fn start(&self, inner: &mut RoomInner) -> StartInfo {
        debug_assert!(inner.status.can_transition_to(RoomStatus::Playing));
        inner.status = RoomStatus::Playing;
        tracing::info!(
            room_id = %self.id,
            players = ?inner.player_names(),
            "game started"
        );

        let frames: Vec<(String, ServerFrame)> = inner
            .players
            .iter()
            .filter(|slot| slot.sender.is_some())
            .map(|slot| {
                (
                    slot.username.clone(),
                    ServerFrame::GameStarted(
                        inner.start_payload(&self.id, &slot.username),
                    ),
                )
            })
            .collect();
        for (username, frame) in frames {
            inner.deliver_to(&username, frame);
        }

        StartInfo {
            bot_turn: inner.current_turn == BOT_USERNAME,
        }
    }

    // -- Moves -------------------------------------------------------------

    /// Validates and applies a human move.
    ///
    /// Checks run in protocol order — status, turn, action, placement —
    /// so the client always sees the error for the first thing wrong.
    pub fn place_disc(
        &self,
        username: &str,
        req: &MoveRequest,
    ) -> Result<MoveOutcome, RoomError> {
        let mut inner = self.lock();
        match inner.status {
            RoomStatus::Finished => return Err(RoomError::NotFound),
            RoomStatus::Waiting => return Err(RoomError::NotYourTurn),
            RoomStatus::Playing => {}
        }
        if inner.current_turn != username {
            return Err(RoomError::NotYourTurn);
        }
        if req.action.as_deref() != Some("place_disc") {
            return Err(RoomError::InvalidAction);
        }
        let (col, row, color) = match (req.column, req.row, req.player_color) {
            (Some(col), Some(row), Some(color)) if color.is_disc() => {
                (col, row, color)
            }
            _ => return Err(RoomError::InvalidPlacement),
        };
        if color != inner.color_of(username) {
            return Err(RoomError::InvalidPlacement);
        }
        if inner.grid.cell(col, row) != Some(CellColor::Neutral) {
            // Out of bounds or occupied — placed discs are never
            // overwritten.
            return Err(RoomError::InvalidPlacement);
        }

        Ok(self.apply_move(&mut inner, username, col, row, color))
    }

    /// Applies the bot's move, re-checking that it is still wanted.
    ///
    /// The caller slept through the "thinking" delay first; anything can
    /// have happened meanwhile, so the decision is recomputed under the
    /// lock.
    pub fn bot_move(&self) -> MoveOutcome {
        let mut inner = self.lock();
        if inner.status != RoomStatus::Playing
            || inner.current_turn != BOT_USERNAME
        {
            return MoveOutcome::idle();
        }
        let Some((col, row)) = board::bot_move(&inner.grid) else {
            // A full board finishes the game on the move that fills it,
            // so the bot can't be asked to move into one.
            tracing::warn!(room_id = %self.id, "bot has no legal move");
            return MoveOutcome::idle();
        };
        self.apply_move(&mut inner, BOT_USERNAME, col, row, CellColor::Blue)
    }

    /// Writes the disc, flips the turn, evaluates the ending, and fans
    /// out the update.
    fn apply_move(
        &self,
        inner: &mut RoomInner,
        mover: &str,
        col: usize,
        row: usize,
        color: CellColor,
    ) -> MoveOutcome {
        inner.grid.set(col, row, color);
        if let Some(next) = inner.other_player(mover) {
            inner.current_turn = next;
        }

        if board::wins(&inner.grid, color) {
            inner.status = RoomStatus::Finished;
            inner.winner = mover.to_string();
            tracing::info!(room_id = %self.id, winner = %mover, "game won");
        } else if inner.grid.is_full() {
            inner.status = RoomStatus::Finished;
            tracing::info!(room_id = %self.id, "game drawn");
        }

        inner.broadcast_update(&self.id, None);

        let finished = inner.status == RoomStatus::Finished;
        MoveOutcome {
            finished,
            bot_turn: !finished
                && inner.opponent == Some(OpponentType::Bot)
                && inner.current_turn == BOT_USERNAME,
            settlement: if finished { inner.settlement() } else { None },
        }
    }

    // -- Disconnection and rejoin ------------------------------------------

    /// Records a dropped transport.
    pub fn disconnect(&self, username: &str) -> DisconnectOutcome {
        let mut inner = self.lock();
        if !inner.players.iter().any(|s| s.username == username) {
            return DisconnectOutcome::Ignored;
        }
        match inner.status {
            RoomStatus::Waiting => DisconnectOutcome::DeleteRoom,
            RoomStatus::Finished => DisconnectOutcome::Ignored,
            RoomStatus::Playing => {
                inner
                    .disconnected
                    .insert(username.to_string(), Instant::now());
                let message = format!(
                    "Player disconnected. They have {} seconds to reconnect.",
                    inner.reconnect_grace.as_secs()
                );
                tracing::info!(room_id = %self.id, %username, "player disconnected, grace started");
                inner.deliver_except(
                    username,
                    ServerFrame::PlayerDisconnected {
                        username: username.to_string(),
                        message,
                    },
                );
                DisconnectOutcome::GraceStarted
            }
        }
    }

    /// Restores a disconnected player's seat on a new transport.
    pub fn rejoin(
        &self,
        username: &str,
        sender: ClientSender,
    ) -> Result<RejoinOutcome, RoomError> {
        let mut inner = self.lock();
        let Some(since) = inner.disconnected.get(username).copied() else {
            return Err(RoomError::NotDisconnected);
        };

        if since.elapsed() > inner.reconnect_grace {
            // Too late — the rejoin itself resolves what the grace timer
            // would have: the survivor wins.
            inner.disconnected.remove(username);
            tracing::info!(room_id = %self.id, %username, "rejoin after grace expiry");
            let settlement = self.finish_against(
                &mut inner,
                username,
                Some("Opponent failed to reconnect in time".to_string()),
            );
            return Ok(RejoinOutcome::Expired { settlement });
        }

        inner.disconnected.remove(username);
        if let Some(slot) =
            inner.players.iter_mut().find(|s| s.username == username)
        {
            slot.sender = Some(sender);
        }
        tracing::info!(room_id = %self.id, %username, "player rejoined");

        let payload = inner.start_payload(&self.id, username);
        inner.deliver_to(username, ServerFrame::GameRejoined(payload));
        inner.deliver_except(
            username,
            ServerFrame::PlayerRejoined {
                username: username.to_string(),
            },
        );
        Ok(RejoinOutcome::Rejoined)
    }

    /// Resolves an expired grace window.
    ///
    /// Fired by the timer armed at disconnect; re-reads everything under
    /// the lock because a rejoin, a win, or a second disconnect may have
    /// landed since.
    pub fn grace_timeout(&self, username: &str) -> GraceOutcome {
        let mut inner = self.lock();
        if inner.status != RoomStatus::Playing
            || !inner.disconnected.contains_key(username)
        {
            return GraceOutcome::NoOp;
        }

        let any_active_human = inner.players.iter().any(|s| {
            s.username != BOT_USERNAME
                && !inner.disconnected.contains_key(&s.username)
        });
        if !any_active_human {
            tracing::info!(room_id = %self.id, "all players gone, deleting room");
            return GraceOutcome::DeleteRoom;
        }

        let settlement = self.finish_against(
            &mut inner,
            username,
            Some("Opponent failed to reconnect in time".to_string()),
        );
        GraceOutcome::Finished { settlement }
    }

    /// Ends the game against `quitter` (new-game-while-playing).
    ///
    /// Same terminal path as a grace expiry, including the stats
    /// settlement.
    pub fn forfeit(&self, quitter: &str) -> GraceOutcome {
        let mut inner = self.lock();
        match inner.status {
            RoomStatus::Finished => GraceOutcome::NoOp,
            RoomStatus::Waiting => GraceOutcome::DeleteRoom,
            RoomStatus::Playing => {
                let settlement =
                    self.finish_against(&mut inner, quitter, None);
                GraceOutcome::Finished { settlement }
            }
        }
    }

    /// Declares the player other than `loser` the winner and fans out
    /// the final update.
    fn finish_against(
        &self,
        inner: &mut RoomInner,
        loser: &str,
        note: Option<String>,
    ) -> Option<Settlement> {
        let winner = inner
            .players
            .iter()
            .map(|s| s.username.clone())
            .find(|u| u != loser)?;
        inner.winner = winner.clone();
        inner.status = RoomStatus::Finished;
        tracing::info!(room_id = %self.id, %winner, %loser, "game forfeited");
        inner.broadcast_update(&self.id, note);
        inner.settlement()
    }
}

impl RoomInner {
    fn player_names(&self) -> Vec<String> {
        self.players.iter().map(|s| s.username.clone()).collect()
    }

    fn other_player(&self, username: &str) -> Option<String> {
        self.players
            .iter()
            .map(|s| s.username.clone())
            .find(|u| u != username)
    }

    /// Seat color: the creator (`players[0]`) is red.
    fn color_of(&self, username: &str) -> CellColor {
        match self.players.first() {
            Some(first) if first.username == username => CellColor::Red,
            _ => CellColor::Blue,
        }
    }

    /// The stats to persist for the current terminal state, if any.
    ///
    /// `None` whenever the bot sits on either side — the bot is never
    /// persisted.
    fn settlement(&self) -> Option<Settlement> {
        let names = self.player_names();
        if names.iter().any(|u| u == BOT_USERNAME) || names.len() != 2 {
            return None;
        }
        if self.winner.is_empty() {
            Some(Settlement::Draw {
                a: names[0].clone(),
                b: names[1].clone(),
            })
        } else {
            let loser = self.other_player(&self.winner)?;
            Some(Settlement::Win {
                winner: self.winner.clone(),
                loser,
            })
        }
    }

    /// Personalized full snapshot (`game_started` / `game_rejoined`).
    fn start_payload(&self, id: &Uuid, username: &str) -> GameStartPayload {
        let (player_color, opponent_color) =
            match self.color_of(username) {
                CellColor::Red => (CellColor::Red, CellColor::Blue),
                _ => (CellColor::Blue, CellColor::Red),
            };
        GameStartPayload {
            room_id: id.to_string(),
            status: self.status,
            opponent_type: self.opponent.unwrap_or(OpponentType::Human),
            current_turn: self.current_turn.clone(),
            total_players: self.players.len(),
            players: self.player_names(),
            grid_data: self.grid.clone(),
            player_username: username.to_string(),
            player_color,
            opponent_color,
            opponent_username: self.other_player(username).unwrap_or_default(),
        }
    }

    /// Fans out the current board state to every seated human.
    fn broadcast_update(&self, id: &Uuid, message: Option<String>) {
        let payload = GameUpdatePayload {
            room_id: id.to_string(),
            status: self.status,
            current_turn: self.current_turn.clone(),
            grid_data: self.grid.clone(),
            winner: (self.status == RoomStatus::Finished)
                .then(|| self.winner.clone()),
            message,
        };
        self.deliver_all(ServerFrame::GameUpdate(payload));
    }

    fn deliver_to(&self, username: &str, frame: ServerFrame) {
        if let Some(slot) =
            self.players.iter().find(|s| s.username == username)
        {
            if let Some(tx) = &slot.sender {
                let _ = tx.send(frame);
            }
        }
    }

    fn deliver_except(&self, username: &str, frame: ServerFrame) {
        for slot in &self.players {
            if slot.username != username {
                if let Some(tx) = &slot.sender {
                    let _ = tx.send(frame.clone());
                }
            }
        }
    }

    fn deliver_all(&self, frame: ServerFrame) {
        for slot in &self.players {
            if let Some(tx) = &slot.sender {
                let _ = tx.send(frame.clone());
            }
        }
    }
}
