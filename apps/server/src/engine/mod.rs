//! Session engine: owns the canonical game state and drives the phase
//! machine.
//!
//! Single-threaded and event-driven. The only inputs are inbound commands,
//! dropped connections, and fired timers; each is handled to completion
//! before the next, so there is no locking and no interleaving within a
//! transition. Every state write is followed by a full-state broadcast.

pub mod bidding;
pub mod commands;
pub mod events;
pub mod lifecycle;
pub mod playing;
pub mod presence;
pub mod state;
pub mod test_support;
pub mod timers;

#[cfg(test)]
mod tests_bidding;
#[cfg(test)]
mod tests_playing;
#[cfg(test)]
mod tests_presence;

use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::errors::domain::{DomainError, NotFoundKind, ValidationKind};
use crate::lobby::{ConnectionId, Lobby, PlayerId};

use self::commands::Command;
use self::events::{Broadcaster, Event};
use self::state::{Phase, Seat, Session};
use self::timers::{Scheduler, SessionTimers, TaskKind, TimerTask};

/// Everything that can wake the engine.
#[derive(Debug)]
pub enum Inbound {
    Command {
        connection: ConnectionId,
        command: Command,
    },
    /// Transport noticed a connection go away.
    ConnectionLost(ConnectionId),
    /// A scheduled task came due.
    Timer(TimerTask),
}

pub struct GameEngine<B: Broadcaster, S: Scheduler> {
    config: GameConfig,
    lobby: Lobby,
    session: Option<Session>,
    timers: SessionTimers,
    /// Monotonic generation counter; each session gets the next value.
    next_epoch: u64,
    rng: ChaCha12Rng,
    broadcaster: B,
    scheduler: S,
}

impl<B: Broadcaster, S: Scheduler> GameEngine<B, S> {
    pub fn new(config: GameConfig, broadcaster: B, scheduler: S) -> Self {
        Self::with_rng(config, broadcaster, scheduler, ChaCha12Rng::from_os_rng())
    }

    /// Seeded construction for deterministic dealing in tests.
    pub fn with_rng(config: GameConfig, broadcaster: B, scheduler: S, rng: ChaCha12Rng) -> Self {
        Self {
            config,
            lobby: Lobby::default(),
            session: None,
            timers: SessionTimers::default(),
            next_epoch: 1,
            rng,
            broadcaster,
            scheduler,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    #[cfg(test)]
    pub(crate) fn session_mut(&mut self) -> &mut Session {
        self.session.as_mut().expect("test session")
    }

    /// Entry point for every input; each call runs one atomic transition.
    pub fn handle(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Command {
                connection,
                command,
            } => self.handle_command(connection, command),
            Inbound::ConnectionLost(connection) => self.connection_lost(connection),
            Inbound::Timer(task) => self.handle_timer(task),
        }
    }

    pub fn handle_command(&mut self, connection: ConnectionId, command: Command) {
        debug!(?command, "Handling command");
        let result = match command {
            Command::Join { name, player_id } => self.join(connection, name, player_id),
            Command::SetReady => self.set_ready(connection),
            Command::KickFromLobby { player_id } => self.kick_from_lobby(connection, player_id),
            Command::StartGame { password } => self.start_game(connection, password),
            Command::StartNextRound => self.start_next_round(connection),
            Command::EndGame => self.end_game(connection),
            Command::EndSession => self.end_session(connection),
            Command::HardReset => self.hard_reset(connection),
            Command::MarkAfk { seat } => self.mark_afk(connection, seat),
            Command::IAmBack => self.i_am_back(connection),
            Command::SubmitBid { bid } => self.submit_bid(connection, bid),
            Command::PlayCard { card } => self.play_card(connection, card),
            Command::RearrangeHand { hand } => self.rearrange_hand(connection, hand),
        };
        if let Err(err) = result {
            self.reject(connection, &err);
        }
    }

    /// Route a fired task, or silently drop it if its session is gone or
    /// superseded. A stale callback is expected traffic, never an error.
    fn handle_timer(&mut self, task: TimerTask) {
        let live_epoch = match self.session.as_ref() {
            Some(session) => session.epoch,
            None => {
                debug!(task_epoch = task.epoch, "Timer fired with no session; dropping");
                return;
            }
        };
        if live_epoch != task.epoch {
            debug!(
                task_epoch = task.epoch,
                live_epoch, "Timer fired against a superseded session; dropping"
            );
            return;
        }
        match task.kind {
            TaskKind::TurnDeadline { seat } => self.turn_deadline_fired(seat),
            TaskKind::TrickAdvance => self.trick_advance_fired(),
            TaskKind::RoundEnd => self.round_end_fired(),
            TaskKind::GraceExpiry { player_id } => self.grace_expired(player_id),
            TaskKind::GameOverCleanup => self.cleanup_fired(),
        }
    }

    // ---- shared plumbing ----------------------------------------------

    fn require_session(&self) -> Result<&Session, DomainError> {
        self.session.as_ref().ok_or_else(|| {
            DomainError::not_found(NotFoundKind::Session, "No game in progress.")
        })
    }

    fn require_session_mut(&mut self) -> Result<&mut Session, DomainError> {
        self.session.as_mut().ok_or_else(|| {
            DomainError::not_found(NotFoundKind::Session, "No game in progress.")
        })
    }

    /// Seat of the sending connection, any status.
    fn seat_of(&self, connection: ConnectionId) -> Result<Seat, DomainError> {
        self.require_session()?
            .seat_of_connection(connection)
            .ok_or_else(|| {
                DomainError::not_found(NotFoundKind::Player, "You are not seated at this table.")
            })
    }

    fn require_session_host(&self, connection: ConnectionId) -> Result<Seat, DomainError> {
        let seat = self.seat_of(connection)?;
        if self.require_session()?.players[seat].is_host {
            Ok(seat)
        } else {
            Err(DomainError::validation(
                ValidationKind::NotHost,
                "Only the host can do that.",
            ))
        }
    }

    fn require_lobby_host(&self, connection: ConnectionId) -> Result<PlayerId, DomainError> {
        match self.lobby.find_by_connection(connection) {
            Some(p) if p.is_host => Ok(p.player_id),
            _ => Err(DomainError::validation(
                ValidationKind::NotHost,
                "Only the host can do that.",
            )),
        }
    }

    /// Report a validation failure to the offending sender only.
    fn reject(&mut self, connection: ConnectionId, err: &DomainError) {
        debug!(%err, "Rejecting command");
        let event = match err.validation_kind() {
            Some(ValidationKind::InvalidBid) => Event::InvalidBid {
                message: err.to_string(),
            },
            _ => Event::Announce {
                message: err.to_string(),
            },
        };
        self.broadcaster.send(connection, &event);
    }

    /// Append to the session log and mirror it to every client.
    fn log(&mut self, line: String) {
        info!(%line, "game log");
        if let Some(session) = self.session.as_mut() {
            session.push_log(line.clone());
        }
        self.broadcaster.broadcast(&Event::GameLog { line });
    }

    fn broadcast_snapshot(&mut self) {
        if let Some(session) = self.session.as_ref() {
            let snapshot = Box::new(session.clone());
            self.broadcaster.broadcast(&Event::Snapshot(snapshot));
        }
    }

    fn broadcast_lobby(&mut self) {
        let roster = self.lobby.roster().to_vec();
        self.broadcaster.broadcast(&Event::LobbyUpdate { roster });
    }

    fn send_to_seat(&mut self, seat: Seat, event: &Event) {
        let connection = self
            .session
            .as_ref()
            .and_then(|s| s.players.get(seat))
            .and_then(|p| p.connection);
        if let Some(connection) = connection {
            self.broadcaster.send(connection, event);
        }
    }

    // ---- timer arming --------------------------------------------------
    //
    // Arming any purpose first cancels its predecessor, so re-arming is
    // idempotent and at most one deadline per purpose is outstanding.

    fn arm_turn_timer(&mut self) {
        self.disarm_turn_timer();
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.paused {
            return;
        }
        let seat = match session.phase {
            Phase::Bidding => session.bidding_seat,
            Phase::Playing => session.acting_seat,
            _ => None,
        };
        let Some(seat) = seat else {
            return;
        };
        let task = TimerTask {
            epoch: session.epoch,
            kind: TaskKind::TurnDeadline { seat },
        };
        let id = self.scheduler.schedule(self.config.turn_timer, task);
        self.timers.turn = Some(id);
        if let Some(session) = self.session.as_mut() {
            session.turn_deadline = Some(OffsetDateTime::now_utc() + self.config.turn_timer);
        }
    }

    fn disarm_turn_timer(&mut self) {
        if let Some(id) = self.timers.turn.take() {
            self.scheduler.cancel(id);
        }
        if let Some(session) = self.session.as_mut() {
            session.turn_deadline = None;
        }
    }

    fn arm_review_timer(&mut self) {
        if let Some(id) = self.timers.trick_advance.take() {
            self.scheduler.cancel(id);
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let task = TimerTask {
            epoch: session.epoch,
            kind: TaskKind::TrickAdvance,
        };
        let id = self.scheduler.schedule(self.config.trick_review, task);
        self.timers.trick_advance = Some(id);
        if let Some(session) = self.session.as_mut() {
            session.review_deadline = Some(OffsetDateTime::now_utc() + self.config.trick_review);
        }
    }

    fn arm_round_end_timer(&mut self) {
        if let Some(id) = self.timers.round_end.take() {
            self.scheduler.cancel(id);
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let task = TimerTask {
            epoch: session.epoch,
            kind: TaskKind::RoundEnd,
        };
        let id = self.scheduler.schedule(self.config.round_end_delay, task);
        self.timers.round_end = Some(id);
    }

    fn arm_grace_timer(&mut self, player_id: PlayerId) {
        if let Some(id) = self.timers.grace.remove(&player_id) {
            self.scheduler.cancel(id);
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let task = TimerTask {
            epoch: session.epoch,
            kind: TaskKind::GraceExpiry { player_id },
        };
        let id = self.scheduler.schedule(self.config.disconnect_grace, task);
        self.timers.grace.insert(player_id, id);
    }

    fn cancel_grace_timer(&mut self, player_id: PlayerId) {
        if let Some(id) = self.timers.grace.remove(&player_id) {
            self.scheduler.cancel(id);
        }
    }

    fn arm_cleanup_timer(&mut self) {
        if let Some(id) = self.timers.cleanup.take() {
            self.scheduler.cancel(id);
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let task = TimerTask {
            epoch: session.epoch,
            kind: TaskKind::GameOverCleanup,
        };
        let id = self.scheduler.schedule(self.config.game_over_cleanup, task);
        self.timers.cleanup = Some(id);
    }

    /// Turn-timer expiry flags the seat; it never advances the turn. The
    /// host decides whether to remove the straggler.
    fn turn_deadline_fired(&mut self, seat: Seat) {
        let name = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            let still_acting = !session.paused
                && match session.phase {
                    Phase::Bidding => session.bidding_seat == Some(seat),
                    Phase::Playing => session.acting_seat == Some(seat),
                    _ => false,
                };
            if !still_acting {
                debug!(seat, "Turn deadline fired for a seat no longer acting; dropping");
                return;
            }
            session.players[seat].inactive = true;
            session.turn_deadline = None;
            session.players[seat].name.clone()
        };
        self.timers.turn = None;
        self.log(format!(
            "Player {name} is inactive. The host can now remove them."
        ));
        self.broadcast_snapshot();
    }

    /// Cancel every outstanding task and drop the handles.
    fn cancel_all_timers(&mut self) {
        self.timers.cancel_all(&mut self.scheduler);
    }
}
