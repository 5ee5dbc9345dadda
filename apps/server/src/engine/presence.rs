//! Disconnection, reconnection, AFK marking, and forced removal.
//!
//! Losing an Active seat pauses the whole table and opens a grace window.
//! The seat may return (same identity, or a case-insensitive name match)
//! and pick up exactly where it left off; otherwise the grace timer removes
//! it, transferring host privilege and, below two Active seats, tearing the
//! session down to the lobby.

use time::OffsetDateTime;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::domain::rules::MIN_PLAYERS;
use crate::engine::events::{Broadcaster, Event};
use crate::engine::state::{Phase, PlayerStatus, Seat};
use crate::engine::timers::Scheduler;
use crate::engine::GameEngine;
use crate::errors::domain::{DomainError, NotFoundKind, ValidationKind};
use crate::lobby::{ConnectionId, PlayerId};

/// Names are matched NFKC-normalized and lowercased, so "José" finds
/// "josé" after a client re-types it.
fn normalize_name(name: &str) -> String {
    name.trim().nfkc().collect::<String>().to_lowercase()
}

impl<B: Broadcaster, S: Scheduler> GameEngine<B, S> {
    /// `join` lands here for lobby joins and in-game reconnects alike.
    pub(crate) fn join(
        &mut self,
        connection: ConnectionId,
        name: String,
        player_id: Option<PlayerId>,
    ) -> Result<(), DomainError> {
        if self.session.is_some() {
            return self.rejoin_game(connection, name, player_id);
        }
        let id = self.lobby.join(connection, name, player_id);
        let roster = self.lobby.roster().to_vec();
        self.broadcaster.send(
            connection,
            &Event::JoinAccepted {
                player_id: id,
                roster,
            },
        );
        self.broadcast_lobby();
        Ok(())
    }

    /// Reconnect into the running game: stable identity first, then a
    /// case-insensitive name match among Disconnected seats.
    fn rejoin_game(
        &mut self,
        connection: ConnectionId,
        name: String,
        player_id: Option<PlayerId>,
    ) -> Result<(), DomainError> {
        let seat = {
            let session = self.require_session()?;
            let by_id = player_id.and_then(|id| {
                session
                    .players
                    .iter()
                    .position(|p| p.status == PlayerStatus::Disconnected && p.player_id == id)
            });
            by_id.or_else(|| {
                let wanted = normalize_name(&name);
                session.players.iter().position(|p| {
                    p.status == PlayerStatus::Disconnected && normalize_name(&p.name) == wanted
                })
            })
        };
        let Some(seat) = seat else {
            return Err(DomainError::validation(
                ValidationKind::PhaseMismatch,
                "Game is already in progress.",
            ));
        };

        let (pid, pname) = {
            let session = self.require_session()?;
            (
                session.players[seat].player_id,
                session.players[seat].name.clone(),
            )
        };
        // Keep the dormant lobby roster in step with the new connection.
        self.lobby.join(connection, pname.clone(), Some(pid));
        let roster = self.lobby.roster().to_vec();
        self.broadcaster.send(
            connection,
            &Event::JoinAccepted {
                player_id: pid,
                roster,
            },
        );
        self.restore_seat(
            seat,
            Some(connection),
            format!("Player {pname} has reconnected."),
        );
        Ok(())
    }

    /// A seat marked away declares itself present again, on its existing
    /// connection.
    pub(crate) fn i_am_back(&mut self, connection: ConnectionId) -> Result<(), DomainError> {
        let seat = {
            let session = self.require_session()?;
            session.players.iter().position(|p| {
                p.connection == Some(connection) && p.status == PlayerStatus::Disconnected
            })
        };
        let Some(seat) = seat else {
            return Err(DomainError::validation_other("You are not marked away."));
        };
        let name = self.require_session()?.players[seat].name.clone();
        self.restore_seat(seat, None, format!("Player {name} is back."));
        Ok(())
    }

    /// Common tail of every return path: reactivate the seat, cancel its
    /// removal, and lift the pause once nobody is missing. If the returning
    /// seat is the current actor, its prompt and timer are re-issued rather
    /// than its turn skipped.
    fn restore_seat(&mut self, seat: Seat, new_connection: Option<ConnectionId>, line: String) {
        let (player_id, resumed) = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            let player = &mut session.players[seat];
            player.status = PlayerStatus::Active;
            if let Some(connection) = new_connection {
                player.connection = Some(connection);
            }
            let player_id = player.player_id;
            let still_waiting = session.has_disconnected();
            if still_waiting {
                session.paused_for = session.disconnected_names();
            } else {
                session.paused = false;
                session.paused_for.clear();
                session.pause_deadline = None;
            }
            (player_id, !still_waiting)
        };
        self.cancel_grace_timer(player_id);
        if resumed {
            self.resume_phase();
        }
        self.log(line);
        self.broadcast_snapshot();
    }

    /// Re-arm whatever the interrupted phase was waiting on.
    pub(crate) fn resume_phase(&mut self) {
        let (phase, bidder, max_bid, round_end_pending) = {
            let Some(session) = self.session.as_ref() else {
                return;
            };
            (
                session.phase,
                session.bidding_seat,
                session.cards_to_deal,
                session.round_end_pending(),
            )
        };
        match phase {
            Phase::Bidding => {
                self.arm_turn_timer();
                if let Some(seat) = bidder {
                    self.send_to_seat(seat, &Event::BidPrompt { max_bid });
                }
            }
            Phase::Playing => {
                if round_end_pending {
                    self.arm_round_end_timer();
                } else {
                    self.arm_turn_timer();
                }
            }
            Phase::TrickReview => self.arm_review_timer(),
            Phase::RoundOver | Phase::GameOver => {}
        }
    }

    /// Transport lost a connection. An Active seat starts the pause+grace
    /// path; a lobby member is just marked away from the roster.
    pub(crate) fn connection_lost(&mut self, connection: ConnectionId) {
        if self.session.is_some() {
            let seat = self.session.as_ref().and_then(|s| {
                s.players.iter().position(|p| {
                    p.connection == Some(connection) && p.status == PlayerStatus::Active
                })
            });
            self.lobby.mark_disconnected(connection);
            if let Some(seat) = seat {
                let name = match self.session.as_ref() {
                    Some(s) => s.players[seat].name.clone(),
                    None => return,
                };
                self.begin_grace(
                    seat,
                    format!("Player {name} has disconnected. The game is paused."),
                );
            }
        } else if self.lobby.mark_disconnected(connection) {
            self.broadcast_lobby();
        }
    }

    /// Host pushes a timed-out seat into the same pause+grace path a
    /// disconnect would take.
    pub(crate) fn mark_afk(
        &mut self,
        connection: ConnectionId,
        seat: Seat,
    ) -> Result<(), DomainError> {
        self.require_session_host(connection)?;
        let name = {
            let session = self.require_session()?;
            let Some(player) = session.players.get(seat) else {
                return Err(DomainError::not_found(NotFoundKind::Seat, "No such seat."));
            };
            if player.status != PlayerStatus::Active {
                return Err(DomainError::validation(
                    ValidationKind::PhaseMismatch,
                    "That player cannot be marked away.",
                ));
            }
            if !player.inactive {
                return Err(DomainError::validation(
                    ValidationKind::SeatNotInactive,
                    "That player has not timed out.",
                ));
            }
            player.name.clone()
        };
        self.send_to_seat(seat, &Event::MarkedAfk);
        self.begin_grace(seat, format!("Player {name} was marked away by the host."));
        Ok(())
    }

    /// Pause the table for a missing seat and start its removal countdown.
    /// Auto-advance timers are left armed; they check the pause when they
    /// fire and are re-armed on resume.
    fn begin_grace(&mut self, seat: Seat, line: String) {
        let player_id = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            session.players[seat].status = PlayerStatus::Disconnected;
            session.paused = true;
            session.paused_for = session.disconnected_names();
            session.pause_deadline =
                Some(OffsetDateTime::now_utc() + self.config.disconnect_grace);
            session.players[seat].player_id
        };
        self.log(line);
        self.disarm_turn_timer();
        self.arm_grace_timer(player_id);
        self.broadcast_snapshot();
    }

    /// Grace window closed without a return.
    pub(crate) fn grace_expired(&mut self, player_id: PlayerId) {
        let seat = {
            let Some(session) = self.session.as_ref() else {
                return;
            };
            match session.seat_of_player(player_id) {
                Some(seat) if session.players[seat].status == PlayerStatus::Disconnected => seat,
                _ => {
                    debug!("Grace expiry for a seat no longer disconnected; dropping");
                    return;
                }
            }
        };
        self.timers.grace.remove(&player_id);
        self.remove_seat(seat);
    }

    /// Remove a seat for good: host transfer, teardown fallback, actor
    /// advancement, and pause resolution, in that order.
    pub(crate) fn remove_seat(&mut self, seat: Seat) {
        let (name, was_host, player_id) = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            let player = &mut session.players[seat];
            player.status = PlayerStatus::Removed;
            let was_host = player.is_host;
            player.is_host = false;
            (player.name.clone(), was_host, player.player_id)
        };
        self.cancel_grace_timer(player_id);
        self.log(format!(
            "Player {name} failed to reconnect and has been removed."
        ));

        if was_host {
            let new_host = {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                match session.first_active_seat() {
                    Some(host_seat) => {
                        session.players[host_seat].is_host = true;
                        Some(session.players[host_seat].name.clone())
                    }
                    None => None,
                }
            };
            if let Some(new_host) = new_host {
                self.log(format!("Host privileges transferred to {new_host}."));
            }
        }

        let too_few = match self.session.as_ref() {
            Some(session) => session.active_count() < MIN_PLAYERS,
            None => return,
        };
        if too_few {
            self.log("Not enough players to continue. Returning to lobby.".to_string());
            self.teardown_to_lobby();
            return;
        }

        let resumed = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            let was_bidding = session.phase == Phase::Bidding && session.bidding_seat == Some(seat);
            let was_playing = session.phase == Phase::Playing && session.acting_seat == Some(seat);
            if was_bidding {
                session.bidding_seat = session.active_seat_from(seat);
            }
            if was_playing {
                session.acting_seat = session.active_seat_from(seat);
            }
            if !session.has_disconnected() && session.paused {
                session.paused = false;
                session.paused_for.clear();
                session.pause_deadline = None;
                true
            } else {
                session.paused_for = session.disconnected_names();
                false
            }
        };

        // A shrunken table may have just completed the trick: it resolves
        // exactly when every Active seat has contributed.
        let needs_resolution = self.timers.round_end.is_none()
            && self
                .session
                .as_ref()
                .map(|s| s.phase == Phase::Playing && s.trick_complete())
                .unwrap_or(false);
        if needs_resolution {
            if let Err(err) = self.finish_trick() {
                debug!(%err, "Trick resolution after removal failed");
            }
        } else if resumed {
            self.resume_phase();
        }
        self.broadcast_snapshot();
    }
}
