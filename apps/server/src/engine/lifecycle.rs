//! Game lifecycle: start, round rollover, scoring, game over, teardown.

use rand::Rng;
use tracing::{debug, info};

use crate::domain::rules::{self, MIN_PLAYERS};
use crate::domain::shuffled_deck;
use crate::domain::Trump;
use crate::engine::events::{Broadcaster, Event, FinalStanding};
use crate::engine::state::{NextRoundInfo, Phase, PlayerStatus, Seat, Session};
use crate::engine::timers::Scheduler;
use crate::engine::GameEngine;
use crate::errors::domain::{DomainError, ValidationKind};
use crate::lobby::{ConnectionId, LobbyPlayer, PlayerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStart {
    pub round_no: u32,
    pub cards_to_deal: u8,
    pub trump: Trump,
    pub first_bidder: Seat,
}

/// Roll the session into its next round: advance the deal schedule, rotate
/// the dealer, cycle trump, shuffle and deal. Returns `None` when the
/// schedule is exhausted (the game is over instead).
pub fn begin_round<R: Rng>(session: &mut Session, rng: &mut R) -> Option<RoundStart> {
    let round_no = session.round_no + 1;
    let cards_to_deal = rules::cards_for_round(session.max_rounds, round_no)?;

    session.round_no = round_no;
    session.cards_to_deal = cards_to_deal;
    session.dealer_seat = if round_no == 1 {
        session.first_active_seat()?
    } else {
        session.next_active_seat(session.dealer_seat)?
    };
    session.trump = rules::trump_for_round(round_no);

    let mut deck = shuffled_deck(rng);
    for player in &mut session.players {
        player.bid = None;
        player.tricks_won = 0;
        player.inactive = false;
        if player.status == PlayerStatus::Active {
            player.hand = deck.drain(..cards_to_deal as usize).collect();
        } else {
            player.hand.clear();
        }
    }

    session.current_trick.clear();
    session.lead_suit = None;
    session.current_winning_seat = None;
    session.last_completed_trick = None;
    session.next_round_info = None;
    session.phase = Phase::Bidding;
    session.acting_seat = None;
    let first_bidder = session.first_bidder_seat()?;
    session.bidding_seat = Some(first_bidder);

    Some(RoundStart {
        round_no,
        cards_to_deal,
        trump: session.trump,
        first_bidder,
    })
}

/// Score the finished round. Active seats earn their delta and a history
/// entry; everyone else gets a `None` entry. Returns true when this was the
/// final round of the schedule.
pub fn apply_round_scoring(session: &mut Session) -> bool {
    for player in &mut session.players {
        if player.status != PlayerStatus::Active {
            player.score_history.push(None);
            continue;
        }
        let delta = match player.bid {
            Some(bid) => rules::round_score(bid, player.tricks_won),
            // A seat that never got to bid scores nothing either way.
            None => 0,
        };
        player.score += delta;
        player.score_history.push(Some(delta));
    }

    if session.cards_to_deal <= 1 {
        return true;
    }

    session.phase = Phase::RoundOver;
    let next_round_no = session.round_no + 1;
    let next_cards = rules::cards_for_round(session.max_rounds, next_round_no);
    session.next_round_info = Some(NextRoundInfo {
        next_cards,
        next_trump: next_cards.map(|_| rules::trump_for_round(next_round_no)),
        next_dealer: session
            .next_active_seat(session.dealer_seat)
            .map(|seat| session.players[seat].name.clone()),
    });
    false
}

/// Final standings: best score among everyone who finished the game
/// (Removed seats are out of contention), ties included.
pub fn final_standings(session: &Session) -> Vec<FinalStanding> {
    let eligible: Vec<&_> = session
        .players
        .iter()
        .filter(|p| p.status != PlayerStatus::Removed)
        .collect();
    let Some(best) = eligible.iter().map(|p| p.score).max() else {
        return Vec::new();
    };
    eligible
        .iter()
        .filter(|p| p.score == best)
        .map(|p| FinalStanding {
            name: p.name.clone(),
            score: p.score,
        })
        .collect()
}

impl<B: Broadcaster, S: Scheduler> GameEngine<B, S> {
    pub(crate) fn set_ready(&mut self, connection: ConnectionId) -> Result<(), DomainError> {
        let Some(player) = self.lobby.find_by_connection_mut(connection) else {
            return Err(DomainError::validation_other("You are not in the lobby."));
        };
        if !player.is_ready {
            player.is_ready = true;
            self.broadcast_lobby();
        }
        Ok(())
    }

    pub(crate) fn kick_from_lobby(
        &mut self,
        connection: ConnectionId,
        player_id: PlayerId,
    ) -> Result<(), DomainError> {
        self.require_lobby_host(connection)?;
        self.lobby.remove(player_id);
        self.broadcast_lobby();
        Ok(())
    }

    pub(crate) fn start_game(
        &mut self,
        connection: ConnectionId,
        password: Option<String>,
    ) -> Result<(), DomainError> {
        if self.session.is_some() {
            return Err(DomainError::validation(
                ValidationKind::PhaseMismatch,
                "Game is already in progress.",
            ));
        }
        self.require_lobby_host(connection)?;
        if let Some(expected) = self.config.host_password.as_deref() {
            if password.as_deref() != Some(expected) {
                return Err(DomainError::validation(
                    ValidationKind::BadPassword,
                    "Incorrect host password.",
                ));
            }
        }
        let ready: Vec<LobbyPlayer> = self.lobby.ready_players().into_iter().cloned().collect();
        if ready.len() < MIN_PLAYERS {
            return Err(DomainError::validation(
                ValidationKind::NotEnoughPlayers,
                "Not enough ready players to start the game.",
            ));
        }

        let epoch = self.next_epoch;
        self.next_epoch += 1;
        info!(players = ready.len(), epoch, "Starting game");
        self.session = Some(Session::from_roster(&ready, epoch));
        self.start_round();
        Ok(())
    }

    pub(crate) fn start_next_round(&mut self, connection: ConnectionId) -> Result<(), DomainError> {
        self.require_session_host(connection)?;
        let session = self.require_session()?;
        if session.phase != Phase::RoundOver {
            return Err(DomainError::validation(
                ValidationKind::PhaseMismatch,
                "The round is still in progress.",
            ));
        }
        if session.paused {
            return Err(DomainError::validation(
                ValidationKind::GamePaused,
                "The game is paused.",
            ));
        }
        self.start_round();
        Ok(())
    }

    /// Deal the next round, or end the game when the schedule is exhausted.
    pub(crate) fn start_round(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(start) = begin_round(session, &mut self.rng) else {
            self.game_over();
            return;
        };
        self.arm_turn_timer();
        self.log(format!(
            "Round {} begins. Cards: {}. Trump: {}.",
            start.round_no, start.cards_to_deal, start.trump
        ));
        self.broadcast_snapshot();
        self.send_to_seat(
            start.first_bidder,
            &Event::BidPrompt {
                max_bid: start.cards_to_deal,
            },
        );
    }

    /// Round-end delay elapsed: score the round, then either show the
    /// round-over screen or finish the game.
    pub(crate) fn round_end_fired(&mut self) {
        let (game_over, round_no) = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            if !session.round_end_pending() || session.paused {
                debug!("Round end fired out of position; dropping");
                return;
            }
            (apply_round_scoring(session), session.round_no)
        };
        self.timers.round_end = None;
        if game_over {
            self.game_over();
        } else {
            self.log(format!("🏁 Round {round_no} has ended. Scores calculated."));
            self.broadcast_snapshot();
        }
    }

    /// Terminal phase: announce winners and schedule the table reset.
    pub(crate) fn game_over(&mut self) {
        self.disarm_turn_timer();
        let (snapshot, winners) = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            if session.phase == Phase::GameOver {
                return;
            }
            session.phase = Phase::GameOver;
            session.bidding_seat = None;
            session.acting_seat = None;
            let winners = final_standings(session);
            (Box::new(session.clone()), winners)
        };
        // Grace timers make no sense once the game is decided.
        let waiting: Vec<PlayerId> = self.timers.grace.keys().copied().collect();
        for player_id in waiting {
            self.cancel_grace_timer(player_id);
        }
        info!(winners = winners.len(), "Game over");
        self.log("GAME OVER!".to_string());
        self.broadcaster
            .broadcast(&Event::FinalGameOver { snapshot, winners });
        self.broadcast_snapshot();
        self.arm_cleanup_timer();
    }

    /// Game-over screen lingered long enough; back to the lobby.
    pub(crate) fn cleanup_fired(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.phase != Phase::GameOver {
            debug!("Cleanup fired outside game over; dropping");
            return;
        }
        info!("Game over state timed out. Resetting to lobby.");
        self.teardown_to_lobby();
    }

    pub(crate) fn end_game(&mut self, connection: ConnectionId) -> Result<(), DomainError> {
        self.require_session_host(connection)?;
        info!("Host ended the game");
        self.teardown_to_lobby();
        Ok(())
    }

    /// Destroy the session and hand the surviving roster back to the lobby.
    /// Removed seats are dropped; host privilege carries over, and only the
    /// host returns pre-readied.
    pub(crate) fn teardown_to_lobby(&mut self) {
        self.cancel_all_timers();
        let Some(session) = self.session.take() else {
            return;
        };
        let roster: Vec<LobbyPlayer> = session
            .players
            .into_iter()
            .filter(|p| p.status != PlayerStatus::Removed)
            .map(|p| LobbyPlayer {
                player_id: p.player_id,
                connection: p.connection,
                name: p.name,
                is_host: p.is_host,
                is_ready: p.is_host,
                connected: p.status == PlayerStatus::Active,
            })
            .collect();
        self.lobby.replace(roster);
        self.broadcast_lobby();
    }

    /// Host clears the lobby down to themselves.
    pub(crate) fn end_session(&mut self, connection: ConnectionId) -> Result<(), DomainError> {
        let host_id = self.require_lobby_host(connection)?;
        let others: Vec<ConnectionId> = self
            .lobby
            .connections()
            .into_iter()
            .filter(|&c| c != connection)
            .collect();
        for other in others {
            self.broadcaster.send(other, &Event::ForceDisconnect);
        }
        self.lobby.retain_only(host_id);
        self.broadcast_lobby();
        Ok(())
    }

    /// Panic button: tear down the session and the roster alike. Everyone,
    /// including the host, must rejoin.
    pub(crate) fn hard_reset(&mut self, connection: ConnectionId) -> Result<(), DomainError> {
        let is_session_host = self.require_session_host(connection).is_ok();
        if !is_session_host {
            self.require_lobby_host(connection)?;
        }
        info!("Hard reset requested by host");
        self.cancel_all_timers();

        let mut connections = self.lobby.connections();
        if let Some(session) = self.session.take() {
            connections.extend(session.players.iter().filter_map(|p| p.connection));
        }
        connections.sort_by_key(|c| c.0);
        connections.dedup();
        for target in connections {
            self.broadcaster.send(target, &Event::ForceDisconnect);
        }
        self.lobby.clear();
        self.broadcast_lobby();
        Ok(())
    }
}
