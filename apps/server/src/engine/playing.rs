//! Trick-play transitions: card legality, trick resolution, review flow.

use tracing::debug;

use crate::domain::{hand_has_suit, winning_play, Card};
use crate::engine::events::{Broadcaster, Event};
use crate::engine::state::{CompletedTrick, Phase, PlayerStatus, Seat, Session, TrickPlay};
use crate::engine::timers::Scheduler;
use crate::engine::GameEngine;
use crate::errors::domain::{DomainError, ValidationKind};
use crate::lobby::ConnectionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayOutcome {
    pub trick_completed: bool,
    /// Next seat to act when the trick is still open.
    pub next_actor: Option<Seat>,
}

/// Play `card` from `seat` into the current trick, enforcing phase, turn,
/// pause, possession, and suit-following. Validation failures leave the
/// session untouched.
pub fn play_card(session: &mut Session, seat: Seat, card: Card) -> Result<PlayOutcome, DomainError> {
    if session.phase != Phase::Playing {
        return Err(DomainError::validation(
            ValidationKind::PhaseMismatch,
            "It is not time to play a card.",
        ));
    }
    if session.paused {
        return Err(DomainError::validation(
            ValidationKind::GamePaused,
            "The game is paused.",
        ));
    }
    if session.acting_seat != Some(seat) {
        return Err(DomainError::validation(
            ValidationKind::OutOfTurn,
            "It is not your turn.",
        ));
    }
    let hand = &session.players[seat].hand;
    let Some(pos) = hand.iter().position(|&c| c == card) else {
        return Err(DomainError::validation(
            ValidationKind::CardNotInHand,
            "You do not hold that card.",
        ));
    };
    if let Some(lead) = session.lead_suit {
        if card.suit != lead && hand_has_suit(hand, lead) {
            return Err(DomainError::validation(
                ValidationKind::MustFollowSuit,
                format!("You must play a {lead} card."),
            ));
        }
    }

    if session.lead_suit.is_none() {
        session.lead_suit = Some(card.suit);
    }
    let removed = session.players[seat].hand.remove(pos);
    session.players[seat].inactive = false;
    session.current_trick.push(TrickPlay {
        seat,
        card: removed,
    });

    // Re-evaluate the running winner after every contribution.
    let cards: Vec<Card> = session.current_trick.iter().map(|p| p.card).collect();
    session.current_winning_seat =
        winning_play(session.trump, &cards).map(|i| session.current_trick[i].seat);

    if session.trick_complete() {
        Ok(PlayOutcome {
            trick_completed: true,
            next_actor: None,
        })
    } else {
        let next_actor = session.next_active_seat(seat);
        session.acting_seat = next_actor;
        Ok(PlayOutcome {
            trick_completed: false,
            next_actor,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrickResolution {
    pub winner_seat: Seat,
    pub winner_name: String,
    /// All Active hands are empty: the round is done once the display delay
    /// elapses.
    pub round_finished: bool,
}

/// Close the completed trick on the table: credit the winner, snapshot the
/// plays, and either enter review or leave the session awaiting round end.
pub fn resolve_trick(session: &mut Session) -> Result<TrickResolution, DomainError> {
    let winner_seat = session.current_winning_seat.ok_or_else(|| {
        DomainError::validation_other("Invariant violated: completed trick has no winner")
    })?;

    session.last_completed_trick = Some(CompletedTrick {
        plays: session.current_trick.clone(),
        winner_seat,
    });
    session.players[winner_seat].tricks_won += 1;
    session.acting_seat = None;

    let round_finished = session.all_active_hands_empty();
    if !round_finished {
        session.phase = Phase::TrickReview;
    }
    Ok(TrickResolution {
        winner_seat,
        winner_name: session.players[winner_seat].name.clone(),
        round_finished,
    })
}

impl<B: Broadcaster, S: Scheduler> GameEngine<B, S> {
    pub(crate) fn play_card(
        &mut self,
        connection: ConnectionId,
        card: Card,
    ) -> Result<(), DomainError> {
        let seat = self.seat_of(connection)?;
        let (outcome, name) = {
            let session = self.require_session_mut()?;
            let outcome = play_card(session, seat, card)?;
            (outcome, session.players[seat].name.clone())
        };

        self.disarm_turn_timer();
        self.log(format!("› {name} played the {card}."));

        if outcome.trick_completed {
            self.finish_trick()?;
        } else {
            self.arm_turn_timer();
            self.broadcast_snapshot();
        }
        Ok(())
    }

    /// Resolve the trick on the table and schedule whatever comes next:
    /// review before another trick, or the round-end delay.
    pub(crate) fn finish_trick(&mut self) -> Result<(), DomainError> {
        self.disarm_turn_timer();
        let resolution = {
            let session = self.require_session_mut()?;
            resolve_trick(session)?
        };
        debug!(
            winner_seat = resolution.winner_seat,
            round_finished = resolution.round_finished,
            "Trick resolved"
        );
        self.broadcaster.broadcast(&Event::TrickWon {
            winner_name: resolution.winner_name,
        });

        if resolution.round_finished {
            self.arm_round_end_timer();
        } else {
            self.arm_review_timer();
        }
        self.broadcast_snapshot();
        Ok(())
    }

    /// Review window elapsed: clear the table and hand the lead to the trick
    /// winner (or the next Active seat if the winner has left).
    pub(crate) fn trick_advance_fired(&mut self) {
        let leader = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            if session.phase != Phase::TrickReview || session.paused {
                debug!("Trick advance fired outside review; dropping");
                return;
            }
            let winner_seat = session
                .last_completed_trick
                .as_ref()
                .map(|t| t.winner_seat)
                .unwrap_or(0);
            let leader = if session.players[winner_seat].status == PlayerStatus::Active {
                Some(winner_seat)
            } else {
                session.active_seat_from(winner_seat)
            };
            session.phase = Phase::Playing;
            session.current_trick.clear();
            session.lead_suit = None;
            session.current_winning_seat = None;
            session.review_deadline = None;
            session.acting_seat = leader;
            leader
        };
        self.timers.trick_advance = None;
        debug!(?leader, "Next trick starts");
        self.arm_turn_timer();
        self.broadcast_snapshot();
    }

    /// Reorder one's own hand. Cosmetic: accepted only if the proposed hand
    /// is a permutation of the current one.
    pub(crate) fn rearrange_hand(
        &mut self,
        connection: ConnectionId,
        hand: Vec<Card>,
    ) -> Result<(), DomainError> {
        let seat = self.seat_of(connection)?;
        {
            let session = self.require_session_mut()?;
            let current = &session.players[seat].hand;
            let mut proposed_sorted = hand.clone();
            let mut current_sorted = current.clone();
            proposed_sorted.sort();
            current_sorted.sort();
            if proposed_sorted != current_sorted {
                return Err(DomainError::validation(
                    ValidationKind::HandMismatch,
                    "That is not your hand.",
                ));
            }
            session.players[seat].hand = hand;
        }
        self.broadcast_snapshot();
        Ok(())
    }
}
