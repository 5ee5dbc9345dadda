//! Bidding phase transitions.

use tracing::debug;

use crate::domain::rules::valid_bid_range;
use crate::engine::events::{Broadcaster, Event};
use crate::engine::state::{Phase, Seat, Session};
use crate::engine::timers::Scheduler;
use crate::engine::GameEngine;
use crate::errors::domain::{DomainError, ValidationKind};
use crate::lobby::ConnectionId;

/// What a recorded bid did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidOutcome {
    pub bid: u8,
    /// `Some` while the wrap continues.
    pub next_bidder: Option<Seat>,
    /// `Some` once the wrap completes: the seat leading the first trick.
    pub first_actor: Option<Seat>,
}

/// Record a bid for `seat`, enforcing phase, turn, pause, range, and the
/// hook rule. Validation failures leave the session untouched.
pub fn place_bid(session: &mut Session, seat: Seat, bid: i64) -> Result<BidOutcome, DomainError> {
    if session.phase != Phase::Bidding {
        return Err(DomainError::validation(
            ValidationKind::PhaseMismatch,
            "Bidding is not open.",
        ));
    }
    if session.paused {
        return Err(DomainError::validation(
            ValidationKind::GamePaused,
            "The game is paused.",
        ));
    }
    if session.bidding_seat != Some(seat) {
        return Err(DomainError::validation(
            ValidationKind::OutOfTurn,
            "It is not your turn to bid.",
        ));
    }
    if !valid_bid_range(session.cards_to_deal).contains(&bid) {
        return Err(DomainError::validation(
            ValidationKind::InvalidBid,
            format!(
                "Bid must be a whole number between 0 and {}.",
                session.cards_to_deal
            ),
        ));
    }
    let is_last = session.is_last_bidder(seat);
    if is_last && session.bids_sum() + bid == i64::from(session.cards_to_deal) {
        return Err(DomainError::validation(
            ValidationKind::InvalidBid,
            format!(
                "Total bid cannot be {}. Please bid again.",
                session.cards_to_deal
            ),
        ));
    }

    let bid = bid as u8;
    session.players[seat].bid = Some(bid);
    session.players[seat].inactive = false;

    if is_last {
        let first_actor = session.first_bidder_seat();
        session.phase = Phase::Playing;
        session.bidding_seat = None;
        session.acting_seat = first_actor;
        Ok(BidOutcome {
            bid,
            next_bidder: None,
            first_actor,
        })
    } else {
        let next_bidder = session.next_active_seat(seat);
        session.bidding_seat = next_bidder;
        Ok(BidOutcome {
            bid,
            next_bidder,
            first_actor: None,
        })
    }
}

impl<B: Broadcaster, S: Scheduler> GameEngine<B, S> {
    pub(crate) fn submit_bid(
        &mut self,
        connection: ConnectionId,
        bid: i64,
    ) -> Result<(), DomainError> {
        let seat = self.seat_of(connection)?;
        let (outcome, name, max_bid) = {
            let session = self.require_session_mut()?;
            let outcome = place_bid(session, seat, bid)?;
            (
                outcome,
                session.players[seat].name.clone(),
                session.cards_to_deal,
            )
        };
        debug!(seat, bid = outcome.bid, "Bid accepted");

        self.disarm_turn_timer();
        self.log(format!("📣 {name} bids {}.", outcome.bid));

        if let Some(first_actor) = outcome.first_actor {
            let starter = self.require_session()?.players[first_actor].name.clone();
            self.log(format!("Bidding complete. {starter} starts."));
        } else if let Some(next_bidder) = outcome.next_bidder {
            self.send_to_seat(next_bidder, &Event::BidPrompt { max_bid });
        }
        self.arm_turn_timer();
        self.broadcast_snapshot();
        Ok(())
    }
}
