//! Canonical in-game state: the `Session` and its players.
//!
//! A `Session` exists only between game start and teardown, is owned
//! exclusively by the engine, and is mutated only by engine transitions.
//! Every mutation is followed by a full-state snapshot broadcast, so the
//! whole struct serializes as the wire snapshot.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::rules;
use crate::domain::{Card, Suit, Trump};
use crate::lobby::{ConnectionId, LobbyPlayer, PlayerId};

/// Seat index into `Session::players`. Assigned once at game start and never
/// reassigned; turn advancement skips non-Active seats but keeps numbering.
pub type Seat = usize;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    Active,
    Disconnected,
    Removed,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Players declare bids in seat order.
    Bidding,
    /// Tricks are being played. Also covers the short window after the final
    /// trick of a round, before scoring fires.
    Playing,
    /// A completed trick stays on display before the next one starts.
    TrickReview,
    /// Scores tallied; the host decides when the next round begins.
    RoundOver,
    GameOver,
}

#[derive(Debug, Clone, Serialize)]
pub struct Player {
    pub player_id: PlayerId,
    #[serde(skip)]
    pub connection: Option<ConnectionId>,
    pub name: String,
    pub is_host: bool,
    pub score: i32,
    pub hand: Vec<Card>,
    pub bid: Option<u8>,
    pub tricks_won: u8,
    /// One entry per closed round; `None` for rounds sat out.
    pub score_history: Vec<Option<i32>>,
    pub status: PlayerStatus,
    pub seat: Seat,
    /// Set by turn-timer expiry; authorizes host removal. Cleared by any
    /// qualifying action from the seat.
    pub inactive: bool,
}

/// One card contributed to the trick on the table.
#[derive(Debug, Clone, Serialize)]
pub struct TrickPlay {
    pub seat: Seat,
    pub card: Card,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedTrick {
    pub plays: Vec<TrickPlay>,
    pub winner_seat: Seat,
}

/// Preview shown on the round-over screen.
#[derive(Debug, Clone, Serialize)]
pub struct NextRoundInfo {
    pub next_cards: Option<u8>,
    pub next_trump: Option<Trump>,
    pub next_dealer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub players: Vec<Player>,
    pub phase: Phase,
    /// 1-based; 0 only before the first round begins.
    pub round_no: u32,
    pub max_rounds: u32,
    pub cards_to_deal: u8,
    pub dealer_seat: Seat,
    pub trump: Trump,
    pub lead_suit: Option<Suit>,
    pub current_trick: Vec<TrickPlay>,
    pub current_winning_seat: Option<Seat>,
    pub last_completed_trick: Option<CompletedTrick>,
    pub bidding_seat: Option<Seat>,
    pub acting_seat: Option<Seat>,
    pub paused: bool,
    /// Names of the seats the pause is waiting on.
    pub paused_for: Vec<String>,
    #[serde(with = "serde_millis")]
    pub pause_deadline: Option<OffsetDateTime>,
    #[serde(with = "serde_millis")]
    pub turn_deadline: Option<OffsetDateTime>,
    #[serde(with = "serde_millis")]
    pub review_deadline: Option<OffsetDateTime>,
    pub next_round_info: Option<NextRoundInfo>,
    /// Append-only; each line is also emitted as a log event.
    pub log_history: Vec<String>,
    /// Scheduler generation tag. A timer armed for one session epoch is a
    /// no-op against any other.
    #[serde(skip)]
    pub epoch: u64,
}

impl Session {
    /// Seat a ready roster. Seats follow roster order and are final.
    pub fn from_roster(roster: &[LobbyPlayer], epoch: u64) -> Self {
        let players = roster
            .iter()
            .enumerate()
            .map(|(seat, p)| Player {
                player_id: p.player_id,
                connection: p.connection,
                name: p.name.clone(),
                is_host: p.is_host,
                score: 0,
                hand: Vec::new(),
                bid: None,
                tricks_won: 0,
                score_history: Vec::new(),
                status: PlayerStatus::Active,
                seat,
                inactive: false,
            })
            .collect::<Vec<_>>();
        let max_rounds = rules::max_rounds(players.len());
        Self {
            players,
            phase: Phase::Bidding,
            round_no: 0,
            max_rounds,
            cards_to_deal: 0,
            dealer_seat: 0,
            trump: Trump::Spades,
            lead_suit: None,
            current_trick: Vec::new(),
            current_winning_seat: None,
            last_completed_trick: None,
            bidding_seat: None,
            acting_seat: None,
            paused: false,
            paused_for: Vec::new(),
            pause_deadline: None,
            turn_deadline: None,
            review_deadline: None,
            next_round_info: None,
            log_history: Vec::new(),
            epoch,
        }
    }

    pub fn player(&self, seat: Seat) -> &Player {
        &self.players[seat]
    }

    pub fn active_count(&self) -> usize {
        self.players
            .iter()
            .filter(|p| p.status == PlayerStatus::Active)
            .count()
    }

    pub fn has_disconnected(&self) -> bool {
        self.players
            .iter()
            .any(|p| p.status == PlayerStatus::Disconnected)
    }

    pub fn disconnected_names(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| p.status == PlayerStatus::Disconnected)
            .map(|p| p.name.clone())
            .collect()
    }

    /// First Active seat strictly after `from`, wrapping around the table.
    pub fn next_active_seat(&self, from: Seat) -> Option<Seat> {
        let n = self.players.len();
        (1..=n)
            .map(|step| (from + step) % n)
            .find(|&seat| self.players[seat].status == PlayerStatus::Active)
    }

    /// First Active seat at or after `from`, wrapping around the table.
    pub fn active_seat_from(&self, from: Seat) -> Option<Seat> {
        let n = self.players.len();
        (0..n)
            .map(|step| (from + step) % n)
            .find(|&seat| self.players[seat].status == PlayerStatus::Active)
    }

    pub fn first_active_seat(&self) -> Option<Seat> {
        self.active_seat_from(0)
    }

    pub fn seat_of_connection(&self, connection: ConnectionId) -> Option<Seat> {
        self.players
            .iter()
            .position(|p| p.connection == Some(connection))
    }

    pub fn seat_of_player(&self, player_id: PlayerId) -> Option<Seat> {
        self.players.iter().position(|p| p.player_id == player_id)
    }

    /// The seat that opens bidding (and leads the first trick): left of the
    /// dealer, skipping non-Active seats.
    pub fn first_bidder_seat(&self) -> Option<Seat> {
        self.next_active_seat(self.dealer_seat)
    }

    /// Whether `seat` closes the bidding wrap, which subjects it to the hook
    /// rule.
    pub fn is_last_bidder(&self, seat: Seat) -> bool {
        self.next_active_seat(seat) == self.first_bidder_seat()
    }

    pub fn bids_sum(&self) -> i64 {
        self.players
            .iter()
            .filter_map(|p| p.bid)
            .map(i64::from)
            .sum()
    }

    pub fn all_active_hands_empty(&self) -> bool {
        self.players
            .iter()
            .filter(|p| p.status == PlayerStatus::Active)
            .all(|p| p.hand.is_empty())
    }

    /// A trick resolves exactly when every Active seat has contributed.
    pub fn trick_complete(&self) -> bool {
        !self.current_trick.is_empty() && self.current_trick.len() >= self.active_count()
    }

    /// True between the final trick of a round and the scheduled scoring.
    pub fn round_end_pending(&self) -> bool {
        self.phase == Phase::Playing && self.trick_complete() && self.all_active_hands_empty()
    }

    pub fn push_log(&mut self, line: String) {
        self.log_history.push(line);
    }
}

/// Client-facing deadlines travel as epoch milliseconds.
pub(crate) mod serde_millis {
    use serde::Serializer;
    use time::OffsetDateTime;

    pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(t) => {
                let millis = (t.unix_timestamp_nanos() / 1_000_000) as i64;
                serializer.serialize_some(&millis)
            }
            None => serializer.serialize_none(),
        }
    }
}
