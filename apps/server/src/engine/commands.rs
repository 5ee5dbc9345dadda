//! Closed set of inbound commands.
//!
//! Everything a client or host can ask of the core is one of these tagged
//! variants; payloads are validated by serde at the boundary, then by the
//! engine against game state. Anything that does not deserialize never
//! reaches the engine.

use serde::{Deserialize, Serialize};

use crate::domain::Card;
use crate::engine::state::Seat;
use crate::lobby::PlayerId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Join the lobby, or reconnect into a running game. `player_id` is the
    /// stable identity from a previous `JoinAccepted`.
    Join {
        name: String,
        #[serde(default)]
        player_id: Option<PlayerId>,
    },
    SetReady,
    /// Host: remove a player from the pre-game roster.
    KickFromLobby { player_id: PlayerId },
    /// Host: seat the ready roster and deal round 1.
    StartGame {
        #[serde(default)]
        password: Option<String>,
    },
    /// Host: advance from the round-over screen.
    StartNextRound,
    /// Host: abandon the game, returning everyone to the lobby.
    EndGame,
    /// Host: clear the lobby down to just the host.
    EndSession,
    /// Host: destroy everything, session and roster alike.
    HardReset,
    /// Host: push a timed-out seat into the disconnect grace path.
    MarkAfk { seat: Seat },
    /// A seat marked away declares itself present again.
    IAmBack,
    /// Bids are strict integers; range and hook rule are checked in-engine.
    SubmitBid { bid: i64 },
    PlayCard { card: Card },
    /// Cosmetic reordering of one's own hand.
    RearrangeHand { hand: Vec<Card> },
}
