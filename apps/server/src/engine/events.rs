//! Outbound events and the broadcast interface.
//!
//! The engine never talks to sockets; it hands every `Event` to a
//! `Broadcaster`, either for the whole table or for one connection. The
//! transport layer implements the trait; tests record into a buffer.

use serde::Serialize;

use crate::engine::state::Session;
use crate::lobby::{ConnectionId, LobbyPlayer, PlayerId};

/// Adjacently tagged union of everything the core pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// Full-state snapshot; sent after every mutation.
    Snapshot(Box<Session>),
    LobbyUpdate { roster: Vec<LobbyPlayer> },
    JoinAccepted {
        player_id: PlayerId,
        roster: Vec<LobbyPlayer>,
    },
    /// Prompt for the acting bidder only.
    BidPrompt { max_bid: u8 },
    InvalidBid { message: String },
    TrickWon { winner_name: String },
    /// Notice to the seat the host marked away.
    MarkedAfk,
    FinalGameOver {
        snapshot: Box<Session>,
        winners: Vec<FinalStanding>,
    },
    /// One-line notice to a single connection (rejections included).
    Announce { message: String },
    /// The receiving connection has been kicked or reset out.
    ForceDisconnect,
    /// Append-only log line, mirrored in `Session::log_history`.
    GameLog { line: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalStanding {
    pub name: String,
    pub score: i32,
}

/// Push interface the core calls into; consumed, never implemented here
/// (the binary writes JSON lines, tests record).
pub trait Broadcaster {
    fn broadcast(&mut self, event: &Event);
    fn send(&mut self, to: ConnectionId, event: &Event);
}
