//! Domain-level error type used across the engine.
//!
//! This error type is transport-agnostic. The command dispatcher converts a
//! `DomainError` into a one-line rejection event for the offending sender;
//! it never reaches other clients and never mutates session state.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Validation failure kinds (extend as needed)
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationKind {
    /// Command arrived from a connection that is not the acting seat.
    OutOfTurn,
    /// Command is not legal in the current phase.
    PhaseMismatch,
    /// Player actions are rejected while the session is paused.
    GamePaused,
    /// Sender lacks host privilege for a host-only command.
    NotHost,
    /// Host password did not match.
    BadPassword,
    /// Fewer ready players than the game minimum.
    NotEnoughPlayers,
    CardNotInHand,
    MustFollowSuit,
    /// Malformed, out-of-range, or hook-rule-violating bid.
    InvalidBid,
    /// AFK marking requires the seat to have been flagged inactive first.
    SeatNotInactive,
    /// Proposed hand is not a permutation of the current hand.
    HandMismatch,
    InvalidTrumpConversion,
    ParseCard,
    Other(String),
}

/// Domain-level not found entities (minimal set; extend as needed)
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NotFoundKind {
    Player,
    Seat,
    Session,
    Other(String),
}

/// Central domain error type
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Input/user validation or business rule violation
    Validation(ValidationKind, String),
    /// Missing resource in domain terms
    NotFound(NotFoundKind, String),
}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DomainError::Validation(_, d) => write!(f, "{d}"),
            DomainError::NotFound(_, d) => write!(f, "{d}"),
        }
    }
}

impl Error for DomainError {}

impl DomainError {
    pub fn validation(kind: ValidationKind, detail: impl Into<String>) -> Self {
        Self::Validation(kind, detail.into())
    }
    pub fn validation_other(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::Validation(ValidationKind::Other(detail.clone()), detail)
    }
    pub fn not_found(kind: NotFoundKind, detail: impl Into<String>) -> Self {
        Self::NotFound(kind, detail.into())
    }

    pub fn validation_kind(&self) -> Option<&ValidationKind> {
        match self {
            DomainError::Validation(kind, _) => Some(kind),
            _ => None,
        }
    }
}
