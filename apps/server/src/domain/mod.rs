//! Domain layer: pure card and rules logic, free of session state.

pub mod cards_logic;
pub mod cards_parsing;
pub mod cards_serde;
pub mod cards_types;
pub mod dealing;
pub mod rules;

// Re-exports for ergonomics
pub use cards_logic::{hand_has_suit, play_beats, winning_play};
pub use cards_parsing::try_parse_cards;
pub use cards_types::{Card, Rank, Suit, Trump};
pub use dealing::{shuffled_deck, standard_deck};
