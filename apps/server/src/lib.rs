#![deny(clippy::wildcard_imports)]
#![cfg_attr(test, allow(clippy::wildcard_imports))]

pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod lobby;
pub mod telemetry;

// Re-exports for public API
pub use config::GameConfig;
pub use engine::commands::Command;
pub use engine::events::{Broadcaster, Event, FinalStanding};
pub use engine::state::{Phase, PlayerStatus, Session};
pub use engine::timers::{Scheduler, TokioScheduler};
pub use engine::{GameEngine, Inbound};
pub use errors::DomainError;
pub use lobby::{ConnectionId, Lobby, LobbyPlayer, PlayerId};

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    judgment_test_support::test_logging::init();
}
