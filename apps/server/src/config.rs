//! Runtime configuration.
//!
//! Timing knobs are fixed constants; only the host password comes from the
//! environment. Tests construct a `GameConfig` directly to shrink windows.

use std::env;
use std::time::Duration;

/// How long a disconnected seat may stay away before forced removal.
pub const DISCONNECT_GRACE_PERIOD: Duration = Duration::from_secs(60);
/// How long the acting seat has before being flagged inactive.
pub const TURN_TIMER_DURATION: Duration = Duration::from_secs(90);
/// How long a completed trick stays on display before the next one starts.
pub const TRICK_REVIEW_DURATION: Duration = Duration::from_secs(10);
/// Delay between the final trick of a round and scoring.
pub const ROUND_END_DELAY: Duration = Duration::from_secs(3);
/// How long the game-over screen lingers before the table resets to lobby.
pub const GAME_OVER_CLEANUP_DELAY: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub disconnect_grace: Duration,
    pub turn_timer: Duration,
    pub trick_review: Duration,
    pub round_end_delay: Duration,
    pub game_over_cleanup: Duration,
    /// Required on `start_game` when set. `HOST_PASSWORD` env var.
    pub host_password: Option<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            disconnect_grace: DISCONNECT_GRACE_PERIOD,
            turn_timer: TURN_TIMER_DURATION,
            trick_review: TRICK_REVIEW_DURATION,
            round_end_delay: ROUND_END_DELAY,
            game_over_cleanup: GAME_OVER_CLEANUP_DELAY,
            host_password: None,
        }
    }
}

impl GameConfig {
    /// Default timings plus the host password from the environment.
    ///
    /// An unset or blank `HOST_PASSWORD` disables the password check.
    pub fn from_env() -> Self {
        let host_password = env::var("HOST_PASSWORD")
            .ok()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Self {
            host_password,
            ..Self::default()
        }
    }
}
