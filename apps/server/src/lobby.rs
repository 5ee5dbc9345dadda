//! Pre-game lobby roster.
//!
//! The lobby is a collaborator of the session engine, not part of it: the
//! engine consumes a ready roster on game start and hands a roster back on
//! teardown. The bookkeeping here is the minimum needed for that contract
//! (join/ready/kick plus connection liveness).

use serde::Serialize;
use uuid::Uuid;

/// Stable player identity; survives reconnects.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Transient connection handle; replaced on every reconnect.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

#[derive(Debug, Clone, Serialize)]
pub struct LobbyPlayer {
    pub player_id: PlayerId,
    #[serde(skip)]
    pub connection: Option<ConnectionId>,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
    /// Lobby-level liveness; a lobby member may close their tab and return.
    pub connected: bool,
}

/// In-memory roster. Host privilege belongs to the first joiner and follows
/// the roster through game teardown.
#[derive(Debug, Default)]
pub struct Lobby {
    players: Vec<LobbyPlayer>,
}

impl Lobby {
    pub fn roster(&self) -> &[LobbyPlayer] {
        &self.players
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players eligible to be seated when the host starts a game.
    pub fn ready_players(&self) -> Vec<&LobbyPlayer> {
        self.players
            .iter()
            .filter(|p| p.is_ready && p.connected)
            .collect()
    }

    pub fn find_by_connection(&self, connection: ConnectionId) -> Option<&LobbyPlayer> {
        self.players
            .iter()
            .find(|p| p.connection == Some(connection))
    }

    pub fn find_by_connection_mut(
        &mut self,
        connection: ConnectionId,
    ) -> Option<&mut LobbyPlayer> {
        self.players
            .iter_mut()
            .find(|p| p.connection == Some(connection))
    }

    /// Join or rejoin the lobby. A known `player_id` reclaims its entry
    /// (fresh connection, possibly a new name); an unknown one is seated as
    /// a new member. The first member becomes host and starts ready.
    pub fn join(
        &mut self,
        connection: ConnectionId,
        name: String,
        player_id: Option<PlayerId>,
    ) -> PlayerId {
        let id = player_id.unwrap_or_else(PlayerId::random);
        if let Some(existing) = self.players.iter_mut().find(|p| p.player_id == id) {
            existing.connection = Some(connection);
            existing.name = name;
            existing.connected = true;
            return id;
        }
        let is_host = self.players.is_empty();
        self.players.push(LobbyPlayer {
            player_id: id,
            connection: Some(connection),
            name,
            is_host,
            is_ready: is_host,
            connected: true,
        });
        id
    }

    pub fn remove(&mut self, player_id: PlayerId) {
        self.players.retain(|p| p.player_id != player_id);
    }

    pub fn mark_disconnected(&mut self, connection: ConnectionId) -> bool {
        match self.find_by_connection_mut(connection) {
            Some(player) => {
                player.connected = false;
                true
            }
            None => false,
        }
    }

    /// Replace the whole roster (session teardown hands players back).
    pub fn replace(&mut self, players: Vec<LobbyPlayer>) {
        self.players = players;
    }

    /// Drop everyone but the given host entry.
    pub fn retain_only(&mut self, player_id: PlayerId) {
        self.players.retain(|p| p.player_id == player_id);
        if let Some(host) = self.players.first_mut() {
            host.is_ready = true;
        }
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }

    pub fn connections(&self) -> Vec<ConnectionId> {
        self.players.iter().filter_map(|p| p.connection).collect()
    }
}
