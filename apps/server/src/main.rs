//! Transport-less driver for the session engine.
//!
//! Connection handling is someone else's job; this binary speaks the same
//! contract over stdin/stdout as a socket layer would over the wire. Each
//! stdin line is a JSON envelope naming a connection and carrying either a
//! command or a connection-loss notice; every outbound event is printed as
//! a JSON line with its audience.

use std::io::BufRead;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use judgment_server::{
    Broadcaster, Command, ConnectionId, Event, GameConfig, GameEngine, Inbound, TokioScheduler,
};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StdinMsg {
    Command {
        connection: ConnectionId,
        command: Command,
    },
    ConnectionLost {
        connection: ConnectionId,
    },
}

impl From<StdinMsg> for Inbound {
    fn from(msg: StdinMsg) -> Self {
        match msg {
            StdinMsg::Command {
                connection,
                command,
            } => Inbound::Command {
                connection,
                command,
            },
            StdinMsg::ConnectionLost { connection } => Inbound::ConnectionLost(connection),
        }
    }
}

#[derive(Serialize)]
struct OutboundLine<'a> {
    to: Audience,
    event: &'a Event,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Audience {
    All(&'static str),
    One(ConnectionId),
}

/// Writes every event as a JSON line on stdout.
struct StdoutBroadcaster;

impl StdoutBroadcaster {
    fn emit(&self, to: Audience, event: &Event) {
        match serde_json::to_string(&OutboundLine { to, event }) {
            Ok(line) => println!("{line}"),
            Err(err) => warn!(%err, "Failed to serialize outbound event"),
        }
    }
}

impl Broadcaster for StdoutBroadcaster {
    fn broadcast(&mut self, event: &Event) {
        self.emit(Audience::All("all"), event);
    }

    fn send(&mut self, to: ConnectionId, event: &Event) {
        self.emit(Audience::One(to), event);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    judgment_server::telemetry::init_tracing();

    let config = GameConfig::from_env();
    let (tx, mut rx) = mpsc::channel::<Inbound>(64);
    let scheduler = TokioScheduler::new(tx.clone());
    let mut engine = GameEngine::new(config, StdoutBroadcaster, scheduler);

    // Blocking stdin reader feeding the single event queue.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StdinMsg>(&line) {
                Ok(msg) => {
                    if tx.blocking_send(msg.into()).is_err() {
                        break;
                    }
                }
                Err(err) => warn!(%err, "Ignoring malformed input line"),
            }
        }
    });

    info!("✅ Judgment server core is live; reading commands from stdin");

    // The whole engine runs on this one task: commands and fired timers are
    // serialized by arrival order, each handled to completion.
    while let Some(inbound) = rx.recv().await {
        engine.handle(inbound);
    }
}
