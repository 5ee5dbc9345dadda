//! Test doubles for driving the engine deterministically.
//!
//! `RecordingBroadcaster` buffers every outbound event; `ManualScheduler`
//! records armed tasks instead of sleeping, so tests (unit and integration)
//! decide exactly when and in what order timers fire. Both hand out shared
//! handles, since the engine owns the instances it is given.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

use crate::config::GameConfig;
use crate::engine::commands::Command;
use crate::engine::events::{Broadcaster, Event};
use crate::engine::state::Session;
use crate::engine::timers::{Scheduler, TaskId, TaskKind, TimerTask};
use crate::engine::{GameEngine, Inbound};
use crate::lobby::ConnectionId;

#[derive(Debug, Clone)]
pub enum Outbound {
    Broadcast(Event),
    To(ConnectionId, Event),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingBroadcaster {
    events: Rc<RefCell<Vec<Outbound>>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Outbound> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn broadcasts(&self) -> Vec<Event> {
        self.events
            .borrow()
            .iter()
            .filter_map(|o| match o {
                Outbound::Broadcast(e) => Some(e.clone()),
                Outbound::To(..) => None,
            })
            .collect()
    }

    pub fn sent_to(&self, connection: ConnectionId) -> Vec<Event> {
        self.events
            .borrow()
            .iter()
            .filter_map(|o| match o {
                Outbound::To(c, e) if *c == connection => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.broadcasts()
            .into_iter()
            .filter_map(|e| match e {
                Event::GameLog { line } => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn last_snapshot(&self) -> Option<Session> {
        self.broadcasts()
            .into_iter()
            .rev()
            .find_map(|e| match e {
                Event::Snapshot(s) => Some(*s),
                _ => None,
            })
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&mut self, event: &Event) {
        self.events.borrow_mut().push(Outbound::Broadcast(event.clone()));
    }

    fn send(&mut self, to: ConnectionId, event: &Event) {
        self.events.borrow_mut().push(Outbound::To(to, event.clone()));
    }
}

#[derive(Debug, Clone)]
pub struct ArmedTimer {
    pub id: TaskId,
    pub delay: Duration,
    pub task: TimerTask,
}

#[derive(Debug, Default)]
struct ManualInner {
    next_id: u64,
    armed: Vec<ArmedTimer>,
    /// Cancelled or already fired by the harness.
    spent: HashSet<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    inner: Rc<RefCell<ManualInner>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Armed tasks that are neither cancelled nor fired, oldest first.
    pub fn pending(&self) -> Vec<ArmedTimer> {
        let inner = self.inner.borrow();
        inner
            .armed
            .iter()
            .filter(|t| !inner.spent.contains(&t.id.0))
            .cloned()
            .collect()
    }

    /// Most recently armed pending task matching the predicate, marking it
    /// spent so it cannot fire twice.
    pub fn take_latest<F: Fn(&TaskKind) -> bool>(&self, pred: F) -> Option<TimerTask> {
        let mut inner = self.inner.borrow_mut();
        let found = inner
            .armed
            .iter()
            .rev()
            .find(|t| !inner.spent.contains(&t.id.0) && pred(&t.task.kind))
            .map(|t| (t.id, t.task.clone()));
        let (id, task) = found?;
        inner.spent.insert(id.0);
        Some(task)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        let id = TaskId(inner.next_id);
        inner.next_id += 1;
        inner.armed.push(ArmedTimer { id, delay, task });
        id
    }

    fn cancel(&mut self, id: TaskId) {
        self.inner.borrow_mut().spent.insert(id.0);
    }
}

pub type TestEngine = GameEngine<RecordingBroadcaster, ManualScheduler>;

/// Engine plus handles into its doubles.
pub struct TestHarness {
    pub engine: TestEngine,
    pub events: RecordingBroadcaster,
    pub timers: ManualScheduler,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(GameConfig::default())
    }

    pub fn with_config(config: GameConfig) -> Self {
        let events = RecordingBroadcaster::new();
        let timers = ManualScheduler::new();
        let engine = GameEngine::with_rng(
            config,
            events.clone(),
            timers.clone(),
            ChaCha12Rng::seed_from_u64(42),
        );
        Self {
            engine,
            events,
            timers,
        }
    }

    pub fn command(&mut self, connection: ConnectionId, command: Command) {
        self.engine.handle(Inbound::Command {
            connection,
            command,
        });
    }

    /// Join `n` players named p1..pn; everyone readies up. Returns their
    /// connections in join (and therefore seat) order.
    pub fn join_ready(&mut self, n: usize) -> Vec<ConnectionId> {
        let conns: Vec<ConnectionId> = (0..n)
            .map(|_| ConnectionId(uuid::Uuid::new_v4()))
            .collect();
        for (i, &conn) in conns.iter().enumerate() {
            self.command(
                conn,
                Command::Join {
                    name: format!("p{}", i + 1),
                    player_id: None,
                },
            );
            self.command(conn, Command::SetReady);
        }
        conns
    }

    /// Join, ready, and start a game with `n` players. Connection 0 is the
    /// host.
    pub fn start_game(&mut self, n: usize) -> Vec<ConnectionId> {
        let conns = self.join_ready(n);
        self.command(conns[0], Command::StartGame { password: None });
        conns
    }

    /// Fire the most recently armed pending task of the matching kind
    /// through the engine. Returns false if none was armed.
    pub fn fire<F: Fn(&TaskKind) -> bool>(&mut self, pred: F) -> bool {
        match self.timers.take_latest(pred) {
            Some(task) => {
                self.engine.handle(Inbound::Timer(task));
                true
            }
            None => false,
        }
    }

    pub fn session(&self) -> &Session {
        self.engine.session().expect("live session")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
