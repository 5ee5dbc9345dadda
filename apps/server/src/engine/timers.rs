//! Deferred-task scheduling.
//!
//! All asynchrony in the core is a scheduled future callback. Tasks are
//! plain data tagged with the session epoch they were armed for, so a task
//! that outlives its session (reset, teardown, superseding game) detects it
//! on delivery and becomes a no-op. Arming any purpose cancels its
//! predecessor; tearing down a session cancels everything outstanding.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::engine::state::Seat;
use crate::engine::Inbound;
use crate::lobby::PlayerId;

/// Handle for cancelling a scheduled task.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TaskId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerTask {
    /// Session generation this task was armed against.
    pub epoch: u64,
    pub kind: TaskKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// The acting seat ran out of time; flags it inactive.
    TurnDeadline { seat: Seat },
    /// Trick-review display window elapsed; the next trick may start.
    TrickAdvance,
    /// Post-final-trick delay elapsed; score the round.
    RoundEnd,
    /// Grace period for a disconnected seat elapsed; remove it.
    GraceExpiry { player_id: PlayerId },
    /// Game-over screen lingered long enough; reset the table to lobby.
    GameOverCleanup,
}

/// Arms and cancels deferred tasks. The engine is generic over this so tests
/// can fire tasks deterministically.
pub trait Scheduler {
    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TaskId;
    fn cancel(&mut self, id: TaskId);
}

/// Outstanding task handles for the live session, one slot per purpose.
#[derive(Debug, Default)]
pub struct SessionTimers {
    pub turn: Option<TaskId>,
    pub trick_advance: Option<TaskId>,
    pub round_end: Option<TaskId>,
    pub cleanup: Option<TaskId>,
    pub grace: HashMap<PlayerId, TaskId>,
}

impl SessionTimers {
    pub fn cancel_all<S: Scheduler>(&mut self, scheduler: &mut S) {
        for id in [
            self.turn.take(),
            self.trick_advance.take(),
            self.round_end.take(),
            self.cleanup.take(),
        ]
        .into_iter()
        .flatten()
        {
            scheduler.cancel(id);
        }
        for (_, id) in self.grace.drain() {
            scheduler.cancel(id);
        }
    }
}

/// Production scheduler: each task is a spawned sleep that feeds the fired
/// task back into the engine's single inbound queue, preserving the
/// one-event-at-a-time model. Must be used inside a tokio runtime.
pub struct TokioScheduler {
    tx: mpsc::Sender<Inbound>,
    next_id: u64,
    inflight: HashMap<TaskId, AbortHandle>,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::Sender<Inbound>) -> Self {
        Self {
            tx,
            next_id: 0,
            inflight: HashMap::new(),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TaskId {
        self.inflight.retain(|_, handle| !handle.is_finished());

        let id = TaskId(self.next_id);
        self.next_id += 1;
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the engine loop is shutting down.
            let _ = tx.send(Inbound::Timer(task)).await;
        });
        self.inflight.insert(id, handle.abort_handle());
        id
    }

    fn cancel(&mut self, id: TaskId) {
        if let Some(handle) = self.inflight.remove(&id) {
            handle.abort();
        }
    }
}
