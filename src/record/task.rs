//! Task record and state machine.
//!
//! A task is a unit of cooperatively scheduled work owned by a scope.
//! The record tracks the task's position in its lifecycle:
//!
//! ```text
//! Pending → Running ⇄ Suspended
//!              │
//!              ├→ Completed   (work returned a value)
//!              ├→ Failed      (work signalled an error or panicked)
//!              └→ Cancelled   (cancellation observed at a checkpoint)
//! ```
//!
//! Cancellation requests are advisory: they land in `pending_cancel` and
//! take effect only when the task reaches its next checkpoint.

use crate::types::{CancelReason, Outcome, ScopeId, TaskId};
use std::task::Waker;

/// The state of a task in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Spawned but not yet polled.
    Pending,
    /// Currently being driven by a worker.
    Running,
    /// Parked at a suspension point, waiting for a wake.
    Suspended,
    /// Terminal: the work function returned a value.
    Completed,
    /// Terminal: cancellation was observed and the task unwound.
    Cancelled,
    /// Terminal: the work function signalled an error.
    Failed,
}

impl TaskState {
    /// Returns true if the task is in a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Internal record for a task.
#[derive(Debug)]
pub struct TaskRecord {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// The scope that owns this task (non-owning back-reference).
    pub owner: ScopeId,
    /// Current state.
    pub state: TaskState,
    /// Advisory cancellation request, observed at the next checkpoint.
    pub pending_cancel: Option<CancelReason>,
    /// Wakers of tasks (or threads) awaiting this task's completion.
    pub waiters: Vec<Waker>,
    /// Set when a wake arrived while the task's future was checked out by
    /// a worker; the worker re-enqueues the task after its poll returns.
    pub wake_pending: bool,
}

impl TaskRecord {
    /// Creates a new record in the `Pending` state.
    #[must_use]
    pub const fn new(id: TaskId, owner: ScopeId) -> Self {
        Self {
            id,
            owner,
            state: TaskState::Pending,
            pending_cancel: None,
            waiters: Vec::new(),
            wake_pending: false,
        }
    }

    /// Returns true if the task has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Requests advisory cancellation of this task.
    ///
    /// Returns true if the request was new. An existing request is
    /// strengthened, never replaced with a weaker reason. Terminal tasks
    /// ignore requests entirely.
    pub fn request_cancel(&mut self, reason: CancelReason) -> bool {
        if self.is_terminal() {
            return false;
        }
        match &mut self.pending_cancel {
            Some(existing) => {
                existing.strengthen(&reason);
                false
            }
            slot @ None => {
                *slot = Some(reason);
                true
            }
        }
    }

    /// Marks the task as being driven by a worker.
    pub fn start_poll(&mut self) {
        if matches!(self.state, TaskState::Pending | TaskState::Suspended) {
            self.state = TaskState::Running;
        }
    }

    /// Marks the task as parked at a suspension point.
    pub fn suspend(&mut self) {
        if matches!(self.state, TaskState::Running) {
            self.state = TaskState::Suspended;
        }
    }

    /// Transitions to the terminal state matching `outcome` and returns the
    /// wakers to notify. Terminal states are absorbing.
    pub fn finish(&mut self, outcome: &Outcome<()>) -> Vec<Waker> {
        if self.is_terminal() {
            return Vec::new();
        }
        self.state = match outcome {
            Outcome::Completed(()) => TaskState::Completed,
            Outcome::Failed(_) => TaskState::Failed,
            Outcome::Cancelled(_) => TaskState::Cancelled,
        };
        std::mem::take(&mut self.waiters)
    }

    /// Registers a waker to be notified when this task completes.
    pub fn add_waiter(&mut self, waker: Waker) {
        self.waiters.push(waker);
    }
}
