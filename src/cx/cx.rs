//! The capability context passed to task bodies.

use crate::error::{Error, Result};
use crate::runtime::Shared;
use crate::time::Sleep;
use crate::types::{CancelReason, ScopeId, TaskId};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// The capability context of a running task.
///
/// Every spawned work function receives a `Cx`. It is the only way a task
/// interacts with the runtime, and its operations double as the
/// checkpoints where cooperative cancellation is observed:
///
/// - [`checkpoint`](Self::checkpoint) observes cancellation without
///   suspending;
/// - [`sleep`](Self::sleep) suspends the task and observes cancellation on
///   every poll;
/// - [`await_task`](Self::await_task) and [`join`](Self::join) suspend on
///   another task or scope and likewise observe cancellation on every
///   poll.
///
/// A task that calls neither runs to completion even if its scope was
/// cancelled; cancellation is never preemptive.
///
/// # Example
///
/// ```ignore
/// scope.spawn(|cx| async move {
///     for chunk in chunks {
///         cx.checkpoint()?; // unwinds here if the scope was cancelled
///         process(chunk);
///     }
///     Ok(())
/// });
/// ```
#[derive(Debug, Clone)]
pub struct Cx {
    shared: Weak<Shared>,
    task: TaskId,
    scope: ScopeId,
}

impl Cx {
    pub(crate) const fn new(shared: Weak<Shared>, task: TaskId, scope: ScopeId) -> Self {
        Self {
            shared,
            task,
            scope,
        }
    }

    /// Returns the id of the running task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task
    }

    /// Returns the id of the owning scope.
    #[must_use]
    pub const fn scope_id(&self) -> ScopeId {
        self.scope
    }

    /// Returns a handle to the owning scope, e.g. for nested spawns.
    #[must_use]
    pub fn scope(&self) -> super::Scope {
        super::Scope::new(self.scope, self.shared.clone())
    }

    /// A checkpoint: observes cancellation without suspending.
    ///
    /// Returns `Err(Cancelled)` if the owning scope requested
    /// cancellation; propagating it with `?` unwinds the task so `Drop`
    /// releases any scoped resources, and the task ends `Cancelled`.
    pub fn checkpoint(&self) -> Result<()> {
        let Some(shared) = self.shared.upgrade() else {
            return Err(Error::cancelled(CancelReason::shutdown()));
        };
        let pending = shared.state.lock().pending_cancel(self.task);
        match pending {
            Some(reason) => {
                tracing::trace!(task = %self.task, %reason, "cancellation observed at checkpoint");
                Err(Error::cancelled(reason))
            }
            None => Ok(()),
        }
    }

    /// Suspends the task for `duration`.
    ///
    /// The canonical suspension checkpoint: the worker is released
    /// immediately and the task is re-enqueued once the duration has
    /// elapsed on the runtime's clock (wall or virtual). Cancellation is
    /// observed on every poll of the returned future.
    #[must_use]
    pub fn sleep(&self, duration: Duration) -> Sleep {
        Sleep::new(self.clone(), duration)
    }

    /// Awaits another task's outcome; a suspension checkpoint.
    ///
    /// Suspends this task until the target is terminal, then yields its
    /// [`Outcome`](crate::Outcome). Cancellation of this task's own scope
    /// is observed on every poll, so a cancelled waiter unwinds with
    /// `Err(Cancelled)` instead of riding out the target. The target task
    /// is unaffected.
    #[must_use]
    pub fn await_task<T>(&self, handle: super::TaskHandle<T>) -> super::AwaitTask<T> {
        super::AwaitTask::new(self.clone(), handle)
    }

    /// Waits for a scope's subtree to drain; a suspension checkpoint.
    ///
    /// Like [`Scope::join`](super::Scope::join), but cancellation of this
    /// task's own scope is observed on every poll.
    #[must_use]
    pub fn join(&self, scope: &super::Scope) -> super::Join {
        super::Join::new(self.clone(), scope.join())
    }

    pub(crate) fn shared(&self) -> Option<Arc<Shared>> {
        self.shared.upgrade()
    }

    pub(crate) fn task(&self) -> TaskId {
        self.task
    }
}
