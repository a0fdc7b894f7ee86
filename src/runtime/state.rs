//! Global runtime state.
//!
//! All bookkeeping lives here: the task and scope arenas, stored futures,
//! the run queue, and the timer heap. Per the concurrency model there is a
//! single mutual-exclusion section: the whole state sits behind one mutex,
//! and membership changes and cancellation-flag accesses all go through it.
//! Futures are checked out of the state before being polled, so user code
//! never runs under the lock.

use super::queue::RunQueue;
use super::stored::StoredTask;
use super::timer::TimerHeap;
use crate::error::{Error, Result};
use crate::record::{ScopeRecord, TaskRecord};
use crate::types::{CancelReason, Outcome, ScopeId, TaskId, Time};
use crate::util::{Arena, ArenaIndex};
use std::collections::HashMap;
use std::task::Waker;

/// The shared bookkeeping of a runtime.
#[derive(Debug, Default)]
pub(crate) struct RuntimeState {
    /// All task records, live and terminal.
    pub(crate) tasks: Arena<TaskRecord>,
    /// All scope records.
    pub(crate) scopes: Arena<ScopeRecord>,
    /// Stored futures of non-terminal tasks, keyed by id. A future is
    /// absent while checked out by a worker or after the task finished.
    futures: HashMap<TaskId, StoredTask>,
    /// Runnable tasks.
    pub(crate) queue: RunQueue,
    /// Armed sleep deadlines.
    pub(crate) timers: TimerHeap,
}

impl RuntimeState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Creates a new scope, registering it with its parent.
    pub(crate) fn create_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let index = self.scopes.insert(ScopeRecord::new(
            ScopeId::from_arena(ArenaIndex::new(0, 0)),
            parent,
        ));
        let id = ScopeId::from_arena(index);
        if let Some(record) = self.scopes.get_mut(index) {
            record.id = id;
        }
        if let Some(parent) = parent {
            if let Some(record) = self.scopes.get_mut(parent.arena_index()) {
                record.add_child(id);
            }
        }
        id
    }

    /// Registers a new task in `scope`.
    ///
    /// Fails with `ScopeClosed` if the scope was already cancelled; no
    /// task record is created in that case.
    pub(crate) fn register_task(&mut self, scope: ScopeId) -> Result<TaskId> {
        let Some(record) = self.scopes.get(scope.arena_index()) else {
            return Err(Error::scope_closed());
        };
        if !record.can_spawn() {
            return Err(Error::scope_closed());
        }
        let index = self.tasks.insert(TaskRecord::new(
            TaskId::from_arena(ArenaIndex::new(0, 0)),
            scope,
        ));
        let id = TaskId::from_arena(index);
        if let Some(record) = self.tasks.get_mut(index) {
            record.id = id;
        }
        if let Some(record) = self.scopes.get_mut(scope.arena_index()) {
            record.add_task(id);
        }
        Ok(id)
    }

    /// Stores a task's future and makes the task runnable.
    pub(crate) fn attach_future(&mut self, task: TaskId, stored: StoredTask) {
        self.futures.insert(task, stored);
        self.enqueue(task);
    }

    /// Checks a future out for polling and marks the task `Running`.
    pub(crate) fn checkout_future(&mut self, task: TaskId) -> Option<StoredTask> {
        let stored = self.futures.remove(&task)?;
        if let Some(record) = self.tasks.get_mut(task.arena_index()) {
            record.start_poll();
        }
        Some(stored)
    }

    /// Puts a future back after it returned `Pending` and marks the task
    /// `Suspended`. If a wake arrived while the future was checked out,
    /// the task is re-enqueued immediately.
    pub(crate) fn park_task(&mut self, task: TaskId, stored: StoredTask) {
        self.futures.insert(task, stored);
        let requeue = self.tasks.get_mut(task.arena_index()).is_some_and(|record| {
            record.suspend();
            std::mem::take(&mut record.wake_pending)
        });
        if requeue {
            self.enqueue(task);
        }
    }

    /// Enqueues a task in the lane matching its cancellation status.
    pub(crate) fn enqueue(&mut self, task: TaskId) {
        let cancelling = self
            .tasks
            .get(task.arena_index())
            .is_some_and(|record| record.pending_cancel.is_some());
        if cancelling {
            self.queue.push_cancel(task);
        } else {
            self.queue.push_ready(task);
        }
    }

    /// Handles a wake for `task`.
    ///
    /// Terminal tasks are ignored (stale timer or handle wake). If the
    /// future is checked out by a worker, the wake is recorded so the
    /// worker re-enqueues the task after its poll.
    pub(crate) fn schedule_woken(&mut self, task: TaskId) {
        let Some(record) = self.tasks.get_mut(task.arena_index()) else {
            return;
        };
        if record.is_terminal() {
            return;
        }
        if self.futures.contains_key(&task) {
            self.enqueue(task);
        } else {
            record.wake_pending = true;
        }
    }

    /// Returns the pending cancellation reason for `task`, if any.
    pub(crate) fn pending_cancel(&self, task: TaskId) -> Option<CancelReason> {
        self.tasks
            .get(task.arena_index())
            .and_then(|record| record.pending_cancel.clone())
    }

    /// Cancels a scope: marks it closed to spawns, requests cancellation
    /// of every non-terminal child task, and fans out to child scopes.
    ///
    /// Idempotent; a second call can only strengthen recorded reasons.
    /// The flags are all set before this returns; the children unwind
    /// asynchronously at their next checkpoint.
    pub(crate) fn request_cancel_scope(&mut self, scope: ScopeId, reason: &CancelReason) {
        let Some(record) = self.scopes.get_mut(scope.arena_index()) else {
            return;
        };
        let newly = record.cancel(reason.clone());
        let tasks = record.tasks.clone();
        let children = record.children.clone();
        if newly {
            tracing::debug!(scope = %scope, %reason, "scope cancelled");
        }

        for task in tasks {
            let live = self.tasks.get_mut(task.arena_index()).is_some_and(|record| {
                record.request_cancel(reason.clone());
                !record.is_terminal()
            });
            if live {
                // Schedule it so the cancellation is observed at the next
                // checkpoint even if the task is parked on a timer.
                self.schedule_for_cancel(task);
            }
        }

        let mut child_reason = CancelReason::parent_cancelled();
        child_reason.strengthen(reason);
        for child in children {
            self.request_cancel_scope(child, &child_reason);
        }

        // A cancelled scope that is already drained has nothing left to
        // unwind; reclaim its record now.
        if self.scope_is_drained(scope) {
            self.reclaim_scope(scope);
        }
    }

    fn schedule_for_cancel(&mut self, task: TaskId) {
        if self.futures.contains_key(&task) {
            self.queue.push_cancel(task);
        } else if let Some(record) = self.tasks.get_mut(task.arena_index()) {
            record.wake_pending = true;
        }
    }

    /// Records a task's terminal outcome and reclaims its record.
    ///
    /// The typed result already lives in the handle's slot, so the record
    /// is removed from the arena (the generation counter makes the stale
    /// id miss rather than alias a reused slot). Discards the task from
    /// its scope, and returns the wakers to notify: the task's completion
    /// waiters plus the join waiters of every scope up the tree that
    /// drained as a result.
    pub(crate) fn finish_task(&mut self, task: TaskId, outcome: &Outcome<()>) -> Vec<Waker> {
        self.futures.remove(&task);
        let Some(record) = self.tasks.get_mut(task.arena_index()) else {
            return Vec::new();
        };
        let mut wakers = record.finish(outcome);
        let owner = record.owner;
        tracing::trace!(task = %task, %outcome, "task finished");
        self.tasks.remove(task.arena_index());

        if let Some(scope) = self.scopes.get_mut(owner.arena_index()) {
            scope.remove_task(task);
        }

        // Wake joiners of every ancestor scope that just drained; a
        // drained scope that was cancelled is dead for good (spawns are
        // refused) and its record is reclaimed on the way up.
        let mut current = Some(owner);
        while let Some(scope) = current {
            if !self.scope_is_drained(scope) {
                break;
            }
            let Some(record) = self.scopes.get_mut(scope.arena_index()) else {
                break;
            };
            wakers.extend(record.take_join_wakers());
            let parent = record.parent;
            if record.is_cancelled() {
                self.reclaim_scope(scope);
            }
            current = parent;
        }
        wakers
    }

    /// Removes a drained, cancelled scope record along with its child
    /// scope records (drained and cancelled with it), unlinking it from
    /// its parent.
    ///
    /// Join wakers are not carried out: a drained scope cannot have any,
    /// since a join poll on a drained scope resolves without registering.
    fn reclaim_scope(&mut self, scope: ScopeId) {
        let Some(record) = self.scopes.remove(scope.arena_index()) else {
            return;
        };
        for child in record.children {
            self.reclaim_scope(child);
        }
        if let Some(parent) = record.parent {
            if let Some(parent_record) = self.scopes.get_mut(parent.arena_index()) {
                parent_record.remove_child(scope);
            }
        }
        tracing::trace!(scope = %scope, "scope reclaimed");
    }

    /// Returns true if `scope` has no live tasks and all of its child
    /// scopes are drained.
    pub(crate) fn scope_is_drained(&self, scope: ScopeId) -> bool {
        let Some(record) = self.scopes.get(scope.arena_index()) else {
            return true;
        };
        if record.has_live_tasks() {
            return false;
        }
        record
            .children
            .iter()
            .all(|&child| self.scope_is_drained(child))
    }

    /// Returns true if every spawned task has reached a terminal state.
    pub(crate) fn is_quiescent(&self) -> bool {
        self.futures.is_empty()
    }

    /// Returns the earliest armed timer deadline.
    pub(crate) fn next_deadline(&self) -> Option<Time> {
        self.timers.peek_deadline()
    }

    /// Fires all timers with deadlines at or before `now`, returning the
    /// wakers to invoke.
    pub(crate) fn fire_timers(&mut self, now: Time) -> Vec<Waker> {
        self.timers.pop_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CancelKind;

    fn state_with_scope() -> (RuntimeState, ScopeId) {
        let mut state = RuntimeState::new();
        let scope = state.create_scope(None);
        (state, scope)
    }

    fn dummy_task() -> StoredTask {
        StoredTask::new(async { Outcome::Completed(()) })
    }

    #[test]
    fn spawn_into_cancelled_scope_is_refused() {
        let (mut state, scope) = state_with_scope();
        state.request_cancel_scope(scope, &CancelReason::user("stop"));

        let before = state.tasks.len();
        let err = state.register_task(scope).unwrap_err();
        assert!(err.is_scope_closed());
        // No task record was created.
        assert_eq!(state.tasks.len(), before);
    }

    #[test]
    fn cancel_fans_out_to_tasks_and_child_scopes() {
        let (mut state, scope) = state_with_scope();
        let child_scope = state.create_scope(Some(scope));
        let t1 = state.register_task(scope).unwrap();
        let t2 = state.register_task(child_scope).unwrap();
        state.attach_future(t1, dummy_task());
        state.attach_future(t2, dummy_task());

        state.request_cancel_scope(scope, &CancelReason::user("stop"));

        assert_eq!(
            state.pending_cancel(t1).map(|r| r.kind()),
            Some(CancelKind::User)
        );
        // The child scope's task sees the cascaded reason.
        assert_eq!(
            state.pending_cancel(t2).map(|r| r.kind()),
            Some(CancelKind::ParentCancelled)
        );
        assert!(!state
            .scopes
            .get(child_scope.arena_index())
            .unwrap()
            .can_spawn());
    }

    #[test]
    fn cancel_twice_is_idempotent() {
        let (mut state, scope) = state_with_scope();
        let task = state.register_task(scope).unwrap();
        state.attach_future(task, dummy_task());

        state.request_cancel_scope(scope, &CancelReason::user("stop"));
        let reason_once = state.pending_cancel(task);
        state.request_cancel_scope(scope, &CancelReason::user("stop"));
        assert_eq!(state.pending_cancel(task), reason_once);
        assert_eq!(state.queue.len(), 1);
    }

    #[test]
    fn finish_discards_task_from_scope() {
        let (mut state, scope) = state_with_scope();
        let task = state.register_task(scope).unwrap();
        state.attach_future(task, dummy_task());
        assert!(!state.scope_is_drained(scope));

        let _ = state.finish_task(task, &Outcome::Completed(()));
        assert!(state.scope_is_drained(scope));
        assert!(state.is_quiescent());
    }

    #[test]
    fn drained_predicate_is_recursive() {
        let (mut state, scope) = state_with_scope();
        let child_scope = state.create_scope(Some(scope));
        let task = state.register_task(child_scope).unwrap();
        state.attach_future(task, dummy_task());

        assert!(!state.scope_is_drained(scope));
        let _ = state.finish_task(task, &Outcome::Completed(()));
        assert!(state.scope_is_drained(scope));
    }

    #[test]
    fn finish_reclaims_the_task_record() {
        let (mut state, scope) = state_with_scope();
        let task = state.register_task(scope).unwrap();
        state.attach_future(task, dummy_task());
        assert_eq!(state.tasks.len(), 1);

        let _ = state.finish_task(task, &Outcome::Completed(()));
        assert_eq!(state.tasks.len(), 0);
        // The stale id misses; a later wake or cancel is a no-op.
        assert!(state.pending_cancel(task).is_none());
        state.schedule_woken(task);
        assert!(state.queue.is_empty());
    }

    #[test]
    fn cancelled_scope_is_reclaimed_once_drained() {
        let (mut state, scope) = state_with_scope();
        let child = state.create_scope(Some(scope));
        let task = state.register_task(child).unwrap();
        state.attach_future(task, dummy_task());

        state.request_cancel_scope(child, &CancelReason::user("stop"));
        // Still live: the record stays until the task unwinds.
        assert!(state.scopes.get(child.arena_index()).is_some());

        let _ = state.finish_task(task, &Outcome::Cancelled(CancelReason::user("stop")));
        assert!(state.scopes.get(child.arena_index()).is_none());
        // The uncancelled parent stays, with the child unlinked.
        let parent = state.scopes.get(scope.arena_index()).unwrap();
        assert!(parent.children.is_empty());
    }

    #[test]
    fn cancelling_an_empty_scope_reclaims_it_immediately() {
        let (mut state, scope) = state_with_scope();
        let child = state.create_scope(Some(scope));

        state.request_cancel_scope(child, &CancelReason::user("stop"));

        assert!(state.scopes.get(child.arena_index()).is_none());
        assert!(state
            .scopes
            .get(scope.arena_index())
            .unwrap()
            .children
            .is_empty());
        // Spawning into the reclaimed scope is still refused.
        assert!(state.register_task(child).unwrap_err().is_scope_closed());
    }

    #[test]
    fn wake_while_checked_out_is_not_lost() {
        let (mut state, scope) = state_with_scope();
        let task = state.register_task(scope).unwrap();
        state.attach_future(task, dummy_task());

        assert_eq!(state.queue.pop(), Some(task));
        let stored = state.checkout_future(task).unwrap();

        // Wake arrives while the worker is polling.
        state.schedule_woken(task);
        assert!(state.queue.is_empty());

        state.park_task(task, stored);
        assert_eq!(state.queue.pop(), Some(task));
    }
}
