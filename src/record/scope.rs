//! Scope record.
//!
//! A scope owns its child tasks and child scopes, forming a tree. The
//! record keeps only the *live* (non-terminal) tasks; a task is discarded
//! from its scope once it reaches a terminal state. A scope is drained when
//! its live set is empty and every child scope is drained; whether the
//! whole subtree is drained is answered by the runtime state, which can see
//! all records.

use crate::types::{CancelReason, ScopeId, TaskId};
use std::task::Waker;

/// Internal record for a scope.
#[derive(Debug)]
pub struct ScopeRecord {
    /// Unique identifier for this scope.
    pub id: ScopeId,
    /// Parent scope (`None` for the root).
    pub parent: Option<ScopeId>,
    /// Child scopes.
    pub children: Vec<ScopeId>,
    /// Live (non-terminal) tasks owned by this scope.
    pub tasks: Vec<TaskId>,
    /// Cancellation flag; `Some` once `cancel_all` has run.
    pub cancelled: Option<CancelReason>,
    /// Wakers registered by `join()` callers.
    pub join_wakers: Vec<Waker>,
}

impl ScopeRecord {
    /// Creates a new open scope record.
    #[must_use]
    pub const fn new(id: ScopeId, parent: Option<ScopeId>) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            tasks: Vec::new(),
            cancelled: None,
            join_wakers: Vec::new(),
        }
    }

    /// Returns true if the scope has been cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled.is_some()
    }

    /// Returns true if new tasks may be spawned into this scope.
    #[must_use]
    pub const fn can_spawn(&self) -> bool {
        !self.is_cancelled()
    }

    /// Marks the scope cancelled.
    ///
    /// Returns true on the first cancellation; later calls only strengthen
    /// the recorded reason (idempotent).
    pub fn cancel(&mut self, reason: CancelReason) -> bool {
        match &mut self.cancelled {
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

    /// Adds a live task to this scope.
    pub fn add_task(&mut self, task: TaskId) {
        if !self.tasks.contains(&task) {
            self.tasks.push(task);
        }
    }

    /// Discards a task that reached a terminal state.
    pub fn remove_task(&mut self, task: TaskId) {
        self.tasks.retain(|&t| t != task);
    }

    /// Adds a child scope.
    pub fn add_child(&mut self, child: ScopeId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    /// Unlinks a reclaimed child scope.
    pub fn remove_child(&mut self, child: ScopeId) {
        self.children.retain(|&c| c != child);
    }

    /// Returns true if this scope has live tasks of its own.
    ///
    /// Does not look at child scopes; see the runtime state for the
    /// recursive drained predicate.
    #[must_use]
    pub fn has_live_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Registers a waker to be notified when the subtree drains.
    pub fn add_join_waker(&mut self, waker: Waker) {
        self.join_wakers.push(waker);
    }

    /// Takes all join wakers for notification.
    pub fn take_join_wakers(&mut self) -> Vec<Waker> {
        std::mem::take(&mut self.join_wakers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CancelKind;

    fn record() -> ScopeRecord {
        ScopeRecord::new(ScopeId::new_for_test(0, 0), None)
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut s = record();
        assert!(s.can_spawn());
        assert!(s.cancel(CancelReason::user("stop")));
        assert!(!s.cancel(CancelReason::user("stop again")));
        assert!(s.is_cancelled());
        assert!(!s.can_spawn());
    }

    #[test]
    fn cancel_strengthens_reason() {
        let mut s = record();
        s.cancel(CancelReason::user("stop"));
        s.cancel(CancelReason::shutdown());
        assert_eq!(
            s.cancelled.as_ref().map(CancelReason::kind),
            Some(CancelKind::Shutdown)
        );
    }

    #[test]
    fn child_membership() {
        let mut s = record();
        let child = ScopeId::new_for_test(2, 0);
        s.add_child(child);
        s.add_child(child);
        assert_eq!(s.children.len(), 1);
        s.remove_child(child);
        assert!(s.children.is_empty());
    }

    #[test]
    fn task_membership() {
        let mut s = record();
        let t = TaskId::new_for_test(1, 0);
        s.add_task(t);
        s.add_task(t);
        assert_eq!(s.tasks.len(), 1);
        assert!(s.has_live_tasks());
        s.remove_task(t);
        assert!(!s.has_live_tasks());
    }
}
