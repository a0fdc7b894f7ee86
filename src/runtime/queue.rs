//! Two-lane run queue.
//!
//! Runnable tasks wait in one of two lanes:
//!
//! 1. Cancel lane: tasks with a pending cancellation request. Drained
//!    first so cancellation is observed promptly.
//! 2. Ready lane: everything else, FIFO.
//!
//! Fairness is round-robin; there are no priorities. A dedup set
//! prevents double-scheduling.

use crate::types::TaskId;
use std::collections::{HashSet, VecDeque};

/// The two-lane run queue.
#[derive(Debug, Default)]
pub struct RunQueue {
    cancel_lane: VecDeque<TaskId>,
    ready_lane: VecDeque<TaskId>,
    /// Tasks currently queued (for dedup).
    scheduled: HashSet<TaskId>,
}

impl RunQueue {
    /// Creates a new empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    /// Returns true if no tasks are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }

    /// Enqueues a task in the ready lane.
    ///
    /// Does nothing if the task is already queued.
    pub fn push_ready(&mut self, task: TaskId) {
        if self.scheduled.insert(task) {
            self.ready_lane.push_back(task);
        }
    }

    /// Enqueues a task in the cancel lane, promoting it out of the ready
    /// lane if it was already queued there.
    pub fn push_cancel(&mut self, task: TaskId) {
        if self.scheduled.insert(task) {
            self.cancel_lane.push_back(task);
        } else if !self.cancel_lane.contains(&task) {
            self.ready_lane.retain(|&t| t != task);
            self.cancel_lane.push_back(task);
        }
    }

    /// Pops the next task to run: cancel lane before ready lane, FIFO
    /// within each lane.
    pub fn pop(&mut self) -> Option<TaskId> {
        let task = self
            .cancel_lane
            .pop_front()
            .or_else(|| self.ready_lane.pop_front())?;
        self.scheduled.remove(&task);
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(n: u32) -> TaskId {
        TaskId::new_for_test(n, 0)
    }

    #[test]
    fn fifo_within_ready_lane() {
        let mut q = RunQueue::new();
        q.push_ready(task(1));
        q.push_ready(task(2));
        q.push_ready(task(3));
        assert_eq!(q.pop(), Some(task(1)));
        assert_eq!(q.pop(), Some(task(2)));
        assert_eq!(q.pop(), Some(task(3)));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn cancel_lane_drained_first() {
        let mut q = RunQueue::new();
        q.push_ready(task(1));
        q.push_cancel(task(2));
        assert_eq!(q.pop(), Some(task(2)));
        assert_eq!(q.pop(), Some(task(1)));
    }

    #[test]
    fn dedup_prevents_double_schedule() {
        let mut q = RunQueue::new();
        q.push_ready(task(1));
        q.push_ready(task(1));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn push_cancel_promotes_from_ready_lane() {
        let mut q = RunQueue::new();
        q.push_ready(task(1));
        q.push_ready(task(2));
        q.push_cancel(task(2));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(task(2)));
        assert_eq!(q.pop(), Some(task(1)));
    }

    #[test]
    fn push_cancel_is_idempotent() {
        let mut q = RunQueue::new();
        q.push_cancel(task(1));
        q.push_cancel(task(1));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop(), Some(task(1)));
        assert_eq!(q.pop(), None);
    }
}
