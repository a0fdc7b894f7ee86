//! Waker implementation.
//!
//! Waking a task pushes its id onto the lock-free injector and unparks a
//! worker; the id is folded into the run queue the next time the scheduler
//! holds the state lock. The waker holds only a weak reference to the
//! runtime, so a wake arriving after shutdown is a no-op.

use super::Shared;
use crate::types::TaskId;
use std::sync::{Arc, Weak};
use std::task::Wake;

/// Wakes a task by re-enqueueing it for scheduling.
pub(crate) struct TaskWaker {
    task: TaskId,
    shared: Weak<Shared>,
}

impl TaskWaker {
    pub(crate) const fn new(task: TaskId, shared: Weak<Shared>) -> Self {
        Self { task, shared }
    }
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        if let Some(shared) = self.shared.upgrade() {
            shared.injector.push(self.task);
            shared.parked.notify_one();
        }
    }
}
