//! Worker drive loop.
//!
//! Each worker repeatedly pulls a runnable task and drives it until it
//! completes or voluntarily suspends. Futures are checked out of the state
//! before polling, so user code runs without the state lock held. A
//! panicking task body is caught here and recorded as `Failed`; it never
//! takes the worker down.

use super::Shared;
use super::waker::TaskWaker;
use crate::error::Error;
use crate::types::{Outcome, TaskId};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

/// Longest a worker parks before re-checking for work and shutdown.
const MAX_PARK: Duration = Duration::from_millis(50);

/// The worker thread body.
pub(crate) fn worker_loop(shared: &Arc<Shared>) {
    loop {
        let (next, timer_wakers, next_deadline) = {
            let mut state = shared.state.lock();
            shared.drain_injector(&mut state);
            let now = shared.clock.now();
            let wakers = state.fire_timers(now);
            let next = state.queue.pop();
            (next, wakers, state.next_deadline())
        };

        let timers_fired = !timer_wakers.is_empty();
        for waker in timer_wakers {
            waker.wake();
        }

        if let Some(task) = next {
            poll_task(shared, task);
            continue;
        }
        if timers_fired {
            // The wakes just landed in the injector; fold them in.
            continue;
        }

        if shared.shutdown.load(Ordering::Acquire) && shared.state.lock().is_quiescent() {
            break;
        }

        let now = shared.clock.now();
        let wait = next_deadline.map_or(MAX_PARK, |d| d.duration_since(now).min(MAX_PARK));
        let wait = if wait.is_zero() {
            Duration::from_micros(100)
        } else {
            wait
        };
        let mut guard = shared.park_lock.lock();
        let _ = shared.parked.wait_for(&mut guard, wait);
    }
    tracing::trace!("worker exiting");
}

/// Drives one task for one poll.
///
/// Shared between the threaded workers and the lab stepper.
pub(crate) fn poll_task(shared: &Arc<Shared>, task: TaskId) {
    let checked_out = {
        let mut state = shared.state.lock();
        let stored = state.checkout_future(task);
        if stored.is_none() {
            // Stale wake for a terminal task, or the future is checked out
            // by another worker; the state records the wake in the latter
            // case so the other worker re-enqueues it.
            state.schedule_woken(task);
        }
        stored
    };
    let Some(mut stored) = checked_out else {
        return;
    };

    let waker = Waker::from(Arc::new(TaskWaker::new(task, Arc::downgrade(shared))));
    let mut cx = Context::from_waker(&waker);
    let polled = panic::catch_unwind(AssertUnwindSafe(|| stored.poll(&mut cx)));

    let wakers = {
        let mut state = shared.state.lock();
        match polled {
            Ok(Poll::Pending) => {
                state.park_task(task, stored);
                Vec::new()
            }
            Ok(Poll::Ready(outcome)) => state.finish_task(task, &outcome),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::debug!(task = %task, message, "task body panicked");
                let outcome = Outcome::Failed(Error::internal(format!("task panicked: {message}")));
                state.finish_task(task, &outcome)
            }
        }
    };
    for waker in wakers {
        waker.wake();
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
