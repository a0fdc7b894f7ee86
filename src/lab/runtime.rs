//! Deterministic single-threaded runtime over virtual time.

use super::config::LabConfig;
use crate::cx::Scope;
use crate::runtime::{worker, Shared};
use crate::time::clock::Clock;
use crate::types::Time;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// A deterministic runtime for tests.
///
/// Runs everything on the calling thread over a virtual clock: time only
/// moves when the stepper advances it to the next armed deadline, so a
/// test sleeping for an hour finishes instantly and every run is
/// reproducible. Shares all scheduling machinery with the threaded
/// [`Runtime`](crate::Runtime); only the drive loop and clock differ.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use taskscope::LabRuntime;
///
/// let mut lab = LabRuntime::new();
/// let scope = lab.new_scope();
/// let handle = scope
///     .spawn(|cx| async move {
///         cx.sleep(Duration::from_secs(3600)).await?;
///         Ok("done")
///     })
///     .unwrap();
/// lab.run_until_quiescent();
/// assert_eq!(handle.try_outcome().unwrap().unwrap(), "done");
/// ```
#[derive(Debug)]
pub struct LabRuntime {
    shared: Arc<Shared>,
    config: LabConfig,
    steps: u64,
}

impl LabRuntime {
    /// Creates a lab runtime with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LabConfig::new())
    }

    /// Creates a lab runtime with the given configuration.
    #[must_use]
    pub fn with_config(config: LabConfig) -> Self {
        Self {
            shared: Shared::new(Clock::virtual_()),
            config,
            steps: 0,
        }
    }

    /// Creates a new top-level [`Scope`].
    #[must_use]
    pub fn new_scope(&self) -> Scope {
        self.shared.new_scope()
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.shared.clock.now()
    }

    /// Returns the number of scheduler steps taken so far.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Returns true if every spawned task has reached a terminal state.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.shared.state.lock().is_quiescent()
    }

    /// Runs one scheduler step: polls the next runnable task.
    ///
    /// Returns true if a task was polled. Does not advance time; see
    /// [`run_until`](Self::run_until) and
    /// [`run_until_quiescent`](Self::run_until_quiescent).
    pub fn step(&mut self) -> bool {
        let next = {
            let mut state = self.shared.state.lock();
            self.shared.drain_injector(&mut state);
            state.queue.pop()
        };
        let Some(task) = next else {
            return false;
        };
        self.steps += 1;
        worker::poll_task(&self.shared, task);
        true
    }

    /// Runs until quiescent, advancing virtual time to armed deadlines as
    /// the runnable set empties.
    ///
    /// # Panics
    ///
    /// Panics if the configured step limit is exceeded, or if the runtime
    /// stalls with live tasks but no runnable work and no armed timers
    /// (a deadlock under virtual time).
    pub fn run_until_quiescent(&mut self) {
        loop {
            if self.step() {
                self.check_step_limit();
                continue;
            }
            if self.is_quiescent() {
                return;
            }
            assert!(
                self.advance_to_next_deadline(None),
                "lab runtime stalled: live tasks but no runnable work and no armed timers"
            );
        }
    }

    /// Runs until virtual time reaches `until`, or earlier quiescence.
    ///
    /// Fires every timer with a deadline at or before `until`, runs the
    /// tasks it wakes, and leaves the clock at `until`.
    ///
    /// # Panics
    ///
    /// Panics if the configured step limit is exceeded.
    pub fn run_until(&mut self, until: Time) {
        loop {
            if self.step() {
                self.check_step_limit();
                continue;
            }
            if !self.advance_to_next_deadline(Some(until)) {
                break;
            }
        }
        self.shared.clock.advance_to(until);
        // Deadlines exactly at `until` may have just become due.
        self.fire_due_timers();
        while self.step() {
            self.check_step_limit();
        }
    }

    /// Drives `future` on the calling thread, stepping the runtime while
    /// it is pending.
    ///
    /// # Panics
    ///
    /// Panics if the future is still pending once the runtime is
    /// quiescent with no armed timers, or if the step limit is exceeded.
    pub fn block_on<F: Future>(&mut self, future: F) -> F::Output {
        let waker = Waker::noop().clone();
        let mut cx = Context::from_waker(&waker);
        let mut future = pin!(future);
        loop {
            if let Poll::Ready(value) = future.as_mut().poll(&mut cx) {
                return value;
            }
            if self.step() {
                self.check_step_limit();
                continue;
            }
            assert!(
                self.advance_to_next_deadline(None),
                "lab block_on deadlocked: future pending with no runnable work and no armed timers"
            );
        }
    }

    /// Advances virtual time to the next armed deadline and fires it.
    ///
    /// With `limit`, deadlines beyond it are left armed and false is
    /// returned. Returns true if a timer fired.
    fn advance_to_next_deadline(&mut self, limit: Option<Time>) -> bool {
        let deadline = {
            let state = self.shared.state.lock();
            state.next_deadline()
        };
        let Some(deadline) = deadline else {
            return false;
        };
        if limit.is_some_and(|limit| deadline > limit) {
            return false;
        }
        tracing::trace!(%deadline, "advancing virtual time");
        self.shared.clock.advance_to(deadline);
        self.fire_due_timers();
        true
    }

    fn fire_due_timers(&mut self) {
        let wakers = {
            let mut state = self.shared.state.lock();
            let now = self.shared.clock.now();
            state.fire_timers(now)
        };
        for waker in wakers {
            waker.wake();
        }
    }

    fn check_step_limit(&self) {
        if let Some(max) = self.config.max_steps {
            assert!(
                self.steps <= max,
                "lab runtime exceeded step limit ({max})"
            );
        }
    }
}

impl Default for LabRuntime {
    fn default() -> Self {
        Self::new()
    }
}
