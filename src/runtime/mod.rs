//! Threaded runtime and shared scheduling machinery.
//!
//! - [`builder`]: fluent runtime configuration
//! - [`queue`]: two-lane run queue (cancel before ready)
//! - [`timer`]: min-heap of sleep deadlines
//! - `state`: global bookkeeping behind the single state lock
//! - `worker`: the drive loop shared with the lab stepper
//!
//! The [`Runtime`] drives tasks on a bounded pool of worker threads over
//! the wall clock. For deterministic virtual-time execution see
//! [`LabRuntime`](crate::LabRuntime); both share the same state and drive
//! logic.

pub mod builder;
pub mod queue;
pub mod timer;

pub(crate) mod state;
pub(crate) mod stored;
pub(crate) mod waker;
pub(crate) mod worker;

pub use builder::RuntimeBuilder;

use crate::cx::Scope;
use crate::time::clock::Clock;
use crate::types::{CancelReason, ScopeId, TaskId};
use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use state::RuntimeState;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread;

/// State shared between handles, workers, and wakers.
pub(crate) struct Shared {
    /// The single mutual-exclusion section guarding all bookkeeping.
    pub(crate) state: Mutex<RuntimeState>,
    /// Lock-free landing pad for wakes; folded into the run queue under
    /// the state lock.
    pub(crate) injector: SegQueue<TaskId>,
    /// Companion lock for `parked`.
    pub(crate) park_lock: Mutex<()>,
    /// Workers park here when there is nothing runnable.
    pub(crate) parked: Condvar,
    /// Set once shutdown has been requested.
    pub(crate) shutdown: AtomicBool,
    /// Time source (wall for the threaded runtime, virtual for the lab).
    pub(crate) clock: Clock,
    /// The implicit root scope; every caller-created scope is its child.
    pub(crate) root: ScopeId,
}

impl Shared {
    pub(crate) fn new(clock: Clock) -> Arc<Self> {
        let mut state = RuntimeState::new();
        let root = state.create_scope(None);
        Arc::new(Self {
            state: Mutex::new(state),
            injector: SegQueue::new(),
            park_lock: Mutex::new(()),
            parked: Condvar::new(),
            shutdown: AtomicBool::new(false),
            clock,
            root,
        })
    }

    /// Folds queued wakes into the run queue. Must hold the state lock.
    pub(crate) fn drain_injector(&self, state: &mut RuntimeState) {
        while let Some(task) = self.injector.pop() {
            state.schedule_woken(task);
        }
    }

    /// Creates a new top-level scope under the root.
    pub(crate) fn new_scope(self: &Arc<Self>) -> Scope {
        let id = {
            let mut state = self.state.lock();
            let root = self.root;
            state.create_scope(Some(root))
        };
        Scope::new(id, Arc::downgrade(self))
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("root", &self.root)
            .field("shutdown", &self.shutdown.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// A runtime driving tasks on a bounded pool of worker threads.
///
/// Dropping the runtime cancels every outstanding task with a shutdown
/// reason, drains them to their terminal states, and joins the workers.
///
/// # Example
///
/// ```
/// use taskscope::Runtime;
///
/// let runtime = Runtime::new();
/// let scope = runtime.new_scope();
/// let handle = scope.spawn(|_cx| async { Ok(21 * 2) }).unwrap();
/// runtime.block_on(scope.join());
/// assert_eq!(handle.try_outcome().unwrap().unwrap(), 42);
/// ```
#[derive(Debug)]
pub struct Runtime {
    shared: Arc<Shared>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl Runtime {
    /// Creates a runtime with default configuration.
    #[must_use]
    pub fn new() -> Self {
        RuntimeBuilder::new().build()
    }

    pub(crate) fn from_builder(builder: RuntimeBuilder) -> Self {
        let shared = Shared::new(Clock::wall());
        let workers = (0..builder.workers)
            .map(|index| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("{}-{index}", builder.thread_name))
                    .spawn(move || worker::worker_loop(&shared))
                    .unwrap_or_else(|e| panic!("failed to spawn worker thread: {e}"))
            })
            .collect();
        Self { shared, workers }
    }

    /// Returns the number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Creates a new top-level [`Scope`].
    #[must_use]
    pub fn new_scope(&self) -> Scope {
        self.shared.new_scope()
    }

    /// Drives a future on the calling thread until it completes.
    ///
    /// The calling thread parks while the future is pending; completions
    /// inside the runtime unpark it. Use this to wait on
    /// [`Scope::join`] or a [`TaskHandle`](crate::TaskHandle) from
    /// outside the runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        struct ThreadWaker(thread::Thread);

        impl Wake for ThreadWaker {
            fn wake(self: Arc<Self>) {
                self.0.unpark();
            }

            fn wake_by_ref(self: &Arc<Self>) {
                self.0.unpark();
            }
        }

        let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
        let mut cx = Context::from_waker(&waker);
        let mut future = std::pin::pin!(future);
        loop {
            match future.as_mut().poll(&mut cx) {
                Poll::Ready(value) => return value,
                Poll::Pending => thread::park(),
            }
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            let root = self.shared.root;
            state.request_cancel_scope(root, &CancelReason::shutdown());
        }
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.parked.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
