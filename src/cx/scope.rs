//! Scope handles and task handles.

use super::Cx;
use crate::error::{Error, Result};
use crate::record::TaskState;
use crate::runtime::stored::StoredTask;
use crate::runtime::worker::panic_message;
use crate::runtime::Shared;
use crate::types::{CancelReason, Outcome, ScopeId, TaskId};
use parking_lot::Mutex;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

/// A handle to a scope: an owner of a group of tasks.
///
/// Scopes form a tree. Cancelling a scope cancels every task it owns and
/// fans out to its child scopes; joining a scope waits for the whole
/// subtree to reach terminal states.
///
/// The handle is cheap to clone and holds only a weak reference to the
/// runtime; once the runtime is dropped, all operations degrade to the
/// closed-scope behavior.
#[derive(Debug, Clone)]
pub struct Scope {
    id: ScopeId,
    shared: Weak<Shared>,
}

impl Scope {
    pub(crate) const fn new(id: ScopeId, shared: Weak<Shared>) -> Self {
        Self { id, shared }
    }

    /// Returns this scope's id.
    #[must_use]
    pub const fn id(&self) -> ScopeId {
        self.id
    }

    /// Spawns a task running `work` into this scope.
    ///
    /// The work function receives a [`Cx`] and returns a future producing
    /// `Result<T>`. Fails with `ScopeClosed` if the scope was already
    /// cancelled; no task is created in that case.
    pub fn spawn<F, Fut, T>(&self, work: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce(Cx) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let Some(shared) = self.shared.upgrade() else {
            return Err(Error::scope_closed());
        };

        let task = shared.state.lock().register_task(self.id)?;
        let cx = Cx::new(Arc::downgrade(&shared), task, self.id);
        let slot: Arc<Mutex<OutcomeSlot<T>>> = Arc::new(Mutex::new(OutcomeSlot::empty()));

        let future = work(cx);
        let result_slot = Arc::clone(&slot);
        let wrapped = async move {
            let caught = CatchPanic {
                future: Box::pin(future),
            };
            let outcome = match caught.await {
                Ok(Ok(value)) => Outcome::Completed(value),
                Ok(Err(err)) if err.is_cancelled() => {
                    Outcome::Cancelled(err.cancel_reason().cloned().unwrap_or_default())
                }
                Ok(Err(err)) => Outcome::Failed(err),
                Err(message) => {
                    Outcome::Failed(Error::internal(format!("task panicked: {message}")))
                }
            };
            let (erased, state) = match &outcome {
                Outcome::Completed(_) => (Outcome::Completed(()), TaskState::Completed),
                Outcome::Failed(err) => (Outcome::Failed(err.clone()), TaskState::Failed),
                Outcome::Cancelled(reason) => {
                    (Outcome::Cancelled(reason.clone()), TaskState::Cancelled)
                }
            };
            // The slot is written before the record turns terminal, so a
            // handle that sees a missing or terminal record can always read
            // the snapshot.
            let mut guard = result_slot.lock();
            guard.terminal = Some(state);
            guard.outcome = Some(outcome);
            drop(guard);
            erased
        };

        shared
            .state
            .lock()
            .attach_future(task, StoredTask::new(wrapped));
        tracing::trace!(task = %task, scope = %self.id, "task spawned");
        shared.parked.notify_one();

        Ok(TaskHandle {
            task,
            shared: self.shared.clone(),
            slot,
        })
    }

    /// Creates a child scope.
    ///
    /// Cancelling this scope will fan out to the child. Fails with
    /// `ScopeClosed` if this scope was already cancelled.
    pub fn child(&self) -> Result<Self> {
        let Some(shared) = self.shared.upgrade() else {
            return Err(Error::scope_closed());
        };
        let mut state = shared.state.lock();
        let can_spawn = state
            .scopes
            .get(self.id.arena_index())
            .is_some_and(crate::record::ScopeRecord::can_spawn);
        if !can_spawn {
            return Err(Error::scope_closed());
        }
        let id = state.create_scope(Some(self.id));
        Ok(Self::new(id, self.shared.clone()))
    }

    /// Cancels every task in this scope and all child scopes.
    ///
    /// Idempotent and non-blocking: every child's cancellation flag is set
    /// before this returns, and each child unwinds at its next checkpoint.
    /// Use [`join`](Self::join) to wait for the unwinding to finish.
    pub fn cancel_all(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        shared
            .state
            .lock()
            .request_cancel_scope(self.id, &CancelReason::user("cancel_all"));
        shared.parked.notify_all();
    }

    /// Waits until every task in this scope's subtree is terminal.
    ///
    /// Drive the returned future from outside the runtime with
    /// [`Runtime::block_on`](crate::Runtime::block_on). Inside a task,
    /// prefer [`Cx::join`], which additionally observes cancellation of
    /// the waiting task's own scope.
    #[must_use]
    pub fn join(&self) -> JoinScope {
        JoinScope {
            scope: self.id,
            shared: self.shared.clone(),
        }
    }

    /// Returns true if this scope has been cancelled.
    ///
    /// A scope whose record was already reclaimed (cancelled and fully
    /// drained) also reports true.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.upgrade().is_some_and(|shared| {
            shared
                .state
                .lock()
                .scopes
                .get(self.id.arena_index())
                .is_none_or(crate::record::ScopeRecord::is_cancelled)
        })
    }

    /// Returns true if any task in this scope's subtree is still live.
    ///
    /// A scope whose children all reached terminal states is inactive,
    /// whether it was cancelled or drained naturally.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| !shared.state.lock().scope_is_drained(self.id))
    }
}

/// Future returned by [`Scope::join`].
///
/// Resolves once every task in the scope's subtree is terminal. Does not
/// observe cancellation of a waiting task's own scope; use [`Cx::join`]
/// inside task bodies.
#[derive(Debug)]
pub struct JoinScope {
    scope: ScopeId,
    shared: Weak<Shared>,
}

impl Future for JoinScope {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(shared) = self.shared.upgrade() else {
            return Poll::Ready(());
        };
        let mut state = shared.state.lock();
        if state.scope_is_drained(self.scope) {
            return Poll::Ready(());
        }
        if let Some(record) = state.scopes.get_mut(self.scope.arena_index()) {
            record.add_join_waker(cx.waker().clone());
        }
        Poll::Pending
    }
}

/// Future returned by [`Cx::join`].
///
/// A suspension checkpoint: resolves with `Ok(())` once the target scope's
/// subtree is drained, or with `Err(Cancelled)` if the waiting task's own
/// scope requested cancellation first.
#[derive(Debug)]
pub struct Join {
    cx: Cx,
    inner: JoinScope,
}

impl Join {
    pub(crate) const fn new(cx: Cx, inner: JoinScope) -> Self {
        Self { cx, inner }
    }
}

impl Future for Join {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Err(err) = self.cx.checkpoint() {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut self.inner).poll(ctx).map(Ok)
    }
}

/// Future returned by [`Cx::await_task`].
///
/// A suspension checkpoint: resolves with the target task's [`Outcome`],
/// or with `Err(Cancelled)` if the waiting task's own scope requested
/// cancellation first. The target task is unaffected either way.
#[derive(Debug)]
pub struct AwaitTask<T> {
    cx: Cx,
    handle: TaskHandle<T>,
}

impl<T> AwaitTask<T> {
    pub(crate) const fn new(cx: Cx, handle: TaskHandle<T>) -> Self {
        Self { cx, handle }
    }
}

impl<T> Future for AwaitTask<T> {
    type Output = Result<Outcome<T>>;

    fn poll(mut self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Err(err) = self.cx.checkpoint() {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut self.handle).poll(ctx).map(Ok)
    }
}

/// A handle to a spawned task.
///
/// The handle inspects the task's state, takes its terminal outcome, or
/// awaits completion. Dropping the handle detaches it; the task keeps
/// running under its scope.
///
/// Awaiting the handle directly is meant for driving from outside the
/// runtime via `block_on`; it does not observe cancellation of the waiting
/// task's scope. Inside a task body, use [`Cx::await_task`].
#[derive(Debug)]
pub struct TaskHandle<T> {
    task: TaskId,
    shared: Weak<Shared>,
    slot: Arc<Mutex<OutcomeSlot<T>>>,
}

impl<T> TaskHandle<T> {
    /// Returns the task's id.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.task
    }

    /// Returns a snapshot of the task's state.
    ///
    /// The terminal state stays readable after the runtime reclaims the
    /// task's record. A task the runtime discarded before it could finish
    /// (runtime dropped mid-flight) is reported as `Cancelled`.
    #[must_use]
    pub fn state(&self) -> TaskState {
        if let Some(shared) = self.shared.upgrade() {
            if let Some(record) = shared.state.lock().tasks.get(self.task.arena_index()) {
                return record.state;
            }
        }
        self.slot.lock().terminal.unwrap_or(TaskState::Cancelled)
    }

    /// Takes the task's terminal outcome, if it has one.
    ///
    /// Returns `None` while the task is live, or if the outcome was
    /// already taken (here or by awaiting the handle).
    #[must_use]
    pub fn try_outcome(&self) -> Option<Outcome<T>> {
        self.slot.lock().outcome.take()
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(shared) = self.shared.upgrade() else {
            let outcome = self
                .slot
                .lock()
                .outcome
                .take()
                .unwrap_or_else(|| Outcome::Cancelled(CancelReason::shutdown()));
            return Poll::Ready(outcome);
        };

        let mut state = shared.state.lock();
        // A live task always has a record; a reclaimed one is terminal
        // with its slot written.
        match state.tasks.get_mut(self.task.arena_index()) {
            Some(record) => {
                record.add_waiter(cx.waker().clone());
                Poll::Pending
            }
            None => {
                drop(state);
                let outcome = self.slot.lock().outcome.take().unwrap_or_else(|| {
                    Outcome::Failed(Error::internal("task outcome already taken"))
                });
                Poll::Ready(outcome)
            }
        }
    }
}

/// The handle's result slot: the typed outcome plus a terminal-state
/// snapshot that outlives both the outcome (taken once) and the task
/// record (reclaimed at finish).
#[derive(Debug)]
struct OutcomeSlot<T> {
    outcome: Option<Outcome<T>>,
    terminal: Option<TaskState>,
}

impl<T> OutcomeSlot<T> {
    const fn empty() -> Self {
        Self {
            outcome: None,
            terminal: None,
        }
    }
}

/// Catches panics out of the user future so the result slot is always
/// written before the task is recorded terminal.
struct CatchPanic<F> {
    future: Pin<Box<F>>,
}

impl<F: Future> Future for CatchPanic<F> {
    type Output = core::result::Result<F::Output, String>;

    fn poll(self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match panic::catch_unwind(AssertUnwindSafe(|| this.future.as_mut().poll(ctx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(value)) => Poll::Ready(Ok(value)),
            Err(payload) => Poll::Ready(Err(panic_message(payload.as_ref()))),
        }
    }
}
