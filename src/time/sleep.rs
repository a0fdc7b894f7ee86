//! The sleep future.

use crate::cx::Cx;
use crate::error::{Error, Result};
use crate::types::{CancelReason, Time};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Future returned by [`Cx::sleep`].
///
/// Resolves with `Ok(())` once the duration has elapsed on the runtime's
/// clock, or with `Err(Cancelled)` if the owning scope requested
/// cancellation first. The deadline is fixed on the first poll, so the
/// countdown starts when the sleep is awaited, not when it is created.
#[derive(Debug)]
pub struct Sleep {
    cx: Cx,
    duration: Duration,
    /// Set on first poll.
    deadline: Option<Time>,
}

impl Sleep {
    pub(crate) const fn new(cx: Cx, duration: Duration) -> Self {
        Self {
            cx,
            duration,
            deadline: None,
        }
    }
}

impl Future for Sleep {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(shared) = self.cx.shared() else {
            return Poll::Ready(Err(Error::cancelled(CancelReason::shutdown())));
        };

        let mut state = shared.state.lock();

        // A sleep is a checkpoint: cancellation wins over the deadline.
        if let Some(reason) = state.pending_cancel(self.cx.task()) {
            return Poll::Ready(Err(Error::cancelled(reason)));
        }

        let now = shared.clock.now();
        match self.deadline {
            None => {
                let deadline = now + self.duration;
                state.timers.insert(deadline, cx.waker().clone());
                drop(state);
                self.deadline = Some(deadline);
                tracing::trace!(task = %self.cx.task(), %deadline, "sleep armed");
                Poll::Pending
            }
            Some(deadline) if now >= deadline => Poll::Ready(Ok(())),
            // Spurious poll before the deadline; re-arm so the wake at the
            // deadline still reaches the latest waker.
            Some(deadline) => {
                state.timers.insert(deadline, cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
