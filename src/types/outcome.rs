//! Terminal outcomes for tasks.

use super::cancel::CancelReason;
use crate::error::Error;
use core::fmt;

/// The terminal outcome of a task.
///
/// Mirrors the terminal arm of the task state machine:
///
/// - `Completed(T)`: the work function returned a value.
/// - `Failed(Error)`: the work function signalled an error (or panicked).
/// - `Cancelled(CancelReason)`: cooperative cancellation was observed at a
///   checkpoint and the task unwound.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The work function completed with a value.
    Completed(T),
    /// The work function signalled an error.
    Failed(Error),
    /// The task observed cancellation and unwound.
    Cancelled(CancelReason),
}

impl<T> Outcome<T> {
    /// Returns true if this outcome is `Completed`.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns true if this outcome is `Failed`.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns true if this outcome is `Cancelled`.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Maps the completed value using the provided function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Completed(v) => Outcome::Completed(f(v)),
            Self::Failed(e) => Outcome::Failed(e),
            Self::Cancelled(r) => Outcome::Cancelled(r),
        }
    }

    /// Converts this outcome to a standard `Result`, folding cancellation
    /// into an [`Error`].
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Self::Completed(v) => Ok(v),
            Self::Failed(e) => Err(e),
            Self::Cancelled(r) => Err(Error::cancelled(r)),
        }
    }

    /// Returns the completed value or panics.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is not `Completed`. Intended for tests.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self {
            Self::Completed(v) => v,
            Self::Failed(e) => panic!("called `Outcome::unwrap()` on a `Failed` value: {e}"),
            Self::Cancelled(r) => panic!("called `Outcome::unwrap()` on a `Cancelled` value: {r}"),
        }
    }
}

impl<T> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(_) => write!(f, "completed"),
            Self::Failed(e) => write!(f, "failed: {e}"),
            Self::Cancelled(r) => write!(f, "cancelled: {r}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates() {
        assert!(Outcome::Completed(1).is_completed());
        assert!(Outcome::<()>::Failed(Error::user("boom")).is_failed());
        assert!(Outcome::<()>::Cancelled(CancelReason::shutdown()).is_cancelled());
    }

    #[test]
    fn into_result_folds_cancellation() {
        let out: Outcome<u32> = Outcome::Cancelled(CancelReason::user("stop"));
        let err = out.into_result().unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn map_preserves_non_completed_arms() {
        let out: Outcome<u32> = Outcome::Failed(Error::user("boom"));
        assert!(out.map(|v| v * 2).is_failed());
        assert_eq!(Outcome::Completed(21).map(|v| v * 2).unwrap(), 42);
    }
}
