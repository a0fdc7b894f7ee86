//! Core types: identifiers, time, cancellation reasons, outcomes.

mod cancel;
mod id;
mod outcome;
mod time;

pub use cancel::{CancelKind, CancelReason};
pub use id::{ScopeId, TaskId};
pub use outcome::Outcome;
pub use time::Time;
