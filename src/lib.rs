//! Taskscope: a minimal structured-concurrency scope primitive.
//!
//! # Overview
//!
//! Taskscope provides three cooperating pieces:
//!
//! - A **[`Scope`]** owns a group of tasks (and child scopes, forming a
//!   tree). It supports spawning children, cancelling all of them
//!   atomically, and joining until every child reaches a terminal state.
//! - A **task** is a unit of cooperatively scheduled work with an explicit
//!   state machine (`Pending → Running ⇄ Suspended → Completed | Cancelled
//!   | Failed`) and a typed result slot exposed through a [`TaskHandle`].
//! - A **scheduler** drives tasks on a bounded worker pool. A task never
//!   blocks a worker while waiting: it suspends at a checkpoint and the
//!   worker switches to another runnable task.
//!
//! # Cancellation Model
//!
//! Cancellation is advisory-cooperative. [`Scope::cancel_all`] sets the
//! cancellation flag for every non-terminal child before it returns, but a
//! task only stops at its next checkpoint ([`Cx::checkpoint`],
//! [`Cx::sleep`], [`Cx::await_task`], [`Cx::join`]). At that point the task
//! unwinds via `?`, releasing any scoped resources through ordinary `Drop`,
//! and ends in the `Cancelled` state. Cancelling twice has no additional
//! effect. A child's failure never cancels its siblings; the caller
//! inspects outcomes and decides.
//!
//! # Runtimes
//!
//! Two drivers share the same runtime state:
//!
//! - [`Runtime`]: a bounded pool of worker threads over a wall clock.
//! - [`LabRuntime`]: a deterministic single-threaded stepper over virtual
//!   time, for tests that need exact timing.
//!
//! # Example
//!
//! ```
//! use taskscope::{LabRuntime, Outcome};
//! use std::time::Duration;
//!
//! let mut lab = LabRuntime::default();
//! let scope = lab.new_scope();
//! let handle = scope
//!     .spawn(|cx| async move {
//!         cx.sleep(Duration::from_millis(10)).await?;
//!         Ok(42)
//!     })
//!     .unwrap();
//! lab.run_until_quiescent();
//! assert!(matches!(handle.try_outcome(), Some(Outcome::Completed(42))));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]

pub mod cx;
pub mod error;
pub mod lab;
pub mod record;
pub mod runtime;
pub mod time;
pub mod types;
pub mod util;

pub use cx::{AwaitTask, Cx, Join, JoinScope, Scope, TaskHandle};
pub use error::{Error, ErrorKind, Result};
pub use lab::{LabConfig, LabRuntime};
pub use record::task::TaskState;
pub use runtime::{Runtime, RuntimeBuilder};
pub use time::Sleep;
pub use types::{CancelKind, CancelReason, Outcome, ScopeId, TaskId, Time};
