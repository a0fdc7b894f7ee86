//! Capability context and scope API.
//!
//! - [`Cx`]: handed to every task body; carries the checkpoint and sleep
//!   operations through which cancellation is observed.
//! - [`Scope`]: spawn, cancel, and join a group of tasks.
//! - [`TaskHandle`]: inspect or await a single task's outcome.

mod cx;
mod scope;

pub use cx::Cx;
pub use scope::{AwaitTask, Join, JoinScope, Scope, TaskHandle};
