//! Deterministic lab runtime for tests.
//!
//! Same scopes, tasks, and cancellation semantics as the threaded
//! [`Runtime`](crate::Runtime), driven single-threaded over a virtual
//! clock. Tests step it explicitly or run it to quiescence, and sleeps
//! resolve by advancing virtual time instead of waiting.

mod config;
mod runtime;

pub use config::LabConfig;
pub use runtime::LabRuntime;
