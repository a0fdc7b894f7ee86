//! Time sources and the sleep future.
//!
//! The runtime reads time through a single [`Clock`](clock::Clock), either
//! anchored to the wall clock or fully virtual. [`Sleep`] is the canonical
//! suspension point: it parks a task until its deadline on whichever clock
//! the runtime carries, and observes cancellation on every poll.

pub(crate) mod clock;
mod sleep;

pub use sleep::Sleep;
