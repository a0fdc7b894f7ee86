//! Runtime builder.
//!
//! The runtime is configured with a fluent, move-based builder: each
//! method consumes `self` and returns an updated builder.

use super::Runtime;
use std::thread;

/// Configures and builds a [`Runtime`].
///
/// # Example
///
/// ```
/// use taskscope::RuntimeBuilder;
///
/// let runtime = RuntimeBuilder::new()
///     .worker_threads(2)
///     .thread_name("my-worker")
///     .build();
/// assert_eq!(runtime.worker_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeBuilder {
    pub(crate) workers: usize,
    pub(crate) thread_name: String,
}

impl RuntimeBuilder {
    /// Creates a builder with defaults: one worker per available core,
    /// capped at 8.
    #[must_use]
    pub fn new() -> Self {
        let workers = thread::available_parallelism()
            .map_or(2, std::num::NonZeroUsize::get)
            .min(8);
        Self {
            workers,
            thread_name: "taskscope-worker".to_string(),
        }
    }

    /// Sets the number of worker threads (at least 1).
    #[must_use]
    pub fn worker_threads(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets the base name for worker threads.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Builds the runtime and starts its workers.
    #[must_use]
    pub fn build(self) -> Runtime {
        Runtime::from_builder(self)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_has_floor_of_one() {
        let builder = RuntimeBuilder::new().worker_threads(0);
        assert_eq!(builder.workers, 1);
    }
}
