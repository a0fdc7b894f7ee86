//! Lab runtime configuration.

/// Configuration for a [`LabRuntime`](super::LabRuntime).
#[derive(Debug, Clone, Default)]
pub struct LabConfig {
    /// Upper bound on scheduler steps for `run_until_quiescent` and
    /// `block_on`; a guard against accidental infinite loops in tests.
    /// `None` means unbounded.
    pub max_steps: Option<u64>,
}

impl LabConfig {
    /// Creates a configuration with no step limit.
    #[must_use]
    pub const fn new() -> Self {
        Self { max_steps: None }
    }

    /// Sets the step limit.
    #[must_use]
    pub const fn max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }
}
