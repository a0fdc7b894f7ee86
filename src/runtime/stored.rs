//! Type-erased future storage.
//!
//! Spawned work is wrapped into a future with the erased output
//! `Outcome<()>`; the typed value travels through the handle's result
//! slot instead.

use crate::types::Outcome;
use core::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A stored, type-erased task future.
pub(crate) struct StoredTask {
    future: Pin<Box<dyn Future<Output = Outcome<()>> + Send + 'static>>,
}

impl StoredTask {
    /// Boxes a future for storage in the runtime state.
    pub(crate) fn new(future: impl Future<Output = Outcome<()>> + Send + 'static) -> Self {
        Self {
            future: Box::pin(future),
        }
    }

    /// Polls the stored future.
    pub(crate) fn poll(&mut self, cx: &mut Context<'_>) -> Poll<Outcome<()>> {
        self.future.as_mut().poll(cx)
    }
}

impl fmt::Debug for StoredTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredTask").finish_non_exhaustive()
    }
}
