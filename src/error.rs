//! Error types for taskscope.
//!
//! Errors are explicit and typed; there are no stringly-typed errors and no
//! fatal process-level failures. The two interesting kinds map directly to
//! the scope contract:
//!
//! - [`ErrorKind::ScopeClosed`]: spawning into an already-cancelled scope.
//!   Recoverable; the caller may create a new scope.
//! - [`ErrorKind::Cancelled`]: cooperative cancellation observed at a
//!   checkpoint. Task bodies propagate it with `?` so scoped resources are
//!   released by `Drop` on the way out.
//!
//! A task body that returns any other error ends in the `Failed` terminal
//! state; failure propagation is local and never cancels siblings.

use crate::types::CancelReason;
use core::fmt;

/// A specialized result type for taskscope operations.
pub type Result<T> = core::result::Result<T, Error>;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Spawn was refused because the scope was already cancelled.
    ScopeClosed,
    /// Cooperative cancellation was observed at a checkpoint.
    Cancelled,
    /// A user-supplied work function signalled an error.
    User,
    /// Internal runtime error (bug or panicked task body).
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScopeClosed => write!(f, "scope closed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::User => write!(f, "user error"),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

/// The error type for scope and task operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    reason: Option<CancelReason>,
}

impl Error {
    /// Creates an error with the given kind and no context.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            reason: None,
        }
    }

    /// Creates a `ScopeClosed` error.
    #[must_use]
    pub const fn scope_closed() -> Self {
        Self::new(ErrorKind::ScopeClosed)
    }

    /// Creates a `Cancelled` error carrying the reason observed at the
    /// checkpoint.
    #[must_use]
    pub const fn cancelled(reason: CancelReason) -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            message: None,
            reason: Some(reason),
        }
    }

    /// Creates a user error with a message.
    #[must_use]
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::User,
            message: Some(message.into()),
            reason: None,
        }
    }

    /// Creates an internal error with a message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: Some(message.into()),
            reason: None,
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error represents cooperative cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if this error is `ScopeClosed`.
    #[must_use]
    pub const fn is_scope_closed(&self) -> bool {
        matches!(self.kind, ErrorKind::ScopeClosed)
    }

    /// Returns the cancellation reason, if this is a `Cancelled` error.
    #[must_use]
    pub const fn cancel_reason(&self) -> Option<&CancelReason> {
        self.reason.as_ref()
    }

    /// Returns the attached message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(reason) = &self.reason {
            write!(f, " ({reason})")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}
