//! # Classified errors.
//!
//! A [`ClassifiedError`] is created at a component boundary when an error leaves a
//! concurrent activity. It records where the error came from, when, and whether it
//! is a bug (`is_bug = true`) or an anticipated operational condition whose message
//! may be shown to an end user as-is.
//!
//! ## Rules
//! - Errors already classified by an inner component pass through unchanged.
//! - Unrecognized errors (`Fail`, `Fatal`, `Panicked`) become bugs.
//! - Each error carries a process-unique correlation id used when presenting bugs.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::error::StageError;

/// Global counter for correlation ids.
static CORRELATION_SEQ: AtomicU64 = AtomicU64::new(1);

/// An error normalized at a component boundary.
///
/// Immutable once created. Cheap to clone (the cause is behind an `Arc`).
///
/// ## Example
/// ```rust
/// use stagevisor::{ClassifiedError, StageError};
///
/// let known = ClassifiedError::classify("fetch", StageError::Closed);
/// assert!(!known.is_bug());
/// assert_eq!(known.user_message(), "sequence closed");
///
/// let bug = ClassifiedError::classify("fetch", StageError::fail("index out of range"));
/// assert!(bug.is_bug());
/// assert!(bug.user_message().starts_with("an unexpected error occurred"));
/// ```
#[derive(Clone)]
pub struct ClassifiedError {
    cause: Option<Arc<dyn Error + Send + Sync>>,
    message: String,
    origin: Arc<str>,
    at: SystemTime,
    is_bug: bool,
    correlation: u64,
}

impl ClassifiedError {
    /// A recognized operational condition with a ready-to-display message.
    pub fn operational(origin: impl Into<Arc<str>>, message: impl Into<String>) -> Self {
        Self::build(origin.into(), message.into(), None, false)
    }

    /// An unrecognized error; its detail is logged, never shown verbatim.
    pub fn bug<E>(origin: impl Into<Arc<str>>, cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        let message = cause.to_string();
        Self::build(origin.into(), message, Some(Arc::new(cause)), true)
    }

    /// Classifies a [`StageError`] crossing the boundary of `origin`.
    ///
    /// Already-classified errors keep their origin and `is_bug` flag.
    pub fn classify(origin: impl Into<Arc<str>>, err: StageError) -> Self {
        match err {
            StageError::Classified(inner) => inner,
            StageError::Canceled
            | StageError::Closed
            | StageError::Timeout { .. }
            | StageError::MissedHeartbeat { .. } => Self::operational(origin, err.to_string()),
            other => Self::bug(origin, other),
        }
    }

    fn build(
        origin: Arc<str>,
        message: String,
        cause: Option<Arc<dyn Error + Send + Sync>>,
        is_bug: bool,
    ) -> Self {
        Self {
            cause,
            message,
            origin,
            at: SystemTime::now(),
            is_bug,
            correlation: CORRELATION_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
        }
    }

    /// True when the error was not anticipated by any component.
    pub fn is_bug(&self) -> bool {
        self.is_bug
    }

    /// Raw message (for bugs: the cause rendered as text).
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Name of the component that classified the error.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Wall-clock creation time.
    pub fn at(&self) -> SystemTime {
        self.at
    }

    /// Process-unique correlation id.
    pub fn correlation(&self) -> u64 {
        self.correlation
    }

    /// The original error, if any.
    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync)> {
        self.cause.as_deref()
    }

    /// Message suitable for an end user.
    ///
    /// Operational errors show their embedded message; bugs show a generic
    /// apology with the correlation id.
    pub fn user_message(&self) -> String {
        if self.is_bug {
            format!(
                "an unexpected error occurred; please report reference #{}",
                self.correlation
            )
        } else {
            self.message.clone()
        }
    }
}

impl fmt::Debug for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifiedError")
            .field("origin", &self.origin)
            .field("message", &self.message)
            .field("is_bug", &self.is_bug)
            .field("correlation", &self.correlation)
            .field("at", &self.at)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .finish()
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.origin, self.message)
    }
}

impl Error for ClassifiedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn operational_variants_are_not_bugs() {
        for err in [
            StageError::Closed,
            StageError::Timeout {
                timeout: Duration::from_millis(5),
            },
            StageError::MissedHeartbeat {
                ward: "w".into(),
                timeout: Duration::from_millis(5),
            },
        ] {
            let c = ClassifiedError::classify("x", err);
            assert!(!c.is_bug());
            assert!(c.cause().is_none());
        }
    }

    #[test]
    fn unknown_errors_become_bugs_with_cause() {
        let c = ClassifiedError::classify("parse", StageError::fatal("bad utf8"));
        assert!(c.is_bug());
        assert_eq!(c.origin(), "parse");
        assert!(c.source().is_some());
        assert!(!c.user_message().contains("bad utf8"));
        assert!(c.user_message().contains(&c.correlation().to_string()));
    }

    #[test]
    fn classified_errors_pass_through_unchanged() {
        let inner = ClassifiedError::operational("limiter", "quota exhausted");
        let id = inner.correlation();
        let outer = ClassifiedError::classify("stage", StageError::Classified(inner));
        assert_eq!(outer.origin(), "limiter");
        assert_eq!(outer.correlation(), id);
        assert!(!outer.is_bug());
    }

    #[test]
    fn correlation_ids_are_unique() {
        let a = ClassifiedError::operational("a", "m");
        let b = ClassifiedError::operational("a", "m");
        assert_ne!(a.correlation(), b.correlation());
    }
}
