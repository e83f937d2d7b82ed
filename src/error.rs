//! Error types raised by stages, wards and limiters.
//!
//! [`StageError`] is the single error enum flowing out of concurrent activities.
//! It distinguishes three families:
//!
//! - **Cancellation**: [`StageError::Canceled`], a control signal, never a failure.
//! - **Operational**: conditions the runtime anticipates (`Closed`, `Timeout`,
//!   `MissedHeartbeat`) and errors already classified as non-bugs.
//! - **Bugs**: anything else (`Fail`, `Fatal`, `Panicked`) once it crosses a component
//!   boundary; see [`ClassifiedError::classify`](crate::ClassifiedError::classify).
//!
//! [`RuntimeError`] covers failures of the runtime itself, such as a pipeline whose
//! activities outlive the shutdown grace period.
//!
//! Both enums offer `as_label` / `as_message` helpers for logs.

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

use crate::fault::ClassifiedError;

/// # Errors produced by the runtime itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; remaining activities were aborted.
    #[error("shutdown timeout {grace:?} exceeded; {stuck} activities still running; forcing termination")]
    GraceExceeded {
        /// The grace duration.
        grace: Duration,
        /// Number of activities that did not stop in time.
        stuck: usize,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use stagevisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: 2 };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck activities={stuck}")
            }
        }
    }
}

/// # Errors produced by concurrent activities.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum StageError {
    /// The activity's cancel token fired.
    #[error("context cancelled")]
    Canceled,

    /// The other end of a sequence was dropped.
    #[error("sequence closed")]
    Closed,

    /// A timeout-derived token elapsed.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// A ward produced no heartbeat within its deadline.
    #[error("ward '{ward}' missed heartbeat deadline of {timeout:?}")]
    MissedHeartbeat {
        /// Ward name.
        ward: String,
        /// The heartbeat deadline.
        timeout: Duration,
    },

    /// Work failed; a supervisor may retry it.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable error.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// The activity panicked.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// An error already classified by an inner component.
    #[error(transparent)]
    Classified(ClassifiedError),
}

impl StageError {
    /// Shorthand for [`StageError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        StageError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`StageError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        StageError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use stagevisor::StageError;
    /// use std::time::Duration;
    ///
    /// let err = StageError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "stage_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StageError::Canceled => "stage_canceled",
            StageError::Closed => "stage_closed",
            StageError::Timeout { .. } => "stage_timeout",
            StageError::MissedHeartbeat { .. } => "ward_missed_heartbeat",
            StageError::Fail { .. } => "stage_failed",
            StageError::Fatal { .. } => "stage_fatal",
            StageError::Panicked { .. } => "stage_panicked",
            StageError::Classified(_) => "classified",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            StageError::Canceled => "context cancelled".to_string(),
            StageError::Closed => "sequence closed".to_string(),
            StageError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            StageError::MissedHeartbeat { ward, timeout } => {
                format!("ward {ward} missed heartbeat: {timeout:?}")
            }
            StageError::Fail { error } => format!("error: {error}"),
            StageError::Fatal { error } => format!("fatal: {error}"),
            StageError::Panicked { info } => format!("panic: {info}"),
            StageError::Classified(err) => err.message().to_string(),
        }
    }

    /// True for the cancellation control signal.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, StageError::Canceled)
    }

    /// True for errors that end the activity that raised them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StageError::Fatal { .. } | StageError::Panicked { .. })
    }

    /// True for conditions the runtime anticipates.
    ///
    /// # Example
    /// ```
    /// use stagevisor::StageError;
    ///
    /// assert!(StageError::Closed.is_operational());
    /// assert!(!StageError::fail("boom").is_operational());
    /// ```
    pub fn is_operational(&self) -> bool {
        match self {
            StageError::Closed | StageError::Timeout { .. } | StageError::MissedHeartbeat { .. } => {
                true
            }
            StageError::Classified(err) => !err.is_bug(),
            _ => false,
        }
    }
}

impl From<ClassifiedError> for StageError {
    fn from(err: ClassifiedError) -> Self {
        StageError::Classified(err)
    }
}

/// Renders a panic payload caught by `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
