//! # Error channel.
//!
//! Carries [`ClassifiedError`]s out of concurrent workers to a single decision point.
//! Every send races against a [`CancelToken`], so a full channel never blocks a
//! producer past cancellation.
//!
//! ```text
//!   stage A ──┐
//!   stage B ──┼── ErrorSink::report(err, &token) ──► [ bounded queue ] ──► ErrorStream ──► ErrorHandler
//!   steward ──┘
//! ```

use tokio::sync::mpsc;

use super::ClassifiedError;
use crate::{cancel::CancelToken, error::StageError};

/// Creates a bounded error channel (capacity clamped to a minimum of 1).
pub fn error_channel(capacity: usize) -> (ErrorSink, ErrorStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ErrorSink { tx }, ErrorStream { rx })
}

/// Sending half of the error channel. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ErrorSink {
    tx: mpsc::Sender<ClassifiedError>,
}

impl ErrorSink {
    /// Delivers `err`, waiting for space unless `token` fires first.
    ///
    /// A free slot wins over a fired token, so errors raised by the cancellation itself
    /// (e.g. an elapsed timeout) still get through when the queue has room.
    /// Returns `false` if the error could not be delivered (cancelled or no consumer).
    /// Undelivered errors are logged so that nothing is silently swallowed.
    pub async fn report(&self, err: ClassifiedError, token: &CancelToken) -> bool {
        let outcome = tokio::select! {
            biased;
            res = self.tx.reserve() => match res {
                Ok(permit) => {
                    permit.send(err);
                    return true;
                }
                Err(_) => "closed",
            },
            _ = token.cancelled() => "cancelled",
        };
        log_dropped(&err, outcome);
        false
    }

    /// Delivers `err` only if the queue has room right now.
    ///
    /// Used by callers that must never wait on the error consumer.
    pub fn try_report(&self, err: ClassifiedError) -> bool {
        match self.tx.try_reserve() {
            Ok(permit) => {
                permit.send(err);
                true
            }
            Err(mpsc::error::TrySendError::Full(())) => {
                log_dropped(&err, "full");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                log_dropped(&err, "closed");
                false
            }
        }
    }
}

fn log_dropped(err: &ClassifiedError, reason: &str) {
    tracing::warn!(
        origin = %err.origin(),
        correlation = err.correlation(),
        is_bug = err.is_bug(),
        reason,
        "error channel dropped error: {}",
        err.message(),
    );
}

/// Classifies a failure at the boundary of `origin` and forwards it.
///
/// Without a sink the failure is logged at `error` level instead.
pub(crate) async fn report_failure(
    origin: &str,
    err: StageError,
    sink: Option<&ErrorSink>,
    token: &CancelToken,
) {
    let classified = ClassifiedError::classify(origin, err);
    match sink {
        Some(sink) => {
            sink.report(classified, token).await;
        }
        None => log_unreported(&classified),
    }
}

/// Like [`report_failure`], but drops the error instead of waiting for queue space.
pub(crate) fn report_failure_now(origin: &str, err: StageError, sink: Option<&ErrorSink>) {
    let classified = ClassifiedError::classify(origin, err);
    match sink {
        Some(sink) => {
            sink.try_report(classified);
        }
        None => log_unreported(&classified),
    }
}

fn log_unreported(err: &ClassifiedError) {
    tracing::error!(
        origin = %err.origin(),
        correlation = err.correlation(),
        is_bug = err.is_bug(),
        "unreported failure: {}",
        err.message(),
    );
}

/// Receiving half of the error channel.
#[derive(Debug)]
pub struct ErrorStream {
    rx: mpsc::Receiver<ClassifiedError>,
}

impl ErrorStream {
    /// Next error, or `None` when cancelled or every sink is dropped.
    pub async fn next(&mut self, token: &CancelToken) -> Option<ClassifiedError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            err = self.rx.recv() => err,
        }
    }

    /// Takes a pending error without waiting.
    pub fn try_next(&mut self) -> Option<ClassifiedError> {
        self.rx.try_recv().ok()
    }
}
