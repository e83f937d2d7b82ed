//! # Top-level error handler.
//!
//! [`ErrorHandler`] is the single decision point at the end of the error channel:
//! - bugs are logged with full detail (cause, origin, timestamp, correlation id) and
//!   presented as a generic apology carrying the correlation id;
//! - operational errors are logged briefly and presented with their own message.

use std::time::UNIX_EPOCH;

use super::{ClassifiedError, ErrorStream};
use crate::cancel::CancelToken;

/// Presents classified errors to an end consumer.
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorHandler;

impl ErrorHandler {
    /// Construct a new [`ErrorHandler`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Logs `err` and returns the message to present.
    pub fn handle(&self, err: &ClassifiedError) -> String {
        if err.is_bug() {
            let at_ms = err
                .at()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default();
            tracing::error!(
                origin = %err.origin(),
                correlation = err.correlation(),
                at_ms,
                cause = ?err.cause().map(|c| c.to_string()),
                "unexpected error: {}",
                err.message(),
            );
        } else {
            tracing::info!(
                origin = %err.origin(),
                correlation = err.correlation(),
                "{}",
                err.message(),
            );
        }
        err.user_message()
    }

    /// Consumes `stream` until it closes or `token` fires, passing each presented
    /// message to `present`. Returns the number of errors handled.
    pub async fn drain<F>(&self, mut stream: ErrorStream, token: &CancelToken, mut present: F) -> usize
    where
        F: FnMut(String),
    {
        let mut handled = 0;
        while let Some(err) = stream.next(token).await {
            present(self.handle(&err));
            handled += 1;
        }
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::fault::error_channel;

    #[test]
    fn operational_errors_show_their_message() {
        let err = ClassifiedError::classify("fetch", StageError::Closed);
        assert_eq!(ErrorHandler::new().handle(&err), "sequence closed");
    }

    #[test]
    fn bugs_show_apology_with_correlation_id() {
        let err = ClassifiedError::classify("fetch", StageError::fail("null deref"));
        let shown = ErrorHandler::new().handle(&err);
        assert!(!shown.contains("null deref"));
        assert!(shown.ends_with(&format!("#{}", err.correlation())));
    }

    #[tokio::test]
    async fn drain_consumes_until_sinks_drop() {
        let (sink, stream) = error_channel(8);
        let token = CancelToken::new();
        sink.report(ClassifiedError::operational("a", "disk almost full"), &token)
            .await;
        sink.report(ClassifiedError::bug("b", StageError::fatal("oops")), &token)
            .await;
        drop(sink);

        let mut shown = Vec::new();
        let n = ErrorHandler::new()
            .drain(stream, &token, |msg| shown.push(msg))
            .await;
        assert_eq!(n, 2);
        assert_eq!(shown[0], "disk almost full");
        assert!(shown[1].starts_with("an unexpected error occurred"));
    }
}
