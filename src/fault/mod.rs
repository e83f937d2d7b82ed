//! Error channel and classification.
//!
//! ## Contents
//! - [`ClassifiedError`]: error normalized at a component boundary (`is_bug` flag,
//!   origin, timestamp, correlation id)
//! - [`error_channel`], [`ErrorSink`], [`ErrorStream`]: cancellable error transport
//! - [`ErrorHandler`]: the top-level consumer deciding what to present
//!
//! ## Propagation
//! ```text
//! stage/ward returns Err(StageError)
//!   └─► ClassifiedError::classify(origin, err)     (boundary: unknown → is_bug = true)
//!         └─► ErrorSink::report(err, &token)        (races cancellation)
//!             or ErrorSink::try_report(err)         (steward: never waits, drops when full)
//!               └─► ErrorHandler::handle(&err)      (log + present)
//! ```
//! Cancellation never enters the channel.

mod channel;
mod classified;
mod handler;

pub(crate) use channel::{report_failure, report_failure_now};
pub use channel::{ErrorSink, ErrorStream, error_channel};
pub use classified::ClassifiedError;
pub use handler::ErrorHandler;
