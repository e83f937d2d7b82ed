//! Cancellation signal.
//!
//! This module provides the one-shot [`CancelToken`], its OR-combinator
//! ([`CancelToken::any`]), timeout-derived tokens, and a root token wired to OS
//! termination signals ([`shutdown_token`]).
//!
//! Every suspension point in the crate (sequence send/receive, limiter acquire,
//! heartbeat wait) selects against a `CancelToken`, with cancellation polled first.

mod signal;
mod token;

pub use signal::shutdown_token;
pub use token::{CancelToken, OR_FAN_IN};
