//! Restart delay policies.
//!
//! - [`BackoffPolicy`]: how long a steward waits before starting the next generation
//! - [`JitterPolicy`]: randomization on top of the computed delay
//!
//! ```text
//! StewardConfig { backoff } ──► Steward loop
//!     unhealthy ward ──► sleep(backoff.next(restarts)) ──► next generation
//! ```
//!
//! The steward default is [`BackoffPolicy::immediate`].

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
