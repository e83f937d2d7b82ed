//! Rate limiting.
//!
//! ## Contents
//! - [`Limiter`]: async, cancellable permission gate
//! - [`TokenBucket`]: burst capacity with continuous refill
//! - [`MultiLimiter`]: tiers acquired most-restrictive first, without refunds
//!
//! Stages use a limiter through [`StageOptions::limiter`](crate::StageOptions::limiter)
//! and [`StageContext::acquire`](crate::StageContext::acquire); external callers can
//! call [`Limiter::acquire`] directly.

mod bucket;
mod multi;

use async_trait::async_trait;

use crate::{cancel::CancelToken, error::StageError};

pub use bucket::TokenBucket;
pub use multi::MultiLimiter;

/// Gate that callers acquire permission from before proceeding.
#[async_trait]
pub trait Limiter: Send + Sync + 'static {
    /// Waits until permission is granted.
    ///
    /// Fails only with [`CancelToken::cause`] when `token` fires while waiting
    /// (or with whatever error an inner limiter reports).
    async fn acquire(&self, token: &CancelToken) -> Result<(), StageError>;

    /// Sustained rate in permits per second; smaller means more restrictive.
    fn rate(&self) -> f64;
}
