//! # Tiered limiter.
//!
//! [`MultiLimiter`] composes several limiters (e.g. per-second and per-minute tiers).
//! `acquire` takes a token from every tier, most restrictive (smallest rate) first,
//! and stops at the first failure. Tokens already taken from earlier tiers are not
//! refunded.

use std::sync::Arc;

use async_trait::async_trait;

use super::Limiter;
use crate::{cancel::CancelToken, error::StageError};

/// Limiter acquiring from each tier in ascending order of rate.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use stagevisor::{Limiter, MultiLimiter, TokenBucket};
///
/// let per_second: Arc<dyn Limiter> = Arc::new(TokenBucket::every(Duration::from_millis(500), 2));
/// let per_minute: Arc<dyn Limiter> = Arc::new(TokenBucket::every(Duration::from_secs(60), 10));
/// let api = MultiLimiter::new(vec![per_second, per_minute]);
/// assert_eq!(api.rate(), 1.0 / 60.0);
/// ```
pub struct MultiLimiter {
    tiers: Vec<Arc<dyn Limiter>>,
}

impl MultiLimiter {
    /// Creates a limiter over `tiers`, sorted by ascending rate.
    pub fn new(mut tiers: Vec<Arc<dyn Limiter>>) -> Self {
        tiers.sort_by(|a, b| a.rate().total_cmp(&b.rate()));
        Self { tiers }
    }

    /// Number of tiers.
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// True if there are no tiers (acquire always succeeds unless cancelled).
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

#[async_trait]
impl Limiter for MultiLimiter {
    async fn acquire(&self, token: &CancelToken) -> Result<(), StageError> {
        if token.is_cancelled() {
            return Err(token.cause());
        }
        for tier in &self.tiers {
            tier.acquire(token).await?;
        }
        Ok(())
    }

    /// The most restrictive tier's rate (`+inf` with no tiers).
    fn rate(&self) -> f64 {
        self.tiers.first().map_or(f64::INFINITY, |t| t.rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::TokenBucket;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    struct Recording {
        rate: f64,
        log: Arc<Mutex<Vec<u32>>>,
    }

    #[async_trait]
    impl Limiter for Recording {
        async fn acquire(&self, _token: &CancelToken) -> Result<(), StageError> {
            self.log
                .lock()
                .expect("log lock")
                .push(self.rate as u32);
            Ok(())
        }
        fn rate(&self) -> f64 {
            self.rate
        }
    }

    #[tokio::test]
    async fn tiers_are_acquired_smallest_rate_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tier = |rate: f64| -> Arc<dyn Limiter> {
            Arc::new(Recording {
                rate,
                log: log.clone(),
            })
        };
        let multi = MultiLimiter::new(vec![tier(50.0), tier(1.0), tier(10.0)]);
        multi.acquire(&CancelToken::new()).await.expect("acquired");
        assert_eq!(*log.lock().expect("log lock"), vec![1, 10, 50]);
    }

    #[tokio::test(start_paused = true)]
    async fn slowest_tier_dominates() {
        let fast: Arc<dyn Limiter> = Arc::new(TokenBucket::every(Duration::from_millis(10), 5));
        let slow: Arc<dyn Limiter> = Arc::new(TokenBucket::every(Duration::from_secs(1), 2));
        let multi = MultiLimiter::new(vec![fast, slow]);
        let token = CancelToken::new();
        let start = Instant::now();
        for _ in 0..3 {
            multi.acquire(&token).await.expect("acquired");
        }
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_short_circuits_without_refund() {
        // `strict` never refills and is acquired first; `loose` runs dry afterwards.
        let strict = Arc::new(TokenBucket::new(5, 0.0));
        let loose = Arc::new(TokenBucket::new(1, 0.001));
        let multi = MultiLimiter::new(vec![
            loose.clone() as Arc<dyn Limiter>,
            strict.clone() as Arc<dyn Limiter>,
        ]);
        let root = CancelToken::new();
        multi.acquire(&root).await.expect("first acquire");

        let deadline = root.with_timeout(Duration::from_millis(20));
        let res = multi.acquire(&deadline).await;
        assert!(matches!(res, Err(StageError::Timeout { .. })));
        assert_eq!(strict.available().await, 3);
        assert_eq!(loose.available().await, 0);
    }
}
