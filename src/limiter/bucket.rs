//! # Token bucket.
//!
//! [`TokenBucket`] holds up to `capacity` tokens (the burst size) and refills
//! continuously at `rate` tokens per second. [`Limiter::acquire`] takes one token,
//! waiting (cancellably) for the refill when the bucket is empty.
//!
//! ```text
//!   acquire(&token)
//!     loop {
//!       lock ─► refill(now) ─► tokens >= 1 ? take, return Ok
//!                                  │
//!                                  └─ wait = (1 - tokens) / rate
//!       select { sleep(wait) ─► retry ; token.cancelled() ─► Err(token.cause()) }
//!     }
//! ```
//!
//! ## Rules
//! - The bucket starts full.
//! - State is mutated only inside `acquire`/`try_acquire`, under the bucket's lock;
//!   the lock is never held across a wait.
//! - `acquire` never fails for lack of capacity alone; it fails only on cancellation.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};

use super::Limiter;
use crate::{cancel::CancelToken, error::StageError};

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last: Instant,
}

/// Rate limiter with burst capacity and continuous refill.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use stagevisor::{CancelToken, Limiter, TokenBucket};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), stagevisor::StageError> {
/// // 2 requests burst, one new request every 100ms.
/// let bucket = TokenBucket::every(Duration::from_millis(100), 2);
/// let token = CancelToken::new();
/// bucket.acquire(&token).await?;
/// bucket.acquire(&token).await?;
/// assert!(!bucket.try_acquire().await);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Creates a full bucket holding `capacity` tokens, refilling `rate` tokens/second.
    ///
    /// - `capacity` is clamped to a minimum of 1.
    /// - A non-positive or non-finite `rate` disables refill.
    pub fn new(capacity: u32, rate: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        let rate = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            0.0
        };
        Self {
            capacity,
            rate,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last: Instant::now(),
            }),
        }
    }

    /// Creates a bucket refilling one token every `interval`.
    pub fn every(interval: Duration, capacity: u32) -> Self {
        let interval = interval.max(Duration::from_nanos(1));
        Self::new(capacity, 1.0 / interval.as_secs_f64())
    }

    /// Burst size.
    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    /// Takes one token if available, without waiting.
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole tokens currently available.
    pub async fn available(&self) -> u32 {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());
        state.tokens.floor() as u32
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.last = now;
    }

    /// Takes a token, or returns how long until one is due (`None` = never).
    async fn take_or_wait(&self) -> Result<(), Option<Duration>> {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(());
        }
        if self.rate == 0.0 {
            return Err(None);
        }
        let missing = 1.0 - state.tokens;
        Err(Some(Duration::from_secs_f64(missing / self.rate)))
    }
}

#[async_trait]
impl Limiter for TokenBucket {
    async fn acquire(&self, token: &CancelToken) -> Result<(), StageError> {
        loop {
            if token.is_cancelled() {
                return Err(token.cause());
            }
            match self.take_or_wait().await {
                Ok(()) => return Ok(()),
                Err(Some(wait)) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(token.cause()),
                        _ = time::sleep(wait) => {}
                    }
                }
                Err(None) => {
                    token.cancelled().await;
                    return Err(token.cause());
                }
            }
        }
    }

    fn rate(&self) -> f64 {
        self.rate
    }
}
