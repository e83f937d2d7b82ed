//! # CancelToken: one-shot, broadcastable cancellation.
//!
//! A [`CancelToken`] starts "not cancelled" and transitions exactly once to
//! "cancelled". Any number of clones observe the same state; cancelling any clone
//! releases every activity awaiting [`CancelToken::cancelled`] on it or on any token
//! derived from it.
//!
//! ## Derivation
//! ```text
//!   child_token()         any([a, b, c, ...])            with_timeout(d)
//!
//!      parent               a   b   c   d   e   f          self   timer(d)
//!        │                  └─┬─┴─┬─┘   └─┬─┴─┘              └──┬──┘
//!        ▼                    node        node                  ▼
//!      child                    └─────┬─────┘                derived
//!                                     ▼
//!                                  derived
//! ```
//!
//! ## Rules
//! - `cancel()` is idempotent; repeated calls are no-ops.
//! - A derived token is cancelled iff its own latch fired or any constituent is cancelled.
//! - Cancelling a derived token never affects its constituents.
//! - OR nodes hold at most [`OR_FAN_IN`] constituents, so `any(n tokens)` has depth
//!   `ceil(log4 n)` and spawns no background activity.
//! - Once a node observes a cancelled constituent it latches itself, so later checks are O(1).
//! - A timer that elapsed is remembered: [`CancelToken::cause`] turns it into
//!   [`StageError::Timeout`] for every token derived from it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use tokio_util::sync::CancellationToken;

use crate::error::StageError;

/// Maximum number of constituents per OR node.
pub const OR_FAN_IN: usize = 4;

/// One-shot, cloneable cancellation signal.
///
/// ## Example
/// ```rust
/// use stagevisor::CancelToken;
///
/// let a = CancelToken::new();
/// let b = CancelToken::new();
/// let either = a.or(&b);
///
/// assert!(!either.is_cancelled());
/// b.cancel();
/// assert!(either.is_cancelled());
/// assert!(!a.is_cancelled());
/// ```
#[derive(Clone)]
pub struct CancelToken {
    latch: CancellationToken,
    upstream: Arc<[CancelToken]>,
    expiry: Option<Arc<Expiry>>,
}

/// Timer state of a token built by [`CancelToken::timeout`].
struct Expiry {
    after: Duration,
    elapsed: AtomicBool,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::from_parts(CancellationToken::new(), Vec::new())
    }

    fn from_parts(latch: CancellationToken, upstream: Vec<CancelToken>) -> Self {
        Self {
            latch,
            upstream: upstream.into(),
            expiry: None,
        }
    }

    /// Returns a token cancelled when **any** of `tokens` is cancelled.
    ///
    /// With more than [`OR_FAN_IN`] tokens, constituents are grouped into
    /// intermediate nodes level by level until one node remains.
    /// An empty input yields a token that only fires when cancelled directly.
    pub fn any<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = CancelToken>,
    {
        let mut level: Vec<CancelToken> = tokens.into_iter().collect();
        while level.len() > OR_FAN_IN {
            level = level
                .chunks(OR_FAN_IN)
                .map(|group| Self::from_parts(CancellationToken::new(), group.to_vec()))
                .collect();
        }
        Self::from_parts(CancellationToken::new(), level)
    }

    /// Returns a token cancelled when either `self` or `other` is.
    pub fn or(&self, other: &CancelToken) -> Self {
        Self::any([self.clone(), other.clone()])
    }

    /// Returns a token that is cancelled with `self`, and may also be cancelled on its own.
    pub fn child_token(&self) -> Self {
        Self {
            latch: self.latch.child_token(),
            upstream: Arc::clone(&self.upstream),
            expiry: self.expiry.clone(),
        }
    }

    /// Returns a token that cancels itself after `timeout` elapses.
    ///
    /// Must be called within a tokio runtime.
    pub fn timeout(timeout: Duration) -> Self {
        let expiry = Arc::new(Expiry {
            after: timeout,
            elapsed: AtomicBool::new(false),
        });
        let mut timer = CancelToken::new();
        timer.expiry = Some(Arc::clone(&expiry));
        let fired = timer.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    // Recorded before the cancel so every waiter sees it.
                    expiry.elapsed.store(true, Ordering::Release);
                    fired.cancel();
                }
                _ = fired.cancelled() => {}
            }
        });
        timer
    }

    /// Returns a token cancelled with `self` or after `timeout`, whichever comes first.
    ///
    /// Must be called within a tokio runtime.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let timer = CancelToken::timeout(timeout);
        let derived = self.or(&timer);

        // Stop the timer early once the derived token fires for another reason.
        let watch = derived.clone();
        tokio::spawn(async move {
            watch.cancelled().await;
            timer.cancel();
        });
        derived
    }

    /// Transitions the token to cancelled. Idempotent.
    pub fn cancel(&self) {
        self.latch.cancel();
    }

    /// Non-blocking check.
    pub fn is_cancelled(&self) -> bool {
        if self.latch.is_cancelled() {
            return true;
        }
        if self.upstream.iter().any(CancelToken::is_cancelled) {
            self.latch.cancel();
            return true;
        }
        false
    }

    /// Completes once the token is cancelled; immediately if it already is.
    pub async fn cancelled(&self) {
        self.wait().await
    }

    fn wait(&self) -> BoxFuture<'_, ()> {
        async move {
            if self.upstream.is_empty() {
                return self.latch.cancelled().await;
            }
            let upstream = future::select_all(self.upstream.iter().map(CancelToken::wait));
            tokio::select! {
                _ = self.latch.cancelled() => {}
                _ = upstream => self.latch.cancel(),
            }
        }
        .boxed()
    }

    /// The timeout that elapsed on this token or one it derives from, if any.
    pub fn elapsed_timeout(&self) -> Option<Duration> {
        match &self.expiry {
            Some(expiry) if expiry.elapsed.load(Ordering::Acquire) => Some(expiry.after),
            _ => self.upstream.iter().find_map(CancelToken::elapsed_timeout),
        }
    }

    /// Error for a wait interrupted by this token.
    ///
    /// [`StageError::Timeout`] when an underlying timer elapsed, [`StageError::Canceled`]
    /// otherwise.
    pub fn cause(&self) -> StageError {
        match self.elapsed_timeout() {
            Some(timeout) => StageError::Timeout { timeout },
            None => StageError::Canceled,
        }
    }

    /// Depth of the combinator tree below this token (`0` for a plain token).
    pub fn depth(&self) -> usize {
        self.upstream
            .iter()
            .map(|t| t.depth() + 1)
            .max()
            .unwrap_or(0)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl From<CancellationToken> for CancelToken {
    fn from(latch: CancellationToken) -> Self {
        Self::from_parts(latch, Vec::new())
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("depth", &self.depth())
            .finish()
    }
}
