//! # Sequences: bounded, cancellable FIFO channels between stages.
//!
//! [`sequence`] returns a connected [`Producer`] / [`Sequence`] pair over a bounded
//! `tokio::sync::mpsc` channel. Both sides take a [`CancelToken`] on every wait and
//! poll it first, so cancellation wins races with pending sends and receives.
//!
//! ## Rules
//! - FIFO within one sequence.
//! - A sequence is exhausted once every producer is dropped and buffered items are read.
//! - Clones of a [`Sequence`] share one receiver: each item goes to exactly one reader,
//!   whichever asks first.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::{cancel::CancelToken, error::StageError};

/// Creates a bounded sequence (capacity clamped to a minimum of 1).
pub fn sequence<T>(capacity: usize) -> (Producer<T>, Sequence<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Producer { tx }, Sequence::from(rx))
}

/// Writing half of a sequence. Cheap to clone.
#[derive(Debug)]
pub struct Producer<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Producer<T> {
    /// Sends `item`, waiting for buffer space unless `token` fires first.
    ///
    /// # Errors
    /// - [`StageError::Canceled`] if the token fires first (the item is dropped), or
    ///   [`StageError::Timeout`] when it fired because a timer elapsed;
    /// - [`StageError::Closed`] if every reader has been dropped.
    pub async fn send(&self, item: T, token: &CancelToken) -> Result<(), StageError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(token.cause()),
            res = self.tx.send(item) => res.map_err(|_| StageError::Closed),
        }
    }

    /// True once every reader has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Reading half of a sequence.
#[derive(Debug)]
pub struct Sequence<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for Sequence<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T> From<mpsc::Receiver<T>> for Sequence<T> {
    fn from(rx: mpsc::Receiver<T>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

impl<T: Send + 'static> Sequence<T> {
    /// Generator source: a sequence yielding `items` until exhausted or cancelled.
    ///
    /// Must be called within a tokio runtime.
    pub fn from_iter<I>(token: &CancelToken, items: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let (tx, seq) = sequence(capacity);
        tokio::spawn(generate(tx, items.into_iter(), token.clone()));
        seq
    }
}

/// Feeds `items` into `tx` until exhausted, cancelled, or every reader is gone.
pub(crate) async fn generate<T, I>(tx: Producer<T>, items: I, token: CancelToken)
where
    I: Iterator<Item = T>,
{
    for item in items {
        if tx.send(item, &token).await.is_err() {
            break;
        }
    }
}

impl<T> Sequence<T> {
    /// Next item; `None` when the sequence is exhausted or `token` fires.
    pub async fn next(&self, token: &CancelToken) -> Option<T> {
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            item = async { self.rx.lock().await.recv().await } => item,
        }
    }

    /// Reads every remaining item until exhaustion or cancellation.
    pub async fn collect(self, token: &CancelToken) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(item) = self.next(token).await {
            out.push(item);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn fifo_until_producers_drop() {
        let token = CancelToken::new();
        let seq = Sequence::from_iter(&token, 1..=5, 2);
        assert_eq!(seq.collect(&token).await, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn clones_share_items_at_most_once() {
        let token = CancelToken::new();
        let seq = Sequence::from_iter(&token, 0..100, 4);
        let other = seq.clone();

        let a = tokio::spawn({
            let token = token.clone();
            async move { seq.collect(&token).await }
        });
        let b = tokio::spawn({
            let token = token.clone();
            async move { other.collect(&token).await }
        });
        let mut all = a.await.expect("a");
        all.extend(b.await.expect("b"));
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_send_yields_to_cancellation() {
        let (tx, _rx) = sequence::<u8>(1);
        let root = CancelToken::new();
        tx.send(1, &root).await.expect("buffered");

        let deadline = root.with_timeout(Duration::from_millis(10));
        let res = tx.send(2, &deadline).await;
        assert!(matches!(
            res,
            Err(StageError::Timeout { timeout }) if timeout == Duration::from_millis(10)
        ));

        let stop = root.child_token();
        stop.cancel();
        assert!(matches!(tx.send(3, &stop).await, Err(StageError::Canceled)));
    }

    #[tokio::test]
    async fn send_after_reader_drop_is_closed() {
        let (tx, rx) = sequence::<u8>(1);
        drop(rx);
        let res = tx.send(1, &CancelToken::new()).await;
        assert!(matches!(res, Err(StageError::Closed)));
    }

    #[tokio::test]
    async fn next_returns_none_on_cancel_even_with_buffered_items() {
        let (tx, rx) = sequence::<u8>(4);
        let token = CancelToken::new();
        tx.send(7, &token).await.expect("buffered");
        token.cancel();
        assert_eq!(rx.next(&token).await, None);
    }
}
