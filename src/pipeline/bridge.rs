//! # Bridge: flatten a sequence of sequences.
//!
//! A restarted ward produces a fresh output sequence per generation. Publishing each
//! generation's sequence on an outer sequence and reading through [`bridge`] gives the
//! consumer one continuous sequence across restarts.
//!
//! ```text
//!   outer: [ seq#1 ] [ seq#2 ] [ seq#3 ] ...
//!              │         │         │
//!              ▼         ▼         ▼
//!   bridge:  a b c ─►  d e  ─►  f g h ─► (closes when outer closes or token fires)
//! ```
//!
//! Each inner sequence is drained before the next one is taken. An inner sequence that
//! is never closed blocks the bridge until cancellation, so generations must close
//! their output when their token fires.

use super::sequence::{Sequence, sequence};
use crate::cancel::CancelToken;

/// Spawns a forwarding activity flattening `outer` into one sequence.
///
/// Must be called within a tokio runtime.
pub fn bridge<T>(token: &CancelToken, outer: Sequence<Sequence<T>>, capacity: usize) -> Sequence<T>
where
    T: Send + 'static,
{
    let (tx, out) = sequence(capacity);
    let token = token.clone();
    tokio::spawn(async move {
        while let Some(inner) = outer.next(&token).await {
            while let Some(item) = inner.next(&token).await {
                if tx.send(item, &token).await.is_err() {
                    return;
                }
            }
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flattens_in_generation_order() {
        let token = CancelToken::new();
        let (gens, outer) = sequence(2);
        let out = bridge(&token, outer, 4);

        gens.send(Sequence::from_iter(&token, [1, 2], 1), &token)
            .await
            .expect("gen 1");
        gens.send(Sequence::from_iter(&token, [3], 1), &token)
            .await
            .expect("gen 2");
        gens.send(Sequence::from_iter(&token, [4, 5], 1), &token)
            .await
            .expect("gen 3");
        drop(gens);

        assert_eq!(out.collect(&token).await, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn closes_on_cancel() {
        let token = CancelToken::new();
        let (_gens, outer) = sequence::<Sequence<u8>>(1);
        let out = bridge(&token, outer, 1);
        token.cancel();
        assert_eq!(out.next(&CancelToken::new()).await, None);
    }
}
