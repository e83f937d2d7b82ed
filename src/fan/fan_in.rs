//! # Fan-in: merge several sequences into one.
//!
//! One forwarding activity per source copies items into a shared destination while
//! observing the token. Each forwarder owns a producer clone, so the destination
//! closes exactly when the last forwarder finishes: all sources exhausted, or the
//! token fired.

use tokio::task::JoinSet;

use crate::{
    cancel::CancelToken,
    pipeline::{Sequence, sequence},
};

/// Merges `sources` into one sequence.
///
/// Forwarders are spawned on `set`. With no sources the result is already exhausted.
///
/// Must be called within a tokio runtime.
pub fn fan_in<T>(
    token: &CancelToken,
    sources: Vec<Sequence<T>>,
    capacity: usize,
    set: &mut JoinSet<()>,
) -> Sequence<T>
where
    T: Send + 'static,
{
    let (tx, merged) = sequence(capacity);
    for source in sources {
        let tx = tx.clone();
        let token = token.clone();
        set.spawn(async move {
            while let Some(item) = source.next(&token).await {
                if tx.send(item, &token).await.is_err() {
                    break;
                }
            }
        });
    }
    merged
}
