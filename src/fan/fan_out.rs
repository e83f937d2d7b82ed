//! # Fan-out: replicate a stage across workers.

use tokio::task::JoinSet;

use crate::{
    cancel::CancelToken,
    pipeline::{Sequence, StageOptions, StageRef, spawn_stage},
};

/// Launches `workers` copies of `stage` (at least one), all reading `input`.
///
/// Every worker gets the same options, so a limiter attached here is shared by all of
/// them and a heartbeat pulses whenever any worker is alive. Returns one output
/// sequence per worker, in launch order.
///
/// Must be called within a tokio runtime.
pub fn fan_out<In, Out>(
    stage: StageRef<In, Out>,
    workers: usize,
    token: &CancelToken,
    input: Sequence<In>,
    options: &StageOptions,
    capacity: usize,
    set: &mut JoinSet<()>,
) -> Vec<Sequence<Out>>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    let workers = workers.max(1);
    tracing::debug!(stage = %stage.name(), workers, "fanning out");
    (0..workers)
        .map(|_| spawn_stage(stage.clone(), token, input.clone(), options, capacity, set))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::pipeline::{StageContext, StageFn};
    use std::collections::HashSet;

    #[tokio::test]
    async fn each_item_goes_to_exactly_one_worker() {
        let token = CancelToken::new();
        let mut set = JoinSet::new();
        let forward: StageRef<u32, u32> =
            StageFn::arc("forward", |ctx: StageContext<u32, u32>| async move {
                while let Some(n) = ctx.recv().await {
                    tokio::task::yield_now().await;
                    ctx.send(n).await?;
                }
                Ok::<(), StageError>(())
            });
        let input = Sequence::from_iter(&token, 0..200, 8);
        let outputs = fan_out(forward, 4, &token, input, &StageOptions::new(), 8, &mut set);
        assert_eq!(outputs.len(), 4);

        let collectors: Vec<_> = outputs
            .into_iter()
            .map(|out| {
                let token = token.clone();
                tokio::spawn(async move { out.collect(&token).await })
            })
            .collect();

        let mut seen = HashSet::new();
        for collector in collectors {
            for n in collector.await.expect("collector") {
                assert!(seen.insert(n), "item {n} delivered twice");
            }
        }
        assert_eq!(seen.len(), 200);
    }

    #[tokio::test]
    async fn zero_workers_is_clamped_to_one() {
        let token = CancelToken::new();
        let mut set = JoinSet::new();
        let id = crate::pipeline::map("id", |n: u8| async move { Ok::<u8, StageError>(n) });
        let input = Sequence::from_iter(&token, [1u8, 2], 1);
        let outputs = fan_out(id, 0, &token, input, &StageOptions::new(), 1, &mut set);
        assert_eq!(outputs.len(), 1);
    }
}
