use std::collections::HashMap;
use std::time::Duration;

use stagevisor::{
    CancelToken, Pipeline, Sequence, StageContext, StageError, StageFn, StageOptions, StageRef,
    error_channel, fan_in, fan_out, map,
};
use tokio::task::JoinSet;

fn forward<T: Send + 'static>(name: &'static str) -> StageRef<T, T> {
    StageFn::arc(name, |ctx: StageContext<T, T>| async move {
        while let Some(item) = ctx.recv().await {
            ctx.send(item).await?;
        }
        Ok::<(), StageError>(())
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fan_out_fan_in_round_trip_is_exact() {
    for (items, workers) in [(0usize, 1usize), (1, 4), (97, 3), (1000, 8)] {
        let root = CancelToken::new();
        let mut set = JoinSet::new();
        let input = Sequence::from_iter(&root, 0..items, 4);
        let outputs = fan_out(
            forward::<usize>("forward"),
            workers,
            &root,
            input,
            &StageOptions::new(),
            4,
            &mut set,
        );
        let merged = fan_in(&root, outputs, 4, &mut set).collect(&root).await;

        let mut counts: HashMap<usize, usize> = HashMap::new();
        for n in merged {
            *counts.entry(n).or_default() += 1;
        }
        assert_eq!(counts.len(), items, "items={items} workers={workers}");
        assert!(counts.values().all(|c| *c == 1), "duplicate delivery");
        while set.join_next().await.is_some() {}
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn root_cancel_stops_depth_five_pipeline_without_leaks() {
    let root = CancelToken::new();
    let (sink, mut errors) = error_channel(16);

    let slow: StageRef<u64, u64> = StageFn::arc("slow", |ctx: StageContext<u64, u64>| async move {
        while let Some(n) = ctx.recv().await {
            tokio::select! {
                _ = ctx.token().cancelled() => return Err(StageError::Canceled),
                _ = tokio::time::sleep(Duration::from_millis(5)) => {}
            }
            ctx.send(n).await?;
        }
        Ok::<(), StageError>(())
    });

    let mut pipeline = Pipeline::from_iter(&root, 0u64..)
        .errors(sink)
        .buffer(4)
        .then(map("double", |n: u64| async move { Ok::<u64, StageError>(n * 2) }))
        .fan_out(slow, 4)
        .then(forward("relay"))
        .then(map("inc", |n: u64| async move { Ok::<u64, StageError>(n + 1) }))
        .then(forward("sink"));

    for _ in 0..20 {
        assert!(pipeline.next().await.is_some());
    }
    assert!(pipeline.active() > 0);

    root.cancel();
    tokio::time::timeout(Duration::from_secs(2), pipeline.join())
        .await
        .expect("every activity stops after root cancel");
    assert_eq!(pipeline.active(), 0);
    assert_eq!(pipeline.next().await, None);

    // Cancellation is a control signal, never a reported failure.
    assert!(errors.try_next().is_none());
}

#[tokio::test]
async fn all_worker_outputs_close_on_cancel() {
    let root = CancelToken::new();
    let mut set = JoinSet::new();
    let input = Sequence::from_iter(&root, std::iter::repeat(1u8), 1);
    let outputs = fan_out(
        forward::<u8>("worker"),
        4,
        &root,
        input,
        &StageOptions::new(),
        1,
        &mut set,
    );

    root.cancel();
    tokio::time::timeout(Duration::from_secs(1), async {
        while set.join_next().await.is_some() {}
    })
    .await
    .expect("workers stop");

    let drain = CancelToken::new();
    for out in outputs {
        // A buffered item may remain; after it the sequence is exhausted.
        let rest = out.collect(&drain).await;
        assert!(rest.len() <= 1);
    }
}

#[tokio::test]
async fn stage_failure_precedes_exhaustion_across_fan_in() {
    let root = CancelToken::new();
    let (sink, mut errors) = error_channel(8);
    let out = Pipeline::from_iter(&root, 0u32..40)
        .errors(sink)
        .fan_out(
            map("checked", |n: u32| async move {
                if n == 13 {
                    Err(StageError::fatal("unlucky input"))
                } else {
                    Ok(n)
                }
            }),
            4,
        )
        .collect()
        .await;

    assert!(!out.contains(&13));
    let err = errors.try_next().expect("fatal error enqueued before merged exhaustion");
    assert!(err.is_bug());
    assert_eq!(err.origin(), "checked");
}
