use std::sync::{Arc, Mutex};
use std::time::Duration;

use stagevisor::{
    CancelToken, Config, Producer, Sequence, StageError, Steward, StewardConfig, WardContext,
    WardFn, WardRef, WardState, bridge, sequence,
};
use tokio::time::{self, Instant};

const ITEMS: [u32; 5] = [1, 2, 3, 4, 5];

/// Processes `ITEMS`, pulsing per item. Generation 1 stalls after `stall_after` items.
fn worker(
    stall_after: usize,
    generations: Producer<Sequence<u32>>,
    starts: Arc<Mutex<Vec<Instant>>>,
) -> WardRef {
    WardFn::arc("worker", move |ctx: WardContext| {
        let generations = generations.clone();
        let starts = Arc::clone(&starts);
        async move {
            starts.lock().unwrap().push(Instant::now());
            let (tx, out) = sequence(ITEMS.len());
            generations.send(out, ctx.token()).await?;

            for (i, item) in ITEMS.into_iter().enumerate() {
                if ctx.generation() == 1 && i == stall_after {
                    ctx.token().cancelled().await;
                    return Err(StageError::Canceled);
                }
                time::sleep(Duration::from_millis(10)).await;
                tx.send(item, ctx.token()).await?;
                ctx.pulse();
            }
            Ok(())
        }
    })
}

#[tokio::test(start_paused = true)]
async fn stalled_ward_is_restarted_within_timeout() {
    let root = CancelToken::new();
    let (generations, outer) = sequence(4);
    let starts = Arc::new(Mutex::new(Vec::new()));
    let timeout = Duration::from_millis(100);

    let handle = Steward::new(
        worker(3, generations, Arc::clone(&starts)),
        StewardConfig::new(timeout),
    )
    .spawn(&root);
    let _delivered = bridge(&root, outer, 8);

    let mut state = handle.watch_state();
    let _ = state.wait_for(|s| s.is_terminal()).await;
    assert_eq!(*state.borrow(), WardState::Stopped);
    assert_eq!(handle.restarts(), 1);
    handle.join().await;

    let starts = starts.lock().unwrap();
    assert_eq!(starts.len(), 2);
    let gap = starts[1] - starts[0];
    // Third pulse lands at 30ms; the deadline is one timeout later.
    assert!(gap >= Duration::from_millis(130), "gap {gap:?}");
    assert!(gap <= Duration::from_millis(130) + Duration::from_millis(5), "gap {gap:?}");
}

#[tokio::test(start_paused = true)]
async fn restart_redelivers_but_never_drops() {
    let root = CancelToken::new();
    let (generations, outer) = sequence(4);
    let starts = Arc::new(Mutex::new(Vec::new()));

    let handle = Steward::new(
        worker(2, generations, starts),
        StewardConfig::new(Duration::from_millis(50)),
    )
    .spawn(&root);
    let delivered = bridge(&root, outer, 8).collect(&root).await;
    handle.join().await;

    let mut sorted = delivered.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted, ITEMS.to_vec());
    assert_eq!(delivered, vec![1, 2, 1, 2, 3, 4, 5]);
}

#[tokio::test(start_paused = true)]
async fn parent_cancel_stops_without_restart() {
    let root = CancelToken::new();
    let cfg = Config {
        ward_timeout: Duration::from_millis(200),
        ..Config::default()
    };
    let ward = WardFn::arc("idle", |ctx: WardContext| async move {
        let _pulses = ctx.emit_pulses();
        ctx.token().cancelled().await;
        Err::<(), _>(StageError::Canceled)
    });
    let mut handle = Steward::new(ward, cfg.steward()).spawn(&root);

    time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.state(), WardState::Running);

    // Steward pulses every ward_timeout / 2 regardless of the ward.
    let watcher = CancelToken::new();
    let _stale = handle.pulses().try_next();
    let first = handle.pulses().next(&watcher).await.expect("pulse");
    let second = handle.pulses().next(&watcher).await.expect("pulse");
    assert_eq!(second.at - first.at, Duration::from_millis(100));

    root.cancel();
    let restarts = handle.restarts();
    handle.join().await;
    assert_eq!(restarts, 0);
}
