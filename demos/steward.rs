//! # Demo: steward
//!
//! Supervises a ward that hangs on every third generation. The steward notices the
//! missing heartbeat, abandons the hung generation and starts a new one; the consumer
//! reads one continuous sequence through [`bridge`].
//!
//! ## Flow
//! ```text
//! Steward::spawn(root)
//!   ├─► gen 1 ─► 0 1 2 3 … (pulse per item)
//!   ├─► gen 2 ─► … 
//!   ├─► gen 3 ─► hangs ─► deadline ─► MissedHeartbeat ─► ErrorSink
//!   ├─► gen 4 ─► …
//!   └─► root cancelled (Ctrl-C or 3s) ─► Stopped
//!
//! outer: Sequence<Sequence<u64>> ──► bridge ──► consumer
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example steward
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use stagevisor::{
    BackoffPolicy, CancelToken, ErrorHandler, JitterPolicy, StageError, Steward, StewardConfig,
    WardContext, WardFn, WardRef, bridge, error_channel, sequence, shutdown_token,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let root = shutdown_token()?;
    let deadline = root.with_timeout(Duration::from_secs(3));

    let (sink, mut errors) = error_channel(16);
    let (generations, outer) = sequence(4);
    let cursor = Arc::new(AtomicU64::new(0));

    let ward: WardRef = WardFn::arc("counter", move |ctx: WardContext| {
        let generations = generations.clone();
        let cursor = Arc::clone(&cursor);
        async move {
            let (tx, out) = sequence(8);
            generations.send(out, ctx.token()).await?;

            if ctx.generation() % 3 == 0 {
                println!("[counter] gen {} hangs", ctx.generation());
                ctx.token().cancelled().await;
                return Err(StageError::Canceled);
            }
            loop {
                let n = cursor.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(Duration::from_millis(40)).await;
                tx.send(n, ctx.token()).await?;
                ctx.pulse();
                if n % 10 == 9 {
                    return Err(StageError::fail(format!("flushed batch ending at {n}")));
                }
            }
        }
    });

    let cfg = StewardConfig::new(Duration::from_millis(200)).with_backoff(BackoffPolicy {
        first: Duration::from_millis(50),
        max: Duration::from_millis(400),
        factor: 2.0,
        jitter: JitterPolicy::Equal,
    });
    let mut handle = Steward::new(ward, cfg).errors(sink).spawn(&deadline);

    let items = bridge(&deadline, outer, 16);
    let watcher = CancelToken::new();
    let handler = ErrorHandler::default();
    loop {
        tokio::select! {
            item = items.next(&deadline) => match item {
                Some(n) => println!("[main] item {n}"),
                None => break,
            },
            Some(err) = errors.next(&deadline) => {
                println!("[main] {}", handler.handle(&err));
            }
            Some(_) = handle.pulses().next(&watcher) => {}
        }
    }

    println!(
        "[main] stopped after {} generations, {} restarts",
        handle.generation(),
        handle.restarts()
    );
    handle.join().await;
    Ok(())
}
