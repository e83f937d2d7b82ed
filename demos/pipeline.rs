//! # Demo: pipeline
//!
//! Parses raw lines, enriches them on four rate-limited workers and prints the
//! results. Malformed lines are reported through the error channel and presented by
//! [`ErrorHandler`]; Ctrl-C cancels everything through the root token.
//!
//! ## Flow
//! ```text
//! from_iter(lines)
//!   ├─► map("parse")               malformed → ErrorSink
//!   ├─► fan_out("enrich", 4)       TokenBucket(5 burst, 20/s) + MultiLimiter(daily cap)
//!   ├─► filter("positive")
//!   └─► collect()
//!
//! ErrorStream ──► ErrorHandler::drain ──► stderr
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example pipeline
//! ```

use std::{sync::Arc, time::Duration};

use stagevisor::{
    Config, ErrorHandler, Limiter, MultiLimiter, Pipeline, StageError, StageOptions, TokenBucket,
    error_channel, filter, map, shutdown_token,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 1. Root token: cancelled on SIGINT / SIGTERM.
    let root = shutdown_token()?;
    let cfg = Config::default();

    // 2. Error channel drained by the top-level handler.
    let (sink, stream) = error_channel(cfg.error_capacity_clamped());
    let drain = {
        let root = root.clone();
        tokio::spawn(async move {
            ErrorHandler::default()
                .drain(stream, &root, |msg| eprintln!("[error] {msg}"))
                .await
        })
    };

    // 3. Two limiter tiers: per second and per "day".
    let per_second: Arc<dyn Limiter> = Arc::new(TokenBucket::new(5, 20.0));
    let per_day: Arc<dyn Limiter> = Arc::new(TokenBucket::every(Duration::from_secs(86_400), 1_000));
    let limiter = Arc::new(MultiLimiter::new(vec![per_second, per_day]));

    let lines = ["3", "-1", "7", "x", "12", "5", "oops", "8", "-4", "21"];

    // 4. Assemble and run.
    let results = Pipeline::from_iter(&root, lines.map(String::from))
        .with_config(&cfg)
        .errors(sink)
        .then(map("parse", |line: String| async move {
            line.trim()
                .parse::<i64>()
                .map_err(|e| StageError::fail(format!("{line:?}: {e}")))
        }))
        .fan_out_with(
            map("enrich", |n: i64| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<(i64, i64), StageError>((n, n * n))
            }),
            4,
            StageOptions::new().limiter(limiter),
        )
        .then(filter("positive", |(n, _): &(i64, i64)| *n > 0))
        .collect()
        .await;

    for (n, square) in &results {
        println!("[main] {n}² = {square}");
    }

    // 5. Every sink clone is gone with the pipeline, so the drain ends on its own.
    let reported = drain.await?;
    println!("[main] {} results, {reported} errors", results.len());
    Ok(())
}
