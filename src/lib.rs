//! # stagevisor
//!
//! **Stagevisor** is a small runtime for cancellable concurrent pipelines on tokio.
//!
//! It provides primitives to chain stages over bounded sequences, replicate a stage
//! across workers, rate-limit work with token buckets, and supervise long-running
//! wards that are restarted when their heartbeat stops. One cancel token threads
//! through every activity, so a whole pipeline stops as a unit.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                           root CancelToken
//!                                  │ child
//! ┌────────────────────────────────┼──────────────────────────────────┐
//! │  Pipeline (JoinSet of every activity)                             │
//! │                                                                   │
//! │  source ──► [stage] ──► fan_out ─┬─► [worker 1] ─┐                │
//! │                                  ├─► [worker 2] ─┼─► fan_in ──► … │
//! │                                  └─► [worker N] ─┘                │
//! │                 │                      │                          │
//! │           Limiter::acquire       Heartbeat pulses                 │
//! └─────────────────┼──────────────────────┼──────────────────────────┘
//!                   │                      ▼
//!                   │               ┌──────────────┐   own pulses
//!                   │               │   Steward    │ ─────────────►
//!                   │               │ (restarts)   │
//!                   │               └──────┬───────┘
//!                   ▼                      ▼
//!          ┌────────────────────────────────────────┐
//!          │ ErrorSink ──► ErrorStream ──► ErrorHandler (log + user message)
//!          └────────────────────────────────────────┘
//! ```
//!
//! ### Stage lifecycle
//! ```text
//! spawn_stage(stage, token, input)
//!   ├─► stage.run(ctx)  loop { recv ─► acquire ─► work ─► send }
//!   ├─► input exhausted or token fired ─► Ok / Canceled ─► quiet exit
//!   ├─► Err / panic ─► ClassifiedError ─► ErrorSink
//!   └─► output closes (after the error, if any, is enqueued)
//! ```
//!
//! ## Features
//! | Area             | Description                                                  | Key types / functions                         |
//! |------------------|--------------------------------------------------------------|-----------------------------------------------|
//! | **Cancellation** | One-shot tokens, OR-combinator tree, timeouts, OS signals     | [`CancelToken`], [`shutdown_token`]           |
//! | **Pipelines**    | Bounded sequences, stages, composition                        | [`Sequence`], [`Stage`], [`Pipeline`]         |
//! | **Fan-out/in**   | Replicate a stage, merge outputs                              | [`fan_out`], [`fan_in`]                       |
//! | **Rate limits**  | Token buckets and tiered limiters                             | [`TokenBucket`], [`MultiLimiter`]             |
//! | **Heartbeats**   | Best-effort liveness pulses                                   | [`Heartbeat`], [`HeartbeatMode`]              |
//! | **Supervision**  | Restart wards that stop pulsing                               | [`Steward`], [`Ward`], [`WardFn`]             |
//! | **Errors**       | Typed errors, bug/operational classification, error channel   | [`StageError`], [`ClassifiedError`]           |
//! | **Configuration**| Centralized defaults                                          | [`Config`], [`StewardConfig`]                 |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use stagevisor::{CancelToken, Pipeline, StageError, StageOptions, TokenBucket, map};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let root = CancelToken::new();
//!     let limiter = Arc::new(TokenBucket::new(100, 1_000.0));
//!
//!     let squares = Pipeline::from_iter(&root, 1..=8u64)
//!         .fan_out_with(
//!             map("square", |n: u64| async move { Ok::<u64, StageError>(n * n) }),
//!             4,
//!             StageOptions::new().limiter(limiter),
//!         )
//!         .collect()
//!         .await;
//!
//!     assert_eq!(squares.iter().sum::<u64>(), 204);
//! }
//! ```
mod cancel;
mod config;
mod error;
mod fan;
mod fault;
mod heartbeat;
mod limiter;
mod pipeline;
mod policies;
mod steward;

// ---- Public re-exports ----

pub use cancel::{CancelToken, OR_FAN_IN, shutdown_token};
pub use config::Config;
pub use error::{RuntimeError, StageError};
pub use fan::{fan_in, fan_out};
pub use fault::{ClassifiedError, ErrorHandler, ErrorSink, ErrorStream, error_channel};
pub use heartbeat::{HeartbeatMode, Heartbeat, Pulse, Pulses, emit_every, heartbeat};
pub use limiter::{Limiter, MultiLimiter, TokenBucket};
pub use pipeline::{
    BoxStageFuture, Pipeline, Producer, Sequence, Stage, StageContext, StageFn, StageOptions,
    StageRef, bridge, filter, map, sequence, spawn_stage,
};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use steward::{
    BoxWardFuture, Steward, StewardConfig, StewardHandle, Ward, WardContext, WardFn, WardRef,
    WardState,
};
