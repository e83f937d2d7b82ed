//! Stages, sequences and pipeline composition.
//!
//! ```text
//!   source ──► [stage A] ──► seq ──► [stage B] ──► seq ──► consumer
//!                 │                      │
//!                 └──── CancelToken ─────┘   (one token per pipeline)
//! ```
//!
//! - [`sequence`] / [`Sequence`] / [`Producer`]: bounded cancellable channels.
//! - [`Stage`] + [`spawn_stage`]: one concurrent activity per stage.
//! - [`StageFn`], [`map`], [`filter`]: closure-backed stages.
//! - [`Pipeline`]: chains stages and owns their activities.
//! - [`bridge`]: flattens a sequence of sequences.

mod bridge;
mod compose;
mod sequence;
mod stage;
mod stage_fn;

pub use bridge::bridge;
pub use compose::Pipeline;
pub use sequence::{Producer, Sequence, sequence};
pub use stage::{BoxStageFuture, Stage, StageContext, StageOptions, StageRef, spawn_stage};
pub use stage_fn::{StageFn, filter, map};
