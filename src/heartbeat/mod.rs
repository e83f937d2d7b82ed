//! Heartbeats: liveness pulses distinct from data output.
//!
//! ## Contents
//! - [`heartbeat`], [`Heartbeat`], [`Pulses`], [`Pulse`]: the single-slot pulse channel
//! - [`HeartbeatMode`]: interval-based or work-start-based emission
//! - [`emit_every`]: interval emitter bound to a [`CancelToken`](crate::CancelToken)
//!
//! Pulses and output values may interleave; consumers observe the two channels together.

mod emitter;
mod pulse;

pub(crate) use emitter::pulse_every;
pub use emitter::{HeartbeatMode, emit_every};
pub use pulse::{Heartbeat, Pulse, Pulses, heartbeat};
