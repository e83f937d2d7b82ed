//! # Ward abstraction.
//!
//! A [`Ward`] is a restartable unit of work supervised by a [`Steward`](crate::Steward).
//! Each generation receives a fresh [`WardContext`]: a token that fires when the
//! generation is abandoned or the parent stops, and a heartbeat the steward watches.
//!
//! Wards must pulse at least once per `timeout` (see [`WardContext::pulse_interval`]
//! for a safe period) and must stop promptly once their token fires. Work in flight
//! when a generation is abandoned may be delivered again by the next generation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::{
    cancel::CancelToken,
    error::StageError,
    heartbeat::{Heartbeat, emit_every},
};

/// Boxed future returned by [`Ward::start`].
pub type BoxWardFuture = Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + 'static>>;

/// Shared handle to a ward.
pub type WardRef = Arc<dyn Ward>;

/// # Restartable unit of supervised work.
///
/// `start` is invoked once per generation and must return a **fresh** future.
pub trait Ward: Send + Sync + 'static {
    /// Stable, human-readable name (used in logs and as error origin).
    fn name(&self) -> &str;

    /// Starts one generation.
    ///
    /// Returning `Ok(())` ends supervision; returning an error or panicking triggers
    /// a restart.
    fn start(&self, ctx: WardContext) -> BoxWardFuture;
}

/// Per-generation handles given to a ward.
#[derive(Clone, Debug)]
pub struct WardContext {
    token: CancelToken,
    heartbeat: Heartbeat,
    generation: u64,
    pulse_interval: Duration,
}

impl WardContext {
    pub(crate) fn new(
        token: CancelToken,
        heartbeat: Heartbeat,
        generation: u64,
        pulse_interval: Duration,
    ) -> Self {
        Self {
            token,
            heartbeat,
            generation,
            pulse_interval,
        }
    }

    /// Fires when this generation is abandoned or the parent stops.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Heartbeat watched by the steward.
    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    /// 1-based generation number.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pulse period that comfortably meets the steward's deadline.
    pub fn pulse_interval(&self) -> Duration {
        self.pulse_interval
    }

    /// Signals liveness. Never blocks.
    pub fn pulse(&self) -> bool {
        self.heartbeat.pulse()
    }

    /// Pulses on [`WardContext::pulse_interval`] until this generation's token fires.
    ///
    /// Proves the activity is scheduled, not that it makes progress.
    pub fn emit_pulses(&self) -> JoinHandle<()> {
        emit_every(
            self.heartbeat.clone(),
            self.pulse_interval,
            self.token.clone(),
        )
    }
}
