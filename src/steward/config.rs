//! # Steward settings.

use std::time::Duration;

use crate::{config::Config, policies::BackoffPolicy};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Settings for one [`Steward`](crate::Steward).
///
/// - `timeout`: longest allowed gap between two ward pulses (or start and first pulse)
/// - `pulse_interval`: period of the steward's own heartbeat (`0s` = `timeout / 2`)
/// - `backoff`: delay before each restart, indexed by restarts so far
#[derive(Clone, Copy, Debug)]
pub struct StewardConfig {
    /// Heartbeat deadline for the ward.
    pub timeout: Duration,
    /// Period of the steward's own heartbeat.
    pub pulse_interval: Duration,
    /// Restart backoff.
    pub backoff: BackoffPolicy,
}

impl StewardConfig {
    /// Restarts immediately after `timeout` without a pulse; pulses every `timeout / 2`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pulse_interval: Duration::ZERO,
            backoff: BackoffPolicy::immediate(),
        }
    }

    /// Same config with `backoff` between generations.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Same config with an explicit steward heartbeat period.
    pub fn with_pulse_interval(mut self, period: Duration) -> Self {
        self.pulse_interval = period;
        self
    }

    /// Heartbeat deadline clamped to a minimum of 1ms.
    #[inline]
    pub fn deadline(&self) -> Duration {
        self.timeout.max(MIN_PERIOD)
    }

    /// Pulse period suggested to wards: half the deadline.
    #[inline]
    pub fn ward_pulse(&self) -> Duration {
        (self.deadline() / 2).max(MIN_PERIOD)
    }

    /// Steward heartbeat period with the `0s` sentinel resolved.
    #[inline]
    pub fn own_pulse(&self) -> Duration {
        if self.pulse_interval == Duration::ZERO {
            self.ward_pulse()
        } else {
            self.pulse_interval.max(MIN_PERIOD)
        }
    }
}

impl Default for StewardConfig {
    fn default() -> Self {
        Config::default().steward()
    }
}
