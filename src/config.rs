//! # Global runtime configuration.
//!
//! Provides [`Config`], centralized defaults for pipelines, the error channel and
//! stewards.
//!
//! Config is used in two ways:
//! 1. **Pipeline assembly**: [`Pipeline::with_config`](crate::Pipeline::with_config)
//! 2. **Steward defaults**: [`Config::steward`] → [`StewardConfig`]
//!
//! ## Sentinel values
//! - `buffer = 0` / `error_capacity = 0` → clamped to 1
//! - `steward_pulse = 0s` → half of `ward_timeout`

use std::time::Duration;

use crate::{policies::BackoffPolicy, steward::StewardConfig};

/// Global configuration.
///
/// ## Field semantics
/// - `buffer`: capacity of every sequence created by a pipeline (min 1)
/// - `error_capacity`: capacity of the error channel (min 1)
/// - `ward_timeout`: how long a steward waits for a ward pulse before restarting it
/// - `steward_pulse`: period of the steward's own heartbeat (`0s` = `ward_timeout / 2`)
/// - `restart_backoff`: delay between ward generations
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling sentinel
/// checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Sequence capacity between stages.
    pub buffer: usize,

    /// Error channel capacity.
    pub error_capacity: usize,

    /// Heartbeat deadline for supervised wards.
    pub ward_timeout: Duration,

    /// Period of the steward's own heartbeat.
    pub steward_pulse: Duration,

    /// Delay before restarting an unhealthy ward.
    ///
    /// `attempt` is the number of restarts so far (0-based).
    pub restart_backoff: BackoffPolicy,
}

impl Config {
    /// Sequence capacity clamped to a minimum of 1.
    #[inline]
    pub fn buffer_clamped(&self) -> usize {
        self.buffer.max(1)
    }

    /// Error channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn error_capacity_clamped(&self) -> usize {
        self.error_capacity.max(1)
    }

    /// Steward heartbeat period with the `0s` sentinel resolved.
    #[inline]
    pub fn steward_pulse_interval(&self) -> Duration {
        if self.steward_pulse == Duration::ZERO {
            self.ward_timeout / 2
        } else {
            self.steward_pulse
        }
    }

    /// Steward settings derived from this config.
    pub fn steward(&self) -> StewardConfig {
        StewardConfig {
            timeout: self.ward_timeout,
            pulse_interval: self.steward_pulse_interval(),
            backoff: self.restart_backoff,
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `buffer = 16`
    /// - `error_capacity = 64`
    /// - `ward_timeout = 1s`
    /// - `steward_pulse = 0s` (half the ward timeout)
    /// - `restart_backoff = BackoffPolicy::immediate()`
    fn default() -> Self {
        Self {
            buffer: 16,
            error_capacity: 64,
            ward_timeout: Duration::from_secs(1),
            steward_pulse: Duration::ZERO,
            restart_backoff: BackoffPolicy::immediate(),
        }
    }
}
