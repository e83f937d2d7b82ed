//! # Jitter for restart delays.
//!
//! Randomizes a backoff delay so that many stewards restarting at once do not hammer
//! a shared dependency in lockstep.
//!
//! | policy  | result                          |
//! |---------|---------------------------------|
//! | `None`  | `delay`                         |
//! | `Full`  | uniform in `[0, delay]`         |
//! | `Equal` | `delay/2 + uniform[0, delay/2]` |

use rand::Rng;
use std::time::Duration;

/// Randomization applied to a computed backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact delay.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Half the delay plus uniform in `[0, delay/2]`.
    Equal,
}

impl JitterPolicy {
    /// Applies this policy to `delay`. Millisecond resolution.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u64::MAX as u128) as u64;
        match self {
            JitterPolicy::None => delay,
            _ if ms == 0 => Duration::ZERO,
            JitterPolicy::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + rand::rng().random_range(0..=half))
            }
        }
    }
}
