//! # Interval heartbeat emitter.
//!
//! Emits a pulse on a fixed period regardless of work progress. Use it when work
//! granularity is coarse or unpredictable; for short, bounded per-item work prefer
//! [`HeartbeatMode::PerItem`], which pulses at the start of each item instead.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::pulse::Heartbeat;
use crate::cancel::CancelToken;

/// How a stage signals liveness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeartbeatMode {
    /// Pulse every `period`, independent of progress.
    Interval(Duration),
    /// Pulse once when processing of each item starts.
    PerItem,
}

/// Spawns an activity pulsing `heartbeat` every `period` until `token` fires.
///
/// The first pulse is sent after one full period. A zero period is clamped to 1ms.
/// The activity also exits once the receiving side of the heartbeat is gone.
pub fn emit_every(heartbeat: Heartbeat, period: Duration, token: CancelToken) -> JoinHandle<()> {
    tokio::spawn(pulse_every(heartbeat, period, token))
}

/// The emitter loop behind [`emit_every`], for callers tracking it in a `JoinSet`.
pub(crate) async fn pulse_every(heartbeat: Heartbeat, period: Duration, token: CancelToken) {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if heartbeat.is_closed() {
                    break;
                }
                heartbeat.pulse();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heartbeat::heartbeat;

    #[tokio::test(start_paused = true)]
    async fn emits_on_period_and_stops_on_cancel() {
        let (hb, mut pulses) = heartbeat();
        let token = CancelToken::new();
        let handle = emit_every(hb, Duration::from_millis(100), token.clone());

        let first = pulses.next(&CancelToken::new()).await;
        assert!(first.is_some());
        let second = pulses.next(&CancelToken::new()).await;
        assert!(second.is_some());
        let gap = second.map(|p| p.at).zip(first.map(|p| p.at)).map(|(b, a)| b - a);
        assert_eq!(gap, Some(Duration::from_millis(100)));

        token.cancel();
        handle.await.expect("emitter joined");
    }
}
