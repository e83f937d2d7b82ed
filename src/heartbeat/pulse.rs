//! # Heartbeat channel.
//!
//! A heartbeat is a single-slot channel of contentless, timestamped [`Pulse`]s.
//! Liveness is signalled by occurrence, not by count: if the slot already holds an
//! unconsumed pulse, a new one is dropped silently.
//!
//! ```text
//!   Heartbeat::pulse() ──try_send──► [ slot (1) ] ──► Pulses::next(&token)
//!                          │
//!                          └─ slot full → pulse dropped
//! ```

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::cancel::CancelToken;

/// A contentless liveness signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pulse {
    /// When the pulse was emitted.
    pub at: Instant,
}

impl Pulse {
    /// Pulse stamped with the current instant.
    pub fn now() -> Self {
        Self { at: Instant::now() }
    }
}

/// Creates a connected heartbeat sender/receiver pair.
pub fn heartbeat() -> (Heartbeat, Pulses) {
    let (tx, rx) = mpsc::channel(1);
    (Heartbeat { tx }, Pulses { rx })
}

/// Sending half of a heartbeat. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Heartbeat {
    tx: mpsc::Sender<Pulse>,
}

impl Heartbeat {
    /// Emits a pulse without blocking.
    ///
    /// Returns `false` if the pulse was dropped (slot full or nobody listening).
    pub fn pulse(&self) -> bool {
        self.tx.try_send(Pulse::now()).is_ok()
    }

    /// True once the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a heartbeat.
#[derive(Debug)]
pub struct Pulses {
    rx: mpsc::Receiver<Pulse>,
}

impl Pulses {
    /// Waits for the next pulse.
    ///
    /// Returns `None` when the token fires or every [`Heartbeat`] has been dropped.
    pub async fn next(&mut self, token: &CancelToken) -> Option<Pulse> {
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            pulse = self.rx.recv() => pulse,
        }
    }

    /// Waits for the next pulse without a cancellation path.
    ///
    /// Only for callers that already select this future against a token.
    pub(crate) async fn recv(&mut self) -> Option<Pulse> {
        self.rx.recv().await
    }

    /// Takes a pending pulse, if any.
    pub fn try_next(&mut self) -> Option<Pulse> {
        self.rx.try_recv().ok()
    }
}
