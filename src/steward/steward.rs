//! # Steward: heartbeat-driven supervisor for one ward.
//!
//! ## Generation loop
//! ```text
//! loop {
//!   ├─► Starting: ward token = Or(fresh, parent); spawn ward.start(ctx)
//!   ├─► Running: select (biased)
//!   │     ├─► parent cancelled     → cancel ward token, await it → Stopped
//!   │     ├─► ward finished
//!   │     │     ├─► Ok / Canceled  → Stopped
//!   │     │     └─► Err / panic    → classify + report → restart
//!   │     ├─► ward pulse           → deadline = pulse.at + timeout
//!   │     ├─► deadline elapsed     → MissedHeartbeat, cancel + abandon → restart
//!   │     └─► own ticker           → steward pulse
//!   └─► Restarting: restarts += 1, sleep(backoff.next(n)) while still pulsing
//! }
//! ```
//!
//! ## Rules
//! - Generations never overlap in `Running`; an abandoned generation may still be winding
//!   down when the next one starts.
//! - Restarts are unbounded. A ward wanting a ceiling returns `Ok(())` after N
//!   generations (see [`WardContext::generation`](crate::WardContext::generation)).
//! - The steward pulses on its own period whatever the ward does, so a hung steward is
//!   detectable from outside.
//! - Abandoned generations are awaited before [`StewardHandle::join`] returns.
//! - Failures are reported without waiting: a full error channel drops the report
//!   (logged) rather than stall restarts or the steward's own pulses.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
    time::{self, Instant, MissedTickBehavior},
};

use super::{
    config::StewardConfig,
    state::WardState,
    ward::{BoxWardFuture, Ward, WardContext, WardRef},
};
use crate::{
    cancel::CancelToken,
    error::{StageError, panic_message},
    fault::{ErrorSink, report_failure_now},
    heartbeat::{Heartbeat, Pulses, heartbeat},
};

/// Supervises one ward, restarting it whenever it stops pulsing or fails.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use stagevisor::{CancelToken, StageError, Steward, StewardConfig, WardContext, WardFn};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ward = WardFn::arc("ticker", |ctx: WardContext| async move {
///     let _pulses = ctx.emit_pulses();
///     ctx.token().cancelled().await;
///     Ok::<(), StageError>(())
/// });
///
/// let root = CancelToken::new();
/// let handle = Steward::new(ward, StewardConfig::new(Duration::from_millis(100))).spawn(&root);
/// root.cancel();
/// handle.join().await;
/// # }
/// ```
#[derive(Clone)]
pub struct Steward {
    ward: WardRef,
    cfg: StewardConfig,
    errors: Option<ErrorSink>,
}

impl Steward {
    /// Creates a steward for `ward`.
    pub fn new(ward: WardRef, cfg: StewardConfig) -> Self {
        Self {
            ward,
            cfg,
            errors: None,
        }
    }

    /// Reports ward failures and missed deadlines to `errors`.
    pub fn errors(mut self, errors: ErrorSink) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Starts supervising under `parent`.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(self, parent: &CancelToken) -> StewardHandle {
        let (own, pulses) = heartbeat();
        let (state_tx, state_rx) = watch::channel(WardState::Starting);
        let counters = Arc::new(Counters::default());
        let period = self.cfg.own_pulse();
        let run = self.supervision(Arc::clone(&counters), state_tx);
        let task = tokio::spawn(run.run(parent.clone(), own, period));
        StewardHandle {
            pulses,
            state: state_rx,
            counters,
            task,
        }
    }

    fn supervision(&self, counters: Arc<Counters>, state: watch::Sender<WardState>) -> Supervision {
        Supervision {
            ward: Arc::clone(&self.ward),
            cfg: self.cfg,
            errors: self.errors.clone(),
            counters,
            state,
        }
    }
}

/// A steward is itself a ward: an outer steward watches the inner steward's own pulses.
impl Ward for Steward {
    fn name(&self) -> &str {
        self.ward.name()
    }

    fn start(&self, ctx: WardContext) -> BoxWardFuture {
        let run = self.supervision(
            Arc::new(Counters::default()),
            watch::channel(WardState::Starting).0,
        );
        Box::pin(async move {
            run.run(ctx.token().clone(), ctx.heartbeat().clone(), ctx.pulse_interval())
                .await;
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
struct Counters {
    restarts: AtomicU64,
    generation: AtomicU64,
}

/// Handle to a running steward.
pub struct StewardHandle {
    pulses: Pulses,
    state: watch::Receiver<WardState>,
    counters: Arc<Counters>,
    task: JoinHandle<()>,
}

impl StewardHandle {
    /// The steward's own heartbeat; closes once the steward has stopped.
    pub fn pulses(&mut self) -> &mut Pulses {
        &mut self.pulses
    }

    /// Current ward state.
    pub fn state(&self) -> WardState {
        *self.state.borrow()
    }

    /// Receiver observing every state change.
    pub fn watch_state(&self) -> watch::Receiver<WardState> {
        self.state.clone()
    }

    /// Number of restarts so far.
    pub fn restarts(&self) -> u64 {
        self.counters.restarts.load(Ordering::Acquire)
    }

    /// Generation currently (or last) supervised, 1-based; `0` before the first start.
    pub fn generation(&self) -> u64 {
        self.counters.generation.load(Ordering::Acquire)
    }

    /// Waits until the steward has stopped and every generation has wound down.
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "steward task aborted");
        }
    }
}

enum Exit {
    Stop,
    Finished(Result<Result<(), StageError>, JoinError>),
    Stalled,
}

struct Supervision {
    ward: WardRef,
    cfg: StewardConfig,
    errors: Option<ErrorSink>,
    counters: Arc<Counters>,
    state: watch::Sender<WardState>,
}

impl Supervision {
    async fn run(self, parent: CancelToken, own: Heartbeat, period: Duration) {
        let name = self.ward.name().to_string();
        let timeout = self.cfg.deadline();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut abandoned: Vec<JoinHandle<Result<(), StageError>>> = Vec::new();
        let mut restarts: u64 = 0;

        while !parent.is_cancelled() {
            self.state.send_replace(WardState::Starting);
            let generation = self.counters.generation.fetch_add(1, Ordering::AcqRel) + 1;
            let token = CancelToken::any([parent.clone()]);
            let (ward_hb, mut ward_pulses) = heartbeat();
            let ctx = WardContext::new(token.clone(), ward_hb, generation, self.cfg.ward_pulse());
            let mut handle = tokio::spawn(self.ward.start(ctx));

            self.state.send_replace(WardState::Running);
            tracing::debug!(ward = %name, generation, "ward started");

            let deadline = time::sleep(timeout);
            tokio::pin!(deadline);
            let mut listening = true;
            let exit = loop {
                tokio::select! {
                    biased;
                    _ = parent.cancelled() => break Exit::Stop,
                    res = &mut handle => break Exit::Finished(res),
                    pulse = ward_pulses.recv(), if listening => match pulse {
                        Some(pulse) => deadline.as_mut().reset(pulse.at + timeout),
                        None => listening = false,
                    },
                    _ = &mut deadline => break Exit::Stalled,
                    _ = ticker.tick() => {
                        own.pulse();
                    }
                }
            };

            let failure = match exit {
                Exit::Stop => {
                    token.cancel();
                    settle(&name, handle).await;
                    break;
                }
                Exit::Finished(Ok(Ok(()))) | Exit::Finished(Ok(Err(StageError::Canceled))) => {
                    tracing::debug!(ward = %name, generation, "ward finished");
                    break;
                }
                Exit::Finished(Ok(Err(err))) => err,
                Exit::Finished(Err(err)) if err.is_panic() => StageError::Panicked {
                    info: panic_message(&*err.into_panic()),
                },
                Exit::Finished(Err(err)) => StageError::fail(err.to_string()),
                Exit::Stalled => {
                    token.cancel();
                    abandoned.push(handle);
                    StageError::MissedHeartbeat {
                        ward: name.clone(),
                        timeout,
                    }
                }
            };

            restarts += 1;
            self.counters.restarts.store(restarts, Ordering::Release);
            self.state.send_replace(WardState::Restarting);
            tracing::warn!(ward = %name, generation, restarts, error = %failure, "restarting ward");
            report_failure_now(&name, failure, self.errors.as_ref());
            abandoned.retain(|h| !h.is_finished());

            let delay = self.cfg.backoff.next((restarts - 1).min(u32::MAX as u64) as u32);
            if !delay.is_zero() {
                let sleep = time::sleep(delay);
                tokio::pin!(sleep);
                loop {
                    tokio::select! {
                        biased;
                        _ = parent.cancelled() => break,
                        _ = &mut sleep => break,
                        _ = ticker.tick() => {
                            own.pulse();
                        }
                    }
                }
            }
        }

        for handle in abandoned {
            settle(&name, handle).await;
        }
        self.state.send_replace(WardState::Stopped);
        tracing::debug!(ward = %name, restarts, "steward stopped");
    }
}

/// Awaits a cancelled generation, logging how it ended.
async fn settle(name: &str, handle: JoinHandle<Result<(), StageError>>) {
    match handle.await {
        Ok(Ok(())) | Ok(Err(StageError::Canceled)) => {}
        Ok(Err(err)) => tracing::debug!(ward = %name, error = %err, "stopped ward returned an error"),
        Err(err) => tracing::warn!(ward = %name, error = %err, "stopped ward panicked or was aborted"),
    }
}
