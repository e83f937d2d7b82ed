//! # Stage abstraction and stage launcher.
//!
//! A [`Stage`] consumes an input [`Sequence`] under a [`CancelToken`] and produces an
//! output sequence. It receives everything it may touch through a [`StageContext`]:
//! the token, both sequence ends, an optional heartbeat and an optional limiter.
//!
//! ## Launch flow
//! ```text
//! spawn_stage(stage, token, input, options)
//!   ├─► sequence(capacity)            → (output producer, output Sequence)
//!   ├─► Interval heartbeat?           → pulse_every(...) on the JoinSet, own child token
//!   └─► JoinSet::spawn
//!         ├─► stage.run(ctx)           (catch_unwind)
//!         ├─► cancel emitter token     → interval pulses stop with the stage
//!         ├─► Ok / Canceled / Closed   → debug log
//!         ├─► Err(e)                   → classify + report to ErrorSink
//!         └─► drop output producer     → downstream sees exhaustion
//! ```
//!
//! ## Rules
//! - The output closes when the input closes or the token fires, whichever is first,
//!   provided the stage only waits through its context (every wait selects on the token).
//! - A failure is reported **before** the output sequence closes.
//! - Cancellation and a downstream hang-up (`Closed`) end a stage quietly.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;

use super::sequence::{Producer, Sequence, sequence};
use crate::{
    cancel::CancelToken,
    error::{StageError, panic_message},
    fault::{ErrorSink, report_failure},
    heartbeat::{Heartbeat, HeartbeatMode, pulse_every},
    limiter::Limiter,
};

/// Boxed future returned by [`Stage::run`].
pub type BoxStageFuture = Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + 'static>>;

/// Shared handle to a stage.
pub type StageRef<In, Out> = Arc<dyn Stage<In, Out>>;

/// # Concurrent transformation from a sequence of `In` to a sequence of `Out`.
///
/// Implementations must wait only through the context (`recv`, `send`, `acquire`)
/// or select on `ctx.token()` themselves. A wait with no cancellation path leaks the
/// activity.
///
/// # Example
/// ```
/// use stagevisor::{BoxStageFuture, Stage, StageContext, StageError};
///
/// struct Double;
///
/// impl Stage<u64, u64> for Double {
///     fn name(&self) -> &str { "double" }
///
///     fn run(&self, ctx: StageContext<u64, u64>) -> BoxStageFuture {
///         Box::pin(async move {
///             while let Some(n) = ctx.recv().await {
///                 ctx.send(n * 2).await?;
///             }
///             Ok::<(), StageError>(())
///         })
///     }
/// }
/// ```
pub trait Stage<In, Out>: Send + Sync + 'static {
    /// Stable, human-readable stage name (used as the error origin).
    fn name(&self) -> &str;

    /// Runs the stage until its input is exhausted, its token fires, or it fails.
    fn run(&self, ctx: StageContext<In, Out>) -> BoxStageFuture;
}

/// Optional attachments for a launched stage.
#[derive(Clone, Default)]
pub struct StageOptions {
    limiter: Option<Arc<dyn Limiter>>,
    heartbeat: Option<(Heartbeat, HeartbeatMode)>,
    errors: Option<ErrorSink>,
}

impl StageOptions {
    /// No limiter, no heartbeat, failures logged only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rate-limits every item through `limiter`.
    pub fn limiter(mut self, limiter: Arc<dyn Limiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Emits liveness pulses on `heartbeat` according to `mode`.
    pub fn heartbeat(mut self, heartbeat: Heartbeat, mode: HeartbeatMode) -> Self {
        self.heartbeat = Some((heartbeat, mode));
        self
    }

    /// Reports failures to `errors`.
    pub fn errors(mut self, errors: ErrorSink) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Falls back to `errors` when no sink was set explicitly.
    pub(crate) fn or_errors(mut self, errors: Option<&ErrorSink>) -> Self {
        if self.errors.is_none() {
            self.errors = errors.cloned();
        }
        self
    }
}

/// Everything a running stage may touch.
pub struct StageContext<In, Out> {
    name: Arc<str>,
    token: CancelToken,
    input: Sequence<In>,
    output: Producer<Out>,
    heartbeat: Option<Heartbeat>,
    per_item: bool,
    limiter: Option<Arc<dyn Limiter>>,
    errors: Option<ErrorSink>,
}

impl<In, Out> StageContext<In, Out> {
    /// Assembles a context by hand, e.g. to drive a stage without [`spawn_stage`].
    pub fn new(token: CancelToken, input: Sequence<In>, output: Producer<Out>) -> Self {
        Self {
            name: Arc::from("stage"),
            token,
            input,
            output,
            heartbeat: None,
            per_item: false,
            limiter: None,
            errors: None,
        }
    }

    /// The stage's cancel token.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// The stage's input sequence.
    pub fn input(&self) -> &Sequence<In> {
        &self.input
    }

    /// Name of the running stage.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next input item; `None` once the input is exhausted or the token fires.
    ///
    /// Pulses the heartbeat when running in [`HeartbeatMode::PerItem`].
    pub async fn recv(&self) -> Option<In> {
        let item = self.input.next(&self.token).await;
        if item.is_some() && self.per_item {
            self.pulse();
        }
        item
    }

    /// Sends one output item; see [`Producer::send`].
    pub async fn send(&self, item: Out) -> Result<(), StageError> {
        self.output.send(item, &self.token).await
    }

    /// Waits for rate-limiter permission (immediate when no limiter is attached).
    pub async fn acquire(&self) -> Result<(), StageError> {
        match &self.limiter {
            Some(limiter) => limiter.acquire(&self.token).await,
            None if self.token.is_cancelled() => Err(self.token.cause()),
            None => Ok(()),
        }
    }

    /// Emits a heartbeat pulse, if a heartbeat is attached. Never blocks.
    pub fn pulse(&self) -> bool {
        self.heartbeat.as_ref().is_some_and(Heartbeat::pulse)
    }

    /// Classifies `err` with this stage as origin and sends it to the error channel,
    /// without ending the stage.
    pub async fn report(&self, err: StageError) {
        report_failure(&self.name, err, self.errors.as_ref(), &self.token).await;
    }
}

/// Launches `stage` on `set`, returning its output sequence.
///
/// Must be called within a tokio runtime.
pub fn spawn_stage<In, Out>(
    stage: StageRef<In, Out>,
    token: &CancelToken,
    input: Sequence<In>,
    options: &StageOptions,
    capacity: usize,
    set: &mut JoinSet<()>,
) -> Sequence<Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    let (output, seq) = sequence(capacity);
    let name: Arc<str> = Arc::from(stage.name());

    let mut heartbeat = None;
    let mut per_item = false;
    let emitter = token.child_token();
    if let Some((hb, mode)) = &options.heartbeat {
        match mode {
            HeartbeatMode::Interval(period) => {
                set.spawn(pulse_every(hb.clone(), *period, emitter.clone()));
            }
            HeartbeatMode::PerItem => per_item = true,
        }
        heartbeat = Some(hb.clone());
    }

    let ctx = StageContext {
        name: Arc::clone(&name),
        token: token.clone(),
        input,
        output: output.clone(),
        heartbeat,
        per_item,
        limiter: options.limiter.clone(),
        errors: options.errors.clone(),
    };
    let fut = stage.run(ctx);
    let errors = options.errors.clone();
    let token = token.clone();

    set.spawn(async move {
        // Held until the outcome is reported, so errors precede exhaustion downstream.
        let hold = output;
        let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => Err(StageError::Panicked {
                info: panic_message(&*panic),
            }),
        };
        emitter.cancel();
        match outcome {
            Ok(()) => tracing::debug!(stage = %name, "stage finished"),
            Err(StageError::Canceled) => tracing::debug!(stage = %name, "stage cancelled"),
            Err(StageError::Closed) => tracing::debug!(stage = %name, "downstream closed"),
            Err(err) => {
                tracing::debug!(stage = %name, error = %err, "stage failed");
                report_failure(&name, err, errors.as_ref(), &token).await;
            }
        }
        drop(hold);
    });
    seq
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::fault::error_channel;
    use crate::heartbeat::heartbeat;
    use crate::pipeline::StageFn;

    fn echo() -> StageRef<u32, u32> {
        StageFn::arc("echo", |ctx: StageContext<u32, u32>| async move {
            while let Some(n) = ctx.recv().await {
                ctx.send(n).await?;
            }
            Ok::<(), StageError>(())
        })
    }

    #[tokio::test]
    async fn output_closes_when_input_closes() {
        let token = CancelToken::new();
        let mut set = JoinSet::new();
        let input = Sequence::from_iter(&token, [1, 2, 3], 1);
        let out = spawn_stage(echo(), &token, input, &StageOptions::new(), 1, &mut set);
        assert_eq!(out.collect(&token).await, vec![1, 2, 3]);
        while set.join_next().await.is_some() {}
    }

    #[tokio::test]
    async fn output_closes_when_token_fires() {
        let token = CancelToken::new();
        let mut set = JoinSet::new();
        let (_keep_open, input) = sequence::<u32>(1);
        let out = spawn_stage(echo(), &token, input, &StageOptions::new(), 1, &mut set);

        token.cancel();
        while set.join_next().await.is_some() {}
        assert_eq!(out.next(&CancelToken::new()).await, None);
    }

    #[tokio::test]
    async fn failure_is_reported_before_exhaustion() {
        let token = CancelToken::new();
        let mut set = JoinSet::new();
        let (sink, mut errors) = error_channel(4);
        let failing: StageRef<u32, u32> =
            StageFn::arc("failing", |ctx: StageContext<u32, u32>| async move {
                let _ = ctx.recv().await;
                Err::<(), _>(StageError::fatal("corrupt frame"))
            });
        let input = Sequence::from_iter(&token, [1], 1);
        let out = spawn_stage(
            failing,
            &token,
            input,
            &StageOptions::new().errors(sink),
            1,
            &mut set,
        );

        assert_eq!(out.next(&token).await, None);
        let err = errors.try_next().expect("error enqueued before exhaustion");
        assert!(err.is_bug());
        assert_eq!(err.origin(), "failing");
    }

    #[tokio::test]
    async fn panic_is_classified_as_bug() {
        let token = CancelToken::new();
        let mut set = JoinSet::new();
        let (sink, mut errors) = error_channel(4);
        let panicking: StageRef<u32, u32> =
            StageFn::arc("panicking", |_ctx: StageContext<u32, u32>| async move {
                if true {
                    panic!("boom");
                }
                Ok::<(), StageError>(())
            });
        let (_tx, input) = sequence::<u32>(1);
        let out = spawn_stage(
            panicking,
            &token,
            input,
            &StageOptions::new().errors(sink),
            1,
            &mut set,
        );
        assert_eq!(out.next(&token).await, None);
        let err = errors.try_next().expect("panic reported");
        assert!(err.is_bug());
        assert!(err.message().contains("boom"));
    }

    #[tokio::test]
    async fn per_item_heartbeat_pulses_on_receive() {
        let token = CancelToken::new();
        let mut set = JoinSet::new();
        let (hb, mut pulses) = heartbeat();
        let (tx, input) = sequence::<u32>(1);
        let out = spawn_stage(
            echo(),
            &token,
            input,
            &StageOptions::new().heartbeat(hb, HeartbeatMode::PerItem),
            1,
            &mut set,
        );

        tx.send(5, &token).await.expect("sent");
        assert_eq!(out.next(&token).await, Some(5));
        assert!(pulses.try_next().is_some());
        drop(tx);
        while set.join_next().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn interval_heartbeat_stops_with_the_stage() {
        let token = CancelToken::new();
        let mut set = JoinSet::new();
        let (hb, mut pulses) = heartbeat();
        let (tx, input) = sequence::<u32>(1);
        let out = spawn_stage(
            echo(),
            &token,
            input,
            &StageOptions::new().heartbeat(hb, HeartbeatMode::Interval(Duration::from_millis(10))),
            1,
            &mut set,
        );

        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(pulses.try_next().is_some());
        drop(tx);
        assert_eq!(out.next(&token).await, None);

        // Pulses stay subscribed; the emitter must still wind down.
        tokio::time::timeout(Duration::from_secs(60), async {
            while set.join_next().await.is_some() {}
        })
        .await
        .expect("every activity joined");
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_timeout_is_reported_as_operational() {
        let root = CancelToken::new();
        let token = root.with_timeout(Duration::from_millis(50));
        let mut set = JoinSet::new();
        let (sink, mut errors) = error_channel(4);
        let input = Sequence::from_iter(&root, [1, 2, 3], 1);
        // Nobody reads the output, so the second send waits for the timer.
        let _out = spawn_stage(
            echo(),
            &token,
            input,
            &StageOptions::new().errors(sink),
            1,
            &mut set,
        );

        while set.join_next().await.is_some() {}
        let err = errors.try_next().expect("timeout reported");
        assert!(!err.is_bug());
        assert_eq!(err.origin(), "echo");
        assert!(err.message().contains("timed out"));
    }
}
