//! # Function-backed stages.
//!
//! - [`StageFn`] wraps a closure `F: Fn(StageContext<In, Out>) -> Fut`, producing a
//!   fresh future per launch, so fan-out workers never share hidden state.
//! - [`map`] and [`filter`] build per-item stages that drive the receive/send loop
//!   themselves: receive (cancellable), acquire the limiter, process, send.
//!
//! ## Per-item failures in `map`
//! ```text
//! f(item) → Ok(out)                → send(out)
//!         → Err(Canceled)          → stage ends quietly
//!         → Err(Fatal | Panicked)  → stage ends, error reported
//!         → Err(other)             → error reported, next item
//! ```
//!
//! ## Example
//! ```rust
//! use stagevisor::{StageError, StageRef, map};
//!
//! let parse: StageRef<String, u64> = map("parse", |line: String| async move {
//!     line.trim().parse::<u64>().map_err(|e| StageError::fail(e.to_string()))
//! });
//! assert_eq!(parse.name(), "parse");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use super::stage::{BoxStageFuture, Stage, StageContext, StageRef};
use crate::error::StageError;

/// Function-backed stage.
#[derive(Debug)]
pub struct StageFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> StageFn<F> {
    /// Creates a new function-backed stage.
    ///
    /// Prefer [`StageFn::arc`] when you immediately need a [`StageRef`].
    pub fn new<In, Out, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(StageContext<In, Out>) -> Fut,
        Fut: Future<Output = Result<(), StageError>>,
    {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the stage and returns it behind an `Arc`.
    pub fn arc<In, Out, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self>
    where
        F: Fn(StageContext<In, Out>) -> Fut,
        Fut: Future<Output = Result<(), StageError>>,
    {
        Arc::new(Self::new(name, f))
    }
}

impl<In, Out, F, Fut> Stage<In, Out> for StageFn<F>
where
    F: Fn(StageContext<In, Out>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), StageError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: StageContext<In, Out>) -> BoxStageFuture {
        Box::pin((self.f)(ctx))
    }
}

struct Map<F> {
    name: Cow<'static, str>,
    f: Arc<F>,
}

impl<In, Out, F, Fut> Stage<In, Out> for Map<F>
where
    In: Send + 'static,
    Out: Send + 'static,
    F: Fn(In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, StageError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: StageContext<In, Out>) -> BoxStageFuture {
        let f = Arc::clone(&self.f);
        Box::pin(async move {
            while let Some(item) = ctx.recv().await {
                ctx.acquire().await?;
                match f(item).await {
                    Ok(out) => ctx.send(out).await?,
                    Err(err) if err.is_cancellation() || err.is_fatal() => return Err(err),
                    Err(err) => ctx.report(err).await,
                }
            }
            Ok(())
        })
    }
}

/// Builds a stage applying `f` to every item.
pub fn map<In, Out, F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> StageRef<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
    F: Fn(In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, StageError>> + Send + 'static,
{
    Arc::new(Map {
        name: name.into(),
        f: Arc::new(f),
    })
}

struct Filter<P> {
    name: Cow<'static, str>,
    keep: Arc<P>,
}

impl<T, P> Stage<T, T> for Filter<P>
where
    T: Send + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: StageContext<T, T>) -> BoxStageFuture {
        let keep = Arc::clone(&self.keep);
        Box::pin(async move {
            while let Some(item) = ctx.recv().await {
                if keep(&item) {
                    ctx.acquire().await?;
                    ctx.send(item).await?;
                }
            }
            Ok(())
        })
    }
}

/// Builds a stage forwarding only items for which `keep` returns `true`.
pub fn filter<T, P>(name: impl Into<Cow<'static, str>>, keep: P) -> StageRef<T, T>
where
    T: Send + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    Arc::new(Filter {
        name: name.into(),
        keep: Arc::new(keep),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::fault::error_channel;
    use crate::pipeline::{Sequence, StageOptions, spawn_stage};
    use tokio::task::JoinSet;

    #[tokio::test]
    async fn map_reports_item_failures_and_continues() {
        let token = CancelToken::new();
        let mut set = JoinSet::new();
        let (sink, mut errors) = error_channel(8);
        let halve = map("halve", |n: u32| async move {
            if n % 2 == 0 {
                Ok(n / 2)
            } else {
                Err(StageError::fail(format!("{n} is odd")))
            }
        });
        let input = Sequence::from_iter(&token, 1..=6, 2);
        let out = spawn_stage(
            halve,
            &token,
            input,
            &StageOptions::new().errors(sink),
            2,
            &mut set,
        );

        assert_eq!(out.collect(&token).await, vec![1, 2, 3]);
        let mut origins = Vec::new();
        while let Some(err) = errors.try_next() {
            assert!(err.is_bug());
            origins.push(err.origin().to_string());
        }
        assert_eq!(origins, vec!["halve"; 3]);
    }

    #[tokio::test]
    async fn map_stops_on_fatal() {
        let token = CancelToken::new();
        let mut set = JoinSet::new();
        let stop_at_three = map("stop", |n: u32| async move {
            if n == 3 {
                Err(StageError::fatal("three"))
            } else {
                Ok(n)
            }
        });
        let input = Sequence::from_iter(&token, 1..=5, 1);
        let out = spawn_stage(stop_at_three, &token, input, &StageOptions::new(), 1, &mut set);
        assert_eq!(out.collect(&token).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn filter_keeps_matching_items_in_order() {
        let token = CancelToken::new();
        let mut set = JoinSet::new();
        let evens = filter("evens", |n: &u32| n % 2 == 0);
        let input = Sequence::from_iter(&token, 1..=10, 4);
        let out = spawn_stage(evens, &token, input, &StageOptions::new(), 4, &mut set);
        assert_eq!(out.collect(&token).await, vec![2, 4, 6, 8, 10]);
    }
}
