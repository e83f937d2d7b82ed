//! # Pipeline composer.
//!
//! [`Pipeline`] chains stages under one token and tracks every activity it launches
//! in a single `JoinSet`, so a pipeline can be cancelled and joined as a unit.
//!
//! ```text
//! Pipeline::from_iter(root, items)
//!   .then(parse)              ─► spawn_stage
//!   .fan_out(enrich, 4)       ─► fan_out ─► fan_in
//!   .then(store)              ─► spawn_stage
//!   .collect()                ─► drain tail, join all activities
//! ```
//!
//! ## Rules
//! - The pipeline token is a child of the root: cancelling the root stops the pipeline,
//!   [`Pipeline::cancel`] does not touch the root.
//! - Dropping a pipeline aborts its activities; use [`Pipeline::into_sequence`] to detach.
//! - A default error sink set with [`Pipeline::errors`] applies to every later stage that
//!   does not carry its own.

use std::time::Duration;

use tokio::task::JoinSet;

use super::{
    sequence::{Sequence, generate, sequence},
    stage::{StageOptions, StageRef, spawn_stage},
};
use crate::{
    cancel::CancelToken,
    config::Config,
    error::RuntimeError,
    fan::{fan_in, fan_out},
    fault::ErrorSink,
};

/// A chain of stages sharing one token and one activity set.
pub struct Pipeline<T> {
    token: CancelToken,
    tail: Sequence<T>,
    set: JoinSet<()>,
    capacity: usize,
    errors: Option<ErrorSink>,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Starts a pipeline reading `source`, cancelled when `root` fires.
    pub fn source(root: &CancelToken, source: Sequence<T>) -> Self {
        Self {
            token: root.child_token(),
            tail: source,
            set: JoinSet::new(),
            capacity: Config::default().buffer_clamped(),
            errors: None,
        }
    }

    /// Starts a pipeline from a generator over `items`.
    ///
    /// The generator is one of the pipeline's activities. Its buffer uses the default
    /// capacity; [`Pipeline::buffer`] only affects later stages.
    ///
    /// Must be called within a tokio runtime.
    pub fn from_iter<I>(root: &CancelToken, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let token = root.child_token();
        let capacity = Config::default().buffer_clamped();
        let (tx, tail) = sequence(capacity);
        let mut set = JoinSet::new();
        set.spawn(generate(tx, items.into_iter(), token.clone()));
        Self {
            token,
            tail,
            set,
            capacity,
            errors: None,
        }
    }

    /// Takes the sequence capacity for subsequent stages from `cfg`.
    pub fn with_config(mut self, cfg: &Config) -> Self {
        self.capacity = cfg.buffer_clamped();
        self
    }

    /// Sets the sequence capacity for subsequent stages (min 1).
    pub fn buffer(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Default error sink for subsequent stages.
    pub fn errors(mut self, sink: ErrorSink) -> Self {
        self.errors = Some(sink);
        self
    }

    /// Appends `stage` with default options.
    pub fn then<U>(self, stage: StageRef<T, U>) -> Pipeline<U>
    where
        U: Send + 'static,
    {
        self.then_with(stage, StageOptions::new())
    }

    /// Appends `stage` with `options`.
    pub fn then_with<U>(mut self, stage: StageRef<T, U>, options: StageOptions) -> Pipeline<U>
    where
        U: Send + 'static,
    {
        let options = options.or_errors(self.errors.as_ref());
        let tail = spawn_stage(
            stage,
            &self.token,
            self.tail,
            &options,
            self.capacity,
            &mut self.set,
        );
        Pipeline {
            token: self.token,
            tail,
            set: self.set,
            capacity: self.capacity,
            errors: self.errors,
        }
    }

    /// Appends `workers` copies of `stage` and merges their outputs.
    ///
    /// Output order across workers is unspecified.
    pub fn fan_out<U>(self, stage: StageRef<T, U>, workers: usize) -> Pipeline<U>
    where
        U: Send + 'static,
    {
        self.fan_out_with(stage, workers, StageOptions::new())
    }

    /// Like [`Pipeline::fan_out`], with `options` shared by every worker.
    pub fn fan_out_with<U>(
        mut self,
        stage: StageRef<T, U>,
        workers: usize,
        options: StageOptions,
    ) -> Pipeline<U>
    where
        U: Send + 'static,
    {
        let options = options.or_errors(self.errors.as_ref());
        let outputs = fan_out(
            stage,
            workers,
            &self.token,
            self.tail,
            &options,
            self.capacity,
            &mut self.set,
        );
        let tail = fan_in(&self.token, outputs, self.capacity, &mut self.set);
        Pipeline {
            token: self.token,
            tail,
            set: self.set,
            capacity: self.capacity,
            errors: self.errors,
        }
    }

    /// Next output item; `None` once the pipeline is exhausted or cancelled.
    pub async fn next(&self) -> Option<T> {
        self.tail.next(&self.token).await
    }

    /// Drains the output, then waits for every activity to stop.
    pub async fn collect(mut self) -> Vec<T> {
        let items = self.tail.clone().collect(&self.token).await;
        self.join().await;
        items
    }

    /// Detaches the activities and returns the output sequence with the pipeline token.
    pub fn into_sequence(mut self) -> (CancelToken, Sequence<T>) {
        self.set.detach_all();
        (self.token, self.tail)
    }
}

impl<T> Pipeline<T> {
    /// The pipeline's token (a child of the root).
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Cancels every stage of this pipeline.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Number of launched activities not yet joined.
    pub fn active(&self) -> usize {
        self.set.len()
    }

    /// Waits until every activity has stopped.
    pub async fn join(&mut self) {
        while let Some(res) = self.set.join_next().await {
            if let Err(err) = res {
                tracing::warn!(error = %err, "pipeline activity aborted");
            }
        }
    }

    /// Cancels the pipeline and waits up to `grace` for its activities to stop.
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] when activities are still running after `grace`;
    /// they are aborted before returning.
    pub async fn shutdown(mut self, grace: Duration) -> Result<(), RuntimeError> {
        self.cancel();
        match tokio::time::timeout(grace, self.join()).await {
            Ok(()) => {
                tracing::debug!("pipeline stopped within grace");
                Ok(())
            }
            Err(_) => {
                let stuck = self.set.len();
                tracing::warn!(?grace, stuck, "pipeline grace exceeded");
                self.set.abort_all();
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}
