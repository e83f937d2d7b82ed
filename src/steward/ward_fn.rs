//! # Function-backed ward (`WardFn`)
//!
//! [`WardFn`] wraps a closure `F: Fn(WardContext) -> Fut`, producing a fresh future per
//! generation. State shared between generations must be explicit (`Arc<...>` captured
//! by the closure).
//!
//! ## Example
//! ```rust
//! use stagevisor::{StageError, WardContext, WardFn, WardRef};
//!
//! let ward: WardRef = WardFn::arc("poller", |ctx: WardContext| async move {
//!     while !ctx.token().is_cancelled() {
//!         ctx.pulse();
//!         tokio::task::yield_now().await;
//!     }
//!     Ok::<(), StageError>(())
//! });
//! assert_eq!(ward.name(), "poller");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use super::ward::{BoxWardFuture, Ward, WardContext};
use crate::error::StageError;

/// Closure-backed [`Ward`].
#[derive(Debug)]
pub struct WardFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> WardFn<F> {
    /// Creates a ward from a start function.
    pub fn new<Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(WardContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StageError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Same as [`WardFn::new`], wrapped in an `Arc`.
    pub fn arc<Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self>
    where
        F: Fn(WardContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StageError>> + Send + 'static,
    {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut> Ward for WardFn<F>
where
    F: Fn(WardContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), StageError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, ctx: WardContext) -> BoxWardFuture {
        Box::pin((self.f)(ctx))
    }
}
