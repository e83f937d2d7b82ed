//! Heartbeat supervision with automatic restart.
//!
//! A [`Steward`] runs a [`Ward`] one generation at a time and watches its heartbeat.
//! A generation that stops pulsing for longer than the configured timeout, fails or
//! panics is cancelled, abandoned and replaced by a fresh one.
//!
//! ```text
//!                 parent token
//!                      │
//!   Steward ───────────┼──────────► own pulses (StewardHandle::pulses)
//!      │  Or(fresh, parent)
//!      ▼
//!   Ward gen N ──► ward pulses ──► deadline reset
//!      │
//!      └─ missed deadline / error ──► cancel gen N ──► start gen N+1
//! ```
//!
//! Restarted wards may see the item that was in flight again; consumers needing
//! exactly-once effects must make the ward's work idempotent.

mod config;
mod state;
#[allow(clippy::module_inception)]
mod steward;
mod ward;
mod ward_fn;

pub use config::StewardConfig;
pub use state::WardState;
pub use steward::{Steward, StewardHandle};
pub use ward::{BoxWardFuture, Ward, WardContext, WardRef};
pub use ward_fn::WardFn;
