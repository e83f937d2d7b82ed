//! Fan-out / fan-in multiplexing.
//!
//! ```text
//!                     ┌─► worker 1 ─► out 1 ─┐
//!   input (shared) ───┼─► worker 2 ─► out 2 ─┼─► fan_in ─► merged
//!                     └─► worker N ─► out N ─┘
//! ```
//!
//! - [`fan_out`] launches N copies of a stage reading one shared input. Each item goes
//!   to exactly one worker, first come first served.
//! - [`fan_in`] merges N sequences. Per-source order is preserved; order across sources
//!   is unspecified.
//!
//! Fan-out only pays off when per-item work outweighs the coordination overhead, and
//! it is only correct when items do not depend on previously computed items. The
//! runtime cannot check the latter; it is the caller's responsibility.

mod fan_in;
mod fan_out;

pub use fan_in::fan_in;
pub use fan_out::fan_out;
