/// Lifecycle of the ward supervised by a steward.
///
/// ```text
/// Starting ──► Running ──► Restarting ──► Starting ...
///                 │
///                 └──► Stopped   (parent cancelled or ward finished cleanly)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WardState {
    /// A new generation is being launched.
    Starting,
    /// The current generation is running and monitored.
    Running,
    /// The previous generation was abandoned; waiting out the backoff.
    Restarting,
    /// Supervision is over. Terminal.
    Stopped,
}

impl WardState {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WardState::Starting => "ward_starting",
            WardState::Running => "ward_running",
            WardState::Restarting => "ward_restarting",
            WardState::Stopped => "ward_stopped",
        }
    }

    /// True once no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WardState::Stopped)
    }
}
