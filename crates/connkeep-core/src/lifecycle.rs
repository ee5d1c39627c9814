//! Daemon lifecycle states.

use std::fmt;

/// Where the daemon is in its shutdown sequence.
///
/// Transitions only move forward: `Running -> Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LifecycleState {
    /// Accepting and serving connections.
    #[default]
    Running,

    /// Termination requested; the listener no longer accepts, held
    /// connections are finishing.
    Draining,

    /// All held connections finished or the drain bound expired.
    Stopped,
}

impl LifecycleState {
    /// Returns true if `next` is a legal successor of this state.
    ///
    /// Staying in the same state is not a transition.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        next > self
    }

    /// Lowercase label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
