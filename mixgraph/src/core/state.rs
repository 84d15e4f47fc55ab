//! Execution states and state transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution state shared by a graph and all of its stages.
///
/// States are totally ordered by activity level:
/// `Null < Idle < Paused < Active`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// No resources allocated. Construction and linking happen here.
    #[default]
    Null,
    /// Resources acquired, no streaming.
    Idle,
    /// Streaming set up and sinks prerolled, clock not running.
    Paused,
    /// Clock running, frames rendered.
    Active,
}

impl State {
    /// All states in ascending activity order.
    pub const ALL: [Self; 4] = [Self::Null, Self::Idle, Self::Paused, Self::Active];

    /// Returns the canonical upper-case name of the state.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Idle => "IDLE",
            Self::Paused => "PAUSED",
            Self::Active => "ACTIVE",
        }
    }

    /// Returns the adjacent state one step closer to `target`, or `None`
    /// when already there.
    #[must_use]
    pub fn step_toward(self, target: Self) -> Option<Self> {
        let idx = self as usize;
        match self.cmp(&target) {
            std::cmp::Ordering::Less => Some(Self::ALL[idx + 1]),
            std::cmp::Ordering::Greater => Some(Self::ALL[idx - 1]),
            std::cmp::Ordering::Equal => None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single-step change between adjacent states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateChange {
    /// State being left.
    pub from: State,
    /// State being entered.
    pub to: State,
}

impl StateChange {
    /// Creates a new state change.
    #[must_use]
    pub const fn new(from: State, to: State) -> Self {
        Self { from, to }
    }

    /// Returns true when the change raises the activity level.
    #[must_use]
    pub fn is_upward(&self) -> bool {
        self.to > self.from
    }
}

impl fmt::Display for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Outcome of a state transition request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The target state was reached before the call returned.
    Success,
    /// The transition continues in the background; attainment is reported
    /// later as a state-changed event from the graph.
    Async,
}

/// Current and pending state of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateSnapshot {
    /// State the graph is in.
    pub current: State,
    /// State an outstanding asynchronous transition is heading to.
    pub pending: Option<State>,
}
