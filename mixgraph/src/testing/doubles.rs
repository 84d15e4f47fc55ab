//! Stand-ins for the event source and the lifecycle controller.

use crate::core::{State, StateChange, Transition};
use crate::errors::{ActivationError, StageError};
use crate::events::{Event, EventMask, PollEvents, Timeout};
use crate::pipeline::Lifecycle;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Event source replaying a fixed script.
///
/// Polls honor the mask like the real monitor unless
/// [`ignoring_mask`](Self::ignoring_mask) is set. An exhausted script
/// reports itself closed.
#[derive(Debug, Default)]
pub struct ScriptedMonitor {
    script: VecDeque<Event>,
    polls: usize,
    ignore_mask: bool,
    panic_on_poll: bool,
}

impl ScriptedMonitor {
    /// Creates a monitor that yields `events` in order.
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        Self {
            script: events.into_iter().collect(),
            ..Self::default()
        }
    }

    /// A monitor that panics when polled.
    #[must_use]
    pub fn panicking() -> Self {
        Self {
            panic_on_poll: true,
            ..Self::default()
        }
    }

    /// Hands out events regardless of the requested mask.
    #[must_use]
    pub fn ignoring_mask(mut self) -> Self {
        self.ignore_mask = true;
        self
    }

    /// Number of poll calls so far.
    #[must_use]
    pub fn polls(&self) -> usize {
        self.polls
    }

    /// Events not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl PollEvents for ScriptedMonitor {
    fn poll(&mut self, _timeout: Timeout, mask: EventMask) -> Option<Event> {
        self.polls += 1;
        assert!(!self.panic_on_poll, "scripted monitor poll");
        while let Some(event) = self.script.pop_front() {
            if self.ignore_mask || mask.contains(event.kind()) {
                return Some(event);
            }
        }
        None
    }

    fn is_closed(&self) -> bool {
        self.script.is_empty()
    }
}

/// Lifecycle double recording every requested target.
#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    current: State,
    requests: Arc<Mutex<Vec<State>>>,
    reject: Option<State>,
}

impl RecordingLifecycle {
    /// Creates a double in Null that accepts every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects requests for `target`.
    #[must_use]
    pub fn rejecting(mut self, target: State) -> Self {
        self.reject = Some(target);
        self
    }

    /// Requested targets in order.
    #[must_use]
    pub fn requests(&self) -> Vec<State> {
        self.requests.lock().clone()
    }

    /// Number of Null requests.
    #[must_use]
    pub fn teardowns(&self) -> usize {
        self.requests.lock().iter().filter(|s| **s == State::Null).count()
    }

    /// Shared handle on the request record, usable after the double moved.
    #[must_use]
    pub fn handle(&self) -> Arc<Mutex<Vec<State>>> {
        Arc::clone(&self.requests)
    }
}

impl Lifecycle for RecordingLifecycle {
    fn request_state(&mut self, target: State) -> Result<Transition, ActivationError> {
        self.requests.lock().push(target);
        if self.reject == Some(target) {
            return Err(ActivationError::Rejected {
                stage: "fake".to_string(),
                change: StateChange::new(self.current, target),
                source: StageError::new("scripted rejection"),
            });
        }
        self.current = target;
        Ok(Transition::Success)
    }

    fn current_state(&self) -> State {
        self.current
    }
}
