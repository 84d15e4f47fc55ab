//! Supervisor loop consuming graph events until a terminal one arrives.

use crate::events::{Event, EventMask, EventPayload, Origin, PollEvents, Timeout};
use crate::report::Reporter;
use tracing::{debug, info, warn};

/// Supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Polling for events.
    Running,
    /// A terminal condition was seen; never runs again.
    Terminated,
}

/// Why supervision ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The graph reported end of stream.
    EndOfStream,
    /// A stage or the graph reported an error.
    Error {
        /// Who reported it.
        origin: Origin,
        /// Human-readable message.
        message: String,
        /// Diagnostic detail.
        debug: Option<String>,
    },
    /// The event source was flushed or closed.
    Closed,
    /// A finite poll timeout elapsed without a terminal event.
    TimedOut,
}

impl Termination {
    /// Returns true for [`Termination::EndOfStream`].
    #[must_use]
    pub const fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

/// Consumes events and reports them until a terminal one arrives.
///
/// Errors and end of stream terminate. State changes of the graph itself
/// are reported; those of member stages are ignored.
pub struct Supervisor<'a> {
    graph_name: String,
    reporter: &'a dyn Reporter,
    mask: EventMask,
    timeout: Timeout,
    state: SupervisorState,
    termination: Option<Termination>,
    polls: usize,
}

impl<'a> Supervisor<'a> {
    /// Creates a supervisor for the graph named `graph_name`.
    #[must_use]
    pub fn new(graph_name: impl Into<String>, reporter: &'a dyn Reporter) -> Self {
        Self {
            graph_name: graph_name.into(),
            reporter,
            mask: EventMask::supervision(),
            timeout: Timeout::Infinite,
            state: SupervisorState::Running,
            termination: None,
            polls: 0,
        }
    }

    /// Bounds each poll. Expiry terminates with [`Termination::TimedOut`].
    #[must_use]
    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Number of polls performed.
    #[must_use]
    pub fn polls(&self) -> usize {
        self.polls
    }

    /// The termination, once reached.
    #[must_use]
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Polls `events` until a terminal condition.
    ///
    /// Running a terminated supervisor returns the stored termination
    /// without polling.
    pub fn run(&mut self, events: &mut dyn PollEvents) -> Termination {
        if let Some(termination) = &self.termination {
            return termination.clone();
        }
        debug!(graph = %self.graph_name, "supervision started");

        let termination = loop {
            self.polls += 1;
            let Some(event) = events.poll(self.timeout, self.mask) else {
                break if events.is_closed() || self.timeout == Timeout::Infinite {
                    Termination::Closed
                } else {
                    Termination::TimedOut
                };
            };
            if let Some(termination) = self.dispatch(event) {
                break termination;
            }
        };

        info!(graph = %self.graph_name, polls = self.polls, termination = ?termination, "supervision finished");
        self.state = SupervisorState::Terminated;
        self.termination = Some(termination.clone());
        termination
    }

    fn dispatch(&self, event: Event) -> Option<Termination> {
        match event.payload {
            EventPayload::Error { message, debug } => {
                self.reporter.diagnostic(&format!(
                    "Error received from element {}: {message}",
                    event.origin
                ));
                self.reporter.diagnostic(&format!(
                    "Debugging information: {}",
                    debug.as_deref().unwrap_or("none")
                ));
                Some(Termination::Error {
                    origin: event.origin,
                    message,
                    debug,
                })
            }
            EventPayload::EndOfStream => {
                self.reporter.info("End-Of-Stream reached.");
                Some(Termination::EndOfStream)
            }
            EventPayload::StateChanged { old, new, .. } => {
                if event.origin == Origin::Graph(self.graph_name.clone()) {
                    self.reporter
                        .info(&format!("Pipeline state changed from {old} to {new}:"));
                }
                None
            }
            EventPayload::Warning { .. } | EventPayload::Other(_) => {
                warn!(graph = %self.graph_name, seq = event.seq, kind = ?event.kind(), "unexpected event");
                self.reporter.diagnostic("Unexpected message received.");
                None
            }
        }
    }
}

impl std::fmt::Debug for Supervisor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("graph_name", &self.graph_name)
            .field("state", &self.state)
            .field("polls", &self.polls)
            .finish()
    }
}
