//! Status events posted by graphs and stages.

use crate::core::State;
use chrono::{DateTime, Utc};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Next posting sequence number. Callers hold the queue lock.
pub(crate) fn next_seq() -> u64 {
    NEXT_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Where an event came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    /// The graph itself.
    Graph(String),
    /// A member stage.
    Stage(String),
}

impl Origin {
    /// Name of the graph or stage.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Graph(name) | Self::Stage(name) => name,
        }
    }

    /// Returns true if the event came from the graph itself.
    #[must_use]
    pub const fn is_graph(&self) -> bool {
        matches!(self, Self::Graph(_))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind-specific event data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// A stage failed; streaming from it has stopped.
    Error {
        /// Human-readable message.
        message: String,
        /// Optional diagnostic detail.
        debug: Option<String>,
    },
    /// A recoverable problem.
    Warning {
        /// Human-readable message.
        message: String,
        /// Optional diagnostic detail.
        debug: Option<String>,
    },
    /// Every sink has consumed its last frame.
    EndOfStream,
    /// The origin changed state.
    StateChanged {
        /// State left.
        old: State,
        /// State entered.
        new: State,
        /// Final target if the origin is still moving.
        pending: Option<State>,
    },
    /// Free-form application message.
    Other(String),
}

/// Event kinds, used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`EventPayload::Error`].
    Error,
    /// [`EventPayload::Warning`].
    Warning,
    /// [`EventPayload::EndOfStream`].
    EndOfStream,
    /// [`EventPayload::StateChanged`].
    StateChanged,
    /// [`EventPayload::Other`].
    Other,
}

impl EventKind {
    const fn bit(self) -> u32 {
        match self {
            Self::Error => 1,
            Self::Warning => 1 << 1,
            Self::EndOfStream => 1 << 2,
            Self::StateChanged => 1 << 3,
            Self::Other => 1 << 4,
        }
    }
}

/// A set of [`EventKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(u32);

impl EventMask {
    /// Matches nothing.
    pub const NONE: Self = Self(0);
    /// Matches every kind.
    pub const ALL: Self = Self(0b1_1111);

    /// Mask covering a single kind.
    #[must_use]
    pub const fn of(kind: EventKind) -> Self {
        Self(kind.bit())
    }

    /// Errors, end-of-stream and state changes.
    #[must_use]
    pub const fn supervision() -> Self {
        Self(EventKind::Error.bit() | EventKind::EndOfStream.bit() | EventKind::StateChanged.bit())
    }

    /// Returns true if `kind` is in the set.
    #[must_use]
    pub const fn contains(self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

impl From<EventKind> for EventMask {
    fn from(kind: EventKind) -> Self {
        Self::of(kind)
    }
}

impl BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<EventKind> for EventMask {
    type Output = Self;

    fn bitor(self, rhs: EventKind) -> Self {
        Self(self.0 | rhs.bit())
    }
}

impl BitOr for EventKind {
    type Output = EventMask;

    fn bitor(self, rhs: Self) -> EventMask {
        EventMask(self.bit() | rhs.bit())
    }
}

impl BitOrAssign<EventKind> for EventMask {
    fn bitor_assign(&mut self, rhs: EventKind) {
        self.0 |= rhs.bit();
    }
}

/// An immutable status record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Process-wide sequence number assigned when the bus accepts the
    /// event, increasing in posting order. Zero until posted.
    pub seq: u64,
    /// When the event was created.
    pub at: DateTime<Utc>,
    /// Who posted it.
    pub origin: Origin,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Creates an unposted event.
    #[must_use]
    pub fn new(origin: Origin, payload: EventPayload) -> Self {
        Self {
            seq: 0,
            at: Utc::now(),
            origin,
            payload,
        }
    }

    /// Error event.
    #[must_use]
    pub fn error(origin: Origin, message: impl Into<String>, debug: Option<String>) -> Self {
        Self::new(
            origin,
            EventPayload::Error {
                message: message.into(),
                debug,
            },
        )
    }

    /// Warning event.
    #[must_use]
    pub fn warning(origin: Origin, message: impl Into<String>, debug: Option<String>) -> Self {
        Self::new(
            origin,
            EventPayload::Warning {
                message: message.into(),
                debug,
            },
        )
    }

    /// End-of-stream event.
    #[must_use]
    pub fn end_of_stream(origin: Origin) -> Self {
        Self::new(origin, EventPayload::EndOfStream)
    }

    /// State-changed event.
    #[must_use]
    pub fn state_changed(origin: Origin, old: State, new: State, pending: Option<State>) -> Self {
        Self::new(origin, EventPayload::StateChanged { old, new, pending })
    }

    /// Returns the kind of the payload.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Error { .. } => EventKind::Error,
            EventPayload::Warning { .. } => EventKind::Warning,
            EventPayload::EndOfStream => EventKind::EndOfStream,
            EventPayload::StateChanged { .. } => EventKind::StateChanged,
            EventPayload::Other(_) => EventKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_contains() {
        let mask = EventMask::supervision();
        assert!(mask.contains(EventKind::Error));
        assert!(mask.contains(EventKind::EndOfStream));
        assert!(mask.contains(EventKind::StateChanged));
        assert!(!mask.contains(EventKind::Warning));
        assert!(!mask.contains(EventKind::Other));
        assert_eq!(EventKind::Error | EventKind::EndOfStream | EventKind::StateChanged, mask);
    }

    #[test]
    fn test_mask_all_and_none() {
        for kind in [
            EventKind::Error,
            EventKind::Warning,
            EventKind::EndOfStream,
            EventKind::StateChanged,
            EventKind::Other,
        ] {
            assert!(EventMask::ALL.contains(kind));
            assert!(!EventMask::NONE.contains(kind));
        }
    }

    #[test]
    fn test_unposted_event_has_no_sequence() {
        assert_eq!(Event::end_of_stream(Origin::Graph("g".into())).seq, 0);
        assert!(next_seq() < next_seq());
    }

    #[test]
    fn test_kind_from_payload() {
        let origin = Origin::Stage("src".into());
        assert_eq!(Event::error(origin.clone(), "x", None).kind(), EventKind::Error);
        assert_eq!(
            Event::state_changed(origin.clone(), State::Null, State::Idle, None).kind(),
            EventKind::StateChanged
        );
        assert_eq!(Event::new(origin, EventPayload::Other("tag".into())).kind(), EventKind::Other);
    }
}
