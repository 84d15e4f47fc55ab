//! Status events and the bus that carries them.
//!
//! Stages and graphs post [`Event`]s to a graph's [`EventBus`]. Callers pull
//! them through an [`EventMonitor`], blocking until an event whose kind is
//! in the requested [`EventMask`] arrives, the timeout elapses, or the bus
//! is flushed.

mod bus;
mod event;

pub use bus::{BusStats, EventBus, EventMonitor};
pub use event::{Event, EventKind, EventMask, EventPayload, Origin};

use std::time::Duration;

/// How long a poll may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Block until an event arrives or the bus is flushed.
    #[default]
    Infinite,
    /// Never block.
    Immediate,
    /// Block for at most this long.
    After(Duration),
}

/// A source of events that can be polled with a kind filter.
pub trait PollEvents {
    /// Returns the next event whose kind is in `mask`.
    ///
    /// Events of other kinds found on the way are dropped. Returns `None`
    /// when the timeout elapses or the source is flushed or closed.
    fn poll(&mut self, timeout: Timeout, mask: EventMask) -> Option<Event>;

    /// Returns true if the source will never yield another event.
    fn is_closed(&self) -> bool {
        false
    }
}
