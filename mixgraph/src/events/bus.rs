//! FIFO event bus with blocking, kind-filtered monitors.

use super::event::next_seq;
use super::{Event, EventMask, PollEvents, Timeout};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Counters for bus traffic.
#[derive(Debug, Default)]
pub struct BusStats {
    posted: AtomicU64,
    discarded: AtomicU64,
    filtered: AtomicU64,
    delivered: AtomicU64,
}

impl BusStats {
    /// Events accepted into the queue.
    #[must_use]
    pub fn posted(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }

    /// Events dropped because the bus was flushing or closed.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Events popped by a poll whose mask did not match them.
    #[must_use]
    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    /// Events handed to a monitor.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct Queue {
    events: VecDeque<Event>,
    flushing: bool,
    closed: bool,
}

#[derive(Debug, Default)]
struct BusInner {
    queue: Mutex<Queue>,
    available: Condvar,
    stats: BusStats,
}

/// The event channel of one graph.
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates an open, non-flushing bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps the event's sequence number and appends it. Returns false if
    /// it was discarded because the bus is flushing or closed.
    pub fn post(&self, mut event: Event) -> bool {
        let mut queue = self.inner.queue.lock();
        if queue.flushing || queue.closed {
            self.inner.stats.discarded.fetch_add(1, Ordering::Relaxed);
            trace!(origin = %event.origin, kind = ?event.kind(), "event discarded");
            return false;
        }
        event.seq = next_seq();
        queue.events.push_back(event);
        self.inner.stats.posted.fetch_add(1, Ordering::Relaxed);
        drop(queue);
        self.inner.available.notify_all();
        true
    }

    /// Enters or leaves flushing mode.
    ///
    /// Entering drops every queued event and wakes all blocked polls, which
    /// return `None`.
    pub fn set_flushing(&self, flushing: bool) {
        let mut queue = self.inner.queue.lock();
        queue.flushing = flushing;
        if flushing {
            let dropped = queue.events.len() as u64;
            queue.events.clear();
            self.inner.stats.discarded.fetch_add(dropped, Ordering::Relaxed);
            drop(queue);
            self.inner.available.notify_all();
        }
    }

    /// Returns true while the bus is flushing.
    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.inner.queue.lock().flushing
    }

    /// Closes the bus for good and wakes all blocked polls.
    pub fn close(&self) {
        let mut queue = self.inner.queue.lock();
        queue.closed = true;
        queue.events.clear();
        drop(queue);
        self.inner.available.notify_all();
    }

    /// Returns true once the bus has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.queue.lock().closed
    }

    /// Number of queued events.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().events.len()
    }

    /// Traffic counters.
    #[must_use]
    pub fn stats(&self) -> &BusStats {
        &self.inner.stats
    }

    /// Acquires a monitor handle.
    #[must_use]
    pub fn monitor(&self) -> EventMonitor {
        EventMonitor { bus: self.clone() }
    }
}

/// A polling handle on an [`EventBus`].
///
/// All monitors of a bus share its queue: an event is handed to at most one
/// of them.
#[derive(Debug, Clone)]
pub struct EventMonitor {
    bus: EventBus,
}

impl EventMonitor {
    /// Number of queued events.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.bus.pending()
    }
}

impl PollEvents for EventMonitor {
    fn poll(&mut self, timeout: Timeout, mask: EventMask) -> Option<Event> {
        let inner = &self.bus.inner;
        let deadline = match timeout {
            Timeout::After(d) => Some(Instant::now() + d),
            Timeout::Infinite | Timeout::Immediate => None,
        };

        let mut queue = inner.queue.lock();
        loop {
            if queue.flushing || queue.closed {
                return None;
            }
            while let Some(event) = queue.events.pop_front() {
                if mask.contains(event.kind()) {
                    inner.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    return Some(event);
                }
                inner.stats.filtered.fetch_add(1, Ordering::Relaxed);
                trace!(seq = event.seq, kind = ?event.kind(), "event filtered out");
            }
            match (timeout, deadline) {
                (Timeout::Immediate, _) => return None,
                (_, Some(deadline)) => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                    let _ = inner.available.wait_until(&mut queue, deadline);
                }
                (_, None) => inner.available.wait(&mut queue),
            }
        }
    }

    fn is_closed(&self) -> bool {
        let queue = self.bus.inner.queue.lock();
        queue.flushing || queue.closed
    }
}
