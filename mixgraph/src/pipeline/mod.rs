//! Graph construction, lifecycle and streaming.
//!
//! This module provides:
//! - [`Graph`]: owned stages plus the links between their ports
//! - The lifecycle controller driving a graph from Null to Active and back
//! - The streaming engine moving frames while the graph is Paused or Active

mod graph;
mod lifecycle;
mod streaming;
mod topology;

#[cfg(test)]
mod integration_tests;

pub use graph::{Graph, GraphOptions};
pub use topology::Link;

use crate::core::{State, Transition};
use crate::errors::ActivationError;

/// Something whose execution state can be driven.
///
/// Implemented by [`Graph`]; the session code is written against this
/// trait so tests can substitute a recording double.
pub trait Lifecycle {
    /// Requests a state change. See [`Graph::request_state`].
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is rejected.
    fn request_state(&mut self, target: State) -> Result<Transition, ActivationError>;

    /// The state currently reached.
    fn current_state(&self) -> State;
}
