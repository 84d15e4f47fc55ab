//! Stage trait and the built-in stage kinds.
//!
//! A stage is an opaque processing unit with typed ports and a property
//! bag. Graphs drive stages through state changes and, while streaming,
//! call [`Stage::produce`], [`Stage::process`] or [`Stage::render`]
//! depending on the stage's [`StageRole`].

mod alpha;
mod compositor;
mod convert;
mod display;
mod pattern;
mod ports;
mod registry;

pub use alpha::{AlphaKey, AlphaMethod};
pub use compositor::Compositor;
pub use convert::FormatConverter;
pub use display::{DisplaySink, DisplayTarget, RenderStats};
pub use pattern::{Pattern, PatternSource};
pub use ports::{Port, PortDirection, PortPresence, PortTemplate};
pub use registry::{StageFactory, StageRegistry};

use crate::core::{Frame, PropertyBag, StateChange};
use crate::errors::StageError;
use std::fmt::Debug;

/// Kind identifier of [`PatternSource`].
pub const PATTERN_SOURCE: &str = "source-pattern-generator";
/// Kind identifier of [`AlphaKey`].
pub const ALPHA_KEY: &str = "alpha-key";
/// Kind identifier of [`Compositor`].
pub const COMPOSITOR: &str = "compositor";
/// Kind identifier of [`FormatConverter`].
pub const FORMAT_CONVERTER: &str = "format-converter";
/// Kind identifier of [`DisplaySink`].
pub const DISPLAY_SINK: &str = "sink-display";

/// How a stage takes part in streaming, derived from its ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageRole {
    /// Outputs only.
    Source,
    /// Inputs and outputs.
    Filter,
    /// Inputs only.
    Sink,
}

/// Trait for graph stages.
///
/// Only [`name`](Stage::name), [`kind`](Stage::kind),
/// [`ports`](Stage::ports) and the property accessors are required; the
/// streaming hooks default to a passthrough that accepts everything.
pub trait Stage: Send + Debug {
    /// Returns the name of the stage, unique within its graph.
    fn name(&self) -> &str;

    /// Returns the kind identifier the stage was created from.
    fn kind(&self) -> &str;

    /// Returns the current ports, including requested ones.
    fn ports(&self) -> &[Port];

    /// Looks up a port by name.
    fn port(&self, name: &str) -> Option<&Port> {
        self.ports().iter().find(|p| p.name == name)
    }

    /// Role derived from the port directions.
    fn role(&self) -> StageRole {
        let inputs = self.ports().iter().any(Port::is_input);
        let outputs = self.ports().iter().any(|p| !p.is_input());
        match (inputs, outputs) {
            (false, _) => StageRole::Source,
            (true, true) => StageRole::Filter,
            (true, false) => StageRole::Sink,
        }
    }

    /// Creates a new port on demand. Returns `None` if the stage has no
    /// request ports in that direction.
    fn request_port(&mut self, _direction: PortDirection) -> Option<Port> {
        None
    }

    /// Removes a requested port. Returns false if there was none.
    fn release_port(&mut self, _name: &str) -> bool {
        false
    }

    /// Returns the property bag.
    fn properties(&self) -> &PropertyBag;

    /// Returns the property bag for writing.
    fn properties_mut(&mut self) -> &mut PropertyBag;

    /// Performs one state step. An error rejects the change.
    fn change_state(&mut self, _change: StateChange) -> Result<(), StageError> {
        Ok(())
    }

    /// Source hook: produces frame number `seq`, or `None` at end of stream.
    fn produce(&mut self, _seq: u64) -> Result<Option<Frame>, StageError> {
        Ok(None)
    }

    /// Filter hook: consumes a frame received on `port`.
    fn process(&mut self, _port: &str, frame: Frame) -> Result<Vec<Frame>, StageError> {
        Ok(vec![frame])
    }

    /// Whether the stage is ready to take another frame on `port`.
    ///
    /// Streaming leaves frames on a link's channel while this returns false,
    /// so the upstream stage blocks once the channel is full.
    fn wants_input(&self, _port: &str) -> bool {
        true
    }

    /// Filter hook: `port` received end of stream. Returns frames still
    /// held back by the stage.
    fn end_of_stream(&mut self, _port: &str) -> Result<Vec<Frame>, StageError> {
        Ok(Vec::new())
    }

    /// Sink hook: presents a frame.
    fn render(&mut self, _frame: &Frame) -> Result<(), StageError> {
        Ok(())
    }

    /// Sink hook: whether rendering waits for each frame's timestamp.
    fn sync_to_clock(&self) -> bool {
        false
    }
}
