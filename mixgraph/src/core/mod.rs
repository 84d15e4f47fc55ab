//! Core domain model types for mixgraph.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Execution states and transitions
//! - Port capabilities (video formats)
//! - Typed properties
//! - Frame descriptors

mod caps;
mod frame;
mod property;
mod state;

pub use caps::{Caps, VideoFormat};
pub use frame::{Frame, Framerate};
pub use property::{EnumValue, PropertyBag, PropertyEnum, PropertySpec, PropertyType, PropertyValue};
pub use state::{State, StateChange, StateSnapshot, Transition};
