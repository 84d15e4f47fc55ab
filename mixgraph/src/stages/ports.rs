//! Typed input and output ports of a stage.

use crate::core::Caps;
use std::fmt;

/// Direction of data through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// Frames enter the stage.
    Input,
    /// Frames leave the stage.
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Output => "output",
        })
    }
}

/// When a port exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortPresence {
    /// Created with the stage and must be linked before Paused.
    Always,
    /// Created on demand while linking.
    Request,
}

/// A port on a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    /// Name, unique within the stage.
    pub name: String,
    /// Direction.
    pub direction: PortDirection,
    /// Presence.
    pub presence: PortPresence,
    /// Formats accepted (input) or produced (output).
    pub caps: Caps,
}

impl Port {
    /// Always-present input port.
    #[must_use]
    pub fn input(name: impl Into<String>, caps: Caps) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            presence: PortPresence::Always,
            caps,
        }
    }

    /// Always-present output port.
    #[must_use]
    pub fn output(name: impl Into<String>, caps: Caps) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            presence: PortPresence::Always,
            caps,
        }
    }

    /// Marks the port as created on request.
    #[must_use]
    pub fn requested(mut self) -> Self {
        self.presence = PortPresence::Request;
        self
    }

    /// Returns true for input ports.
    #[must_use]
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }
}

/// Generates request port names from a template such as `sink_%u`.
#[derive(Debug, Clone)]
pub struct PortTemplate {
    prefix: &'static str,
    next: u32,
}

impl PortTemplate {
    /// Creates a template whose names are `prefix` followed by a counter.
    #[must_use]
    pub const fn new(prefix: &'static str) -> Self {
        Self { prefix, next: 0 }
    }

    /// Returns the next unused name.
    pub fn next_name(&mut self) -> String {
        let name = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        name
    }
}
