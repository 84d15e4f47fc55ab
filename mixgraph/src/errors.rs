//! Error types for mixgraph.
//!
//! The taxonomy follows the phases of a session:
//!
//! - [`ConstructionError`]: a stage could not be created or added.
//! - [`LinkError`]: two ports could not be connected.
//! - [`ActivationError`]: the lifecycle controller could not reach a state.
//! - [`PropertyError`]: a property write was rejected.
//! - [`StageError`]: a stage refused a state change or failed while streaming.
//! - [`ConfigError`]: session configuration could not be loaded.
//!
//! [`MixgraphError`] wraps all of them for callers that do not care which
//! phase failed.

use crate::core::{Caps, State, StateChange};
use crate::stages::PortDirection;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for mixgraph operations.
#[derive(Debug, Error)]
pub enum MixgraphError {
    /// A stage could not be constructed.
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// A link could not be declared.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// A state transition failed.
    #[error(transparent)]
    Activation(#[from] ActivationError),

    /// A property write was rejected.
    #[error(transparent)]
    Property(#[from] PropertyError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MixgraphError {
    /// Returns a short stable label (snake_case) for use in logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Construction(_) => "construction_error",
            Self::Link(_) => "link_error",
            Self::Activation(_) => "activation_error",
            Self::Property(_) => "property_error",
            Self::Config(_) => "config_error",
        }
    }
}

/// Error raised when a stage cannot be created or added to a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// No factory is registered for the kind.
    #[error("no stage kind '{kind}' is registered")]
    UnknownKind {
        /// The requested kind.
        kind: String,
    },

    /// The stage needs a resource that is not available.
    #[error("stage '{name}' ({kind}) could not acquire {resource}: {reason}")]
    ResourceUnavailable {
        /// Stage kind.
        kind: String,
        /// Stage name.
        name: String,
        /// The missing resource.
        resource: String,
        /// Why it is unavailable.
        reason: String,
    },

    /// A stage with the same name is already in the graph.
    #[error("graph already contains a stage named '{name}'")]
    DuplicateName {
        /// The duplicated name.
        name: String,
    },

    /// Stages can only be added while the graph is in Null state.
    #[error("stages cannot be added to graph '{graph}' in state {state}")]
    GraphNotNull {
        /// Graph name.
        graph: String,
        /// Current graph state.
        state: State,
    },
}

/// Error raised when a link cannot be declared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The graph has no stage with this name.
    #[error("graph has no stage named '{stage}'")]
    UnknownStage {
        /// The missing stage.
        stage: String,
    },

    /// The stage has no port with this name.
    #[error("stage '{stage}' has no port named '{port}'")]
    UnknownPort {
        /// Stage name.
        stage: String,
        /// The missing port.
        port: String,
    },

    /// The named port points the wrong way.
    #[error("port '{stage}.{port}' is not an {expected} port")]
    WrongDirection {
        /// Stage name.
        stage: String,
        /// Port name.
        port: String,
        /// The direction the link needed.
        expected: PortDirection,
    },

    /// The port already takes part in a link.
    #[error("port '{stage}.{port}' is already linked")]
    PortAlreadyLinked {
        /// Stage name.
        stage: String,
        /// Port name.
        port: String,
    },

    /// The stage has no unlinked port left and cannot create one.
    #[error("stage '{stage}' has no free {direction} port")]
    NoFreePort {
        /// Stage name.
        stage: String,
        /// Direction searched.
        direction: PortDirection,
    },

    /// The two ports share no format.
    #[error("cannot link '{src}' to '{dst}': {src_caps} and {dst_caps} do not intersect")]
    IncompatibleCaps {
        /// Upstream `stage.port`.
        src: String,
        /// Downstream `stage.port`.
        dst: String,
        /// Upstream caps.
        src_caps: Caps,
        /// Downstream caps.
        dst_caps: Caps,
    },

    /// Source and destination are the same stage.
    #[error("stage '{stage}' cannot be linked to itself")]
    SelfLink {
        /// Stage name.
        stage: String,
    },

    /// The link would close a cycle.
    #[error("link would create a cycle: {}", path.join(" -> "))]
    Cycle {
        /// Stages forming the cycle.
        path: Vec<String>,
    },

    /// Links can only be declared while the graph is in Null state.
    #[error("links cannot be declared on graph '{graph}' in state {state}")]
    GraphNotNull {
        /// Graph name.
        graph: String,
        /// Current graph state.
        state: State,
    },
}

/// Error raised when a state transition fails outright.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationError {
    /// A stage refused the state change.
    #[error("stage '{stage}' rejected {change}: {source}")]
    Rejected {
        /// Stage name.
        stage: String,
        /// The refused change.
        change: StateChange,
        /// The stage's reason.
        #[source]
        source: StageError,
    },

    /// An always-present port has no link.
    #[error("port '{stage}.{port}' is not linked")]
    UnlinkedPort {
        /// Stage name.
        stage: String,
        /// Port name.
        port: String,
    },

    /// No common format could be fixed for a link.
    #[error("could not negotiate a format for link {link}")]
    NotNegotiated {
        /// The link, as `a.src -> b.sink`.
        link: String,
    },

    /// Another transition is still outstanding.
    #[error("transition to {pending} still in progress, cannot request {requested}")]
    TransitionInProgress {
        /// Target of the outstanding transition.
        pending: State,
        /// Target of the refused request.
        requested: State,
    },

    /// The streaming runtime could not be started.
    #[error("streaming runtime failed to start: {reason}")]
    Runtime {
        /// Underlying reason.
        reason: String,
    },
}

/// Error raised when a property write is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    /// The graph has no stage with this name.
    #[error("graph has no stage named '{stage}'")]
    UnknownStage {
        /// The missing stage.
        stage: String,
    },

    /// The stage declares no such property.
    #[error("unknown property '{property}'")]
    Unknown {
        /// Property name.
        property: String,
    },

    /// The value has the wrong type.
    #[error("property '{property}' expects {expected}, got {found}")]
    TypeMismatch {
        /// Property name.
        property: String,
        /// Declared type.
        expected: &'static str,
        /// Supplied type.
        found: &'static str,
    },

    /// The value is outside the declared range.
    #[error("value {value} for property '{property}' is outside {min}..={max}")]
    OutOfRange {
        /// Property name.
        property: String,
        /// Supplied value.
        value: i64,
        /// Minimum.
        min: i64,
        /// Maximum.
        max: i64,
    },

    /// The value names no variant of the enum.
    #[error("'{value}' is not a valid {type_name} for property '{property}'")]
    InvalidEnum {
        /// Property name.
        property: String,
        /// Enum type.
        type_name: &'static str,
        /// Supplied value.
        value: String,
    },

    /// The property cannot change in the graph's current state.
    #[error("property '{property}' cannot be changed in state {state}")]
    NotMutable {
        /// Property name.
        property: String,
        /// Graph state at the time of the write.
        state: State,
    },
}

/// Failure reported by a stage implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StageError {
    /// Human-readable message.
    pub message: String,
    /// Optional diagnostic detail.
    pub debug: Option<String>,
}

impl StageError {
    /// Creates a stage error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            debug: None,
        }
    }

    /// Attaches diagnostic detail.
    #[must_use]
    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = Some(debug.into());
        self
    }
}

/// Error raised when session configuration cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for the config schema.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field has an unusable value.
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Why it is invalid.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::VideoFormat;

    #[test]
    fn test_link_error_display() {
        let err = LinkError::IncompatibleCaps {
            src: "mixer.src".into(),
            dst: "sink.sink".into(),
            src_caps: Caps::new([VideoFormat::Ayuv]),
            dst_caps: Caps::new([VideoFormat::Rgba]),
        };
        assert_eq!(
            err.to_string(),
            "cannot link 'mixer.src' to 'sink.sink': video/x-raw(format={AYUV}) and video/x-raw(format={RGBA}) do not intersect"
        );

        let cycle = LinkError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(cycle.to_string(), "link would create a cycle: a -> b -> a");
    }

    #[test]
    fn test_activation_error_source() {
        use std::error::Error as _;

        let err = ActivationError::Rejected {
            stage: "sink".into(),
            change: StateChange::new(State::Null, State::Idle),
            source: StageError::new("no display").with_debug("/dev/fb9 missing"),
        };
        assert_eq!(err.to_string(), "stage 'sink' rejected NULL -> IDLE: no display");
        assert_eq!(err.source().map(ToString::to_string), Some("no display".to_string()));
    }

    #[test]
    fn test_umbrella_labels() {
        let err: MixgraphError = ConstructionError::UnknownKind { kind: "x".into() }.into();
        assert_eq!(err.as_label(), "construction_error");
        let err: MixgraphError = PropertyError::Unknown { property: "p".into() }.into();
        assert_eq!(err.as_label(), "property_error");
    }
}
