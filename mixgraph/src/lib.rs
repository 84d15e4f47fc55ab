//! # Mixgraph
//!
//! Declares a graph of video processing stages, drives it through its
//! playback lifecycle and supervises the events it emits until the stream
//! ends or fails.
//!
//! Mixgraph provides:
//!
//! - **Stages and graphs**: typed ports, caps negotiation and typed properties
//! - **Lifecycle control**: Null, Idle, Paused and Active with asynchronous preroll
//! - **Event supervision**: a blocking, kind-filtered bus and a supervisor loop
//! - **Guaranteed teardown**: every session returns its graph to Null
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mixgraph::prelude::*;
//!
//! let library = Library::init();
//! let config = SessionConfig::default();
//! let outcome = run_session(&library, &config, &ConsoleReporter);
//! std::process::exit(outcome.exit.code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod report;
pub mod session;
pub mod stages;
pub mod supervisor;
pub mod testing;

mod init;

pub use init::{is_initialized, Library};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::core::{
        Caps, Frame, Framerate, PropertyEnum, PropertyValue, State, StateChange, StateSnapshot,
        Transition, VideoFormat,
    };
    pub use crate::errors::{
        ActivationError, ConfigError, ConstructionError, LinkError, MixgraphError, PropertyError,
        StageError,
    };
    pub use crate::events::{
        Event, EventBus, EventKind, EventMask, EventMonitor, EventPayload, Origin, PollEvents,
        Timeout,
    };
    pub use crate::pipeline::{Graph, GraphOptions, Lifecycle, Link};
    pub use crate::report::{ConsoleReporter, Reporter};
    pub use crate::session::{build_scene, run_graph, run_session, Exit, Outcome, RunPolicy};
    pub use crate::stages::{
        AlphaMethod, DisplayTarget, Pattern, Port, PortDirection, Stage, StageRegistry,
    };
    pub use crate::supervisor::{Supervisor, SupervisorState, Termination};
    pub use crate::{is_initialized, Library};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
