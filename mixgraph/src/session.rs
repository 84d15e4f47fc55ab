//! The compositing session: build the scene, activate, supervise, tear down.
//!
//! Two pattern sources feed a compositor, the foreground through an alpha
//! key. The composite is converted and shown on a display sink:
//!
//! ```text
//! sourceBG ------------------> mixer -> convert -> sink
//! sourceFG -> alpha ---------^
//! ```

use crate::config::SessionConfig;
use crate::core::{PropertyEnum, State};
use crate::errors::MixgraphError;
use crate::events::{PollEvents, Timeout};
use crate::init::Library;
use crate::pipeline::{Graph, Lifecycle};
use crate::report::Reporter;
use crate::stages::{DisplaySink, ALPHA_KEY, COMPOSITOR, FORMAT_CONVERTER, PATTERN_SOURCE};
use crate::supervisor::{Supervisor, Termination};
use std::process::ExitCode;
use tracing::{debug, info, warn};

/// Background source.
pub const SOURCE_BG: &str = "sourceBG";
/// Foreground source.
pub const SOURCE_FG: &str = "sourceFG";
/// Alpha key applied to the foreground.
pub const ALPHA: &str = "alpha";
/// Compositor.
pub const MIXER: &str = "mixer";
/// Format converter.
pub const CONVERT: &str = "convert";
/// Display sink.
pub const SINK: &str = "sink";

const CREATE_FAILED: &str = "Not all elements could be created.";
const LINK_FAILED: &str = "Elements could not be linked.";
const ACTIVATE_FAILED: &str = "Unable to set the pipeline to the playing state.";

/// Process outcome of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// End of stream, or a runtime error without strict exit.
    Success,
    /// A runtime error with strict exit enabled.
    RuntimeError,
    /// Construction, linking or activation failed.
    SetupFailed,
}

impl Exit {
    /// The numeric status, as a C program would return it.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::RuntimeError => 1,
            Self::SetupFailed => -1,
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        match exit {
            Exit::Success => Self::SUCCESS,
            Exit::RuntimeError => Self::from(1),
            Exit::SetupFailed => Self::from(255),
        }
    }
}

/// How a supervised run is driven and judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunPolicy {
    /// Bound on each supervisor poll.
    pub timeout: Timeout,
    /// Exit nonzero when the run ends with an error event.
    pub strict_exit: bool,
}

impl RunPolicy {
    /// Policy derived from a session configuration.
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            timeout: config.poll_timeout().map_or(Timeout::Infinite, Timeout::After),
            strict_exit: config.strict_exit,
        }
    }

    /// Maps a termination to an exit status.
    #[must_use]
    pub fn exit_for(&self, termination: &Termination) -> Exit {
        match termination {
            Termination::EndOfStream | Termination::Closed => Exit::Success,
            Termination::Error { .. } | Termination::TimedOut if self.strict_exit => {
                Exit::RuntimeError
            }
            Termination::Error { .. } | Termination::TimedOut => Exit::Success,
        }
    }
}

/// Result of [`run_graph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Process outcome.
    pub exit: Exit,
    /// How supervision ended; `None` if activation failed.
    pub termination: Option<Termination>,
}

/// Requests Null on its target when dropped, including during unwinding.
struct TeardownGuard<'a, L: Lifecycle + ?Sized> {
    target: &'a mut L,
}

impl<'a, L: Lifecycle + ?Sized> TeardownGuard<'a, L> {
    fn new(target: &'a mut L) -> Self {
        Self { target }
    }

    fn target(&mut self) -> &mut L {
        self.target
    }
}

impl<L: Lifecycle + ?Sized> Drop for TeardownGuard<'_, L> {
    fn drop(&mut self) {
        match self.target.request_state(State::Null) {
            Ok(_) => debug!("teardown complete"),
            Err(err) => warn!(error = %err, "teardown failed"),
        }
    }
}

/// Creates, configures and links the six scene stages.
///
/// The display sink is built directly for the configured target, so an
/// unavailable device fails here and the library's registry is left as is.
///
/// # Errors
///
/// Returns the first construction, property or link error.
pub fn build_scene(library: &Library, config: &SessionConfig) -> Result<Graph, MixgraphError> {
    let mut stages = [
        (PATTERN_SOURCE, SOURCE_BG),
        (PATTERN_SOURCE, SOURCE_FG),
        (ALPHA_KEY, ALPHA),
        (COMPOSITOR, MIXER),
        (FORMAT_CONVERTER, CONVERT),
    ]
    .into_iter()
    .map(|(kind, name)| library.create_stage(kind, name))
    .collect::<Result<Vec<_>, _>>()?;
    stages.push(Box::new(DisplaySink::new(SINK, config.display.clone())?));

    let mut graph = Graph::with_options(library, config.graph_name.clone(), config.graph_options());
    graph.add_many(stages)?;
    configure(&graph, config)?;

    graph.link_many(&[SOURCE_BG, MIXER])?;
    graph.link_many(&[SOURCE_FG, ALPHA, MIXER])?;
    graph.link_many(&[MIXER, CONVERT, SINK])?;

    debug!(graph = %graph.name(), links = graph.links().len(), "scene built");
    Ok(graph)
}

fn configure(graph: &Graph, config: &SessionConfig) -> Result<(), MixgraphError> {
    let num_buffers = config.num_buffers.map_or(-1, i64::from);
    for (source, pattern) in [(SOURCE_BG, config.background), (SOURCE_FG, config.foreground)] {
        graph.set_property(source, "pattern", pattern.to_enum_value())?;
        graph.set_property(source, "num-buffers", num_buffers)?;
        graph.set_property(source, "framerate", config.framerate)?;
        graph.set_property(source, "width", config.width)?;
        graph.set_property(source, "height", config.height)?;
    }

    let [r, g, b] = config.key_color;
    graph.set_property(ALPHA, "method", config.alpha_method.to_enum_value())?;
    graph.set_property(ALPHA, "target-r", r)?;
    graph.set_property(ALPHA, "target-g", g)?;
    graph.set_property(ALPHA, "target-b", b)?;

    graph.set_property(SINK, "sync", config.sync)?;
    Ok(())
}

/// Activates `graph`, supervises `events` and always tears down.
///
/// Null is requested exactly once on every path, including a panic in
/// supervision.
pub fn run_graph<L, M>(
    graph: &mut L,
    events: &mut M,
    graph_name: &str,
    reporter: &dyn Reporter,
    policy: RunPolicy,
) -> Outcome
where
    L: Lifecycle + ?Sized,
    M: PollEvents,
{
    let mut guard = TeardownGuard::new(graph);

    if let Err(err) = guard.target().request_state(State::Active) {
        warn!(graph = %graph_name, error = %err, "activation failed");
        reporter.diagnostic(ACTIVATE_FAILED);
        return Outcome {
            exit: Exit::SetupFailed,
            termination: None,
        };
    }

    let mut supervisor = Supervisor::new(graph_name, reporter).with_timeout(policy.timeout);
    let termination = supervisor.run(events);
    drop(guard);

    let exit = policy.exit_for(&termination);
    info!(graph = %graph_name, exit = exit.code(), "session finished");
    Outcome {
        exit,
        termination: Some(termination),
    }
}

/// Builds the scene from `config` and runs it to completion.
pub fn run_session(library: &Library, config: &SessionConfig, reporter: &dyn Reporter) -> Outcome {
    let mut graph = match build_scene(library, config) {
        Ok(graph) => graph,
        Err(err) => {
            warn!(error = %err, label = err.as_label(), "scene setup failed");
            reporter.diagnostic(match err {
                MixgraphError::Link(_) => LINK_FAILED,
                _ => CREATE_FAILED,
            });
            return Outcome {
                exit: Exit::SetupFailed,
                termination: None,
            };
        }
    };

    info!(graph = %graph.name(), id = %graph.id(), "session starting");
    let mut monitor = graph.monitor();
    let name = graph.name().to_string();
    run_graph(&mut graph, &mut monitor, &name, reporter, RunPolicy::from_config(config))
}
