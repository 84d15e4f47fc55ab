//! Display sink.

use super::{Port, Stage, StageFactory, DISPLAY_SINK};
use crate::core::{Caps, Frame, PropertyBag, PropertySpec, State, StateChange, VideoFormat};
use crate::errors::{ConstructionError, StageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Where a [`DisplaySink`] presents frames.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayTarget {
    /// Whatever output the host offers; always available.
    #[default]
    Auto,
    /// No output; frames are counted and dropped.
    Headless,
    /// A device node that must exist.
    Device(PathBuf),
}

impl DisplayTarget {
    fn check(&self) -> Result<(), String> {
        match self {
            Self::Device(path) if !path.exists() => {
                Err(format!("display device {} does not exist", path.display()))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for DisplayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Headless => f.write_str("headless"),
            Self::Device(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for DisplayTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err("empty display target".to_string()),
            "auto" => Ok(Self::Auto),
            "headless" => Ok(Self::Headless),
            path => Ok(Self::Device(PathBuf::from(path))),
        }
    }
}

/// Shared counter of rendered frames.
#[derive(Debug, Clone, Default)]
pub struct RenderStats {
    rendered: Arc<AtomicU64>,
}

impl RenderStats {
    /// Frames rendered so far.
    #[must_use]
    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }
}

/// Sink presenting frames on a [`DisplayTarget`].
///
/// With `sync` set, frames are held until their timestamp.
#[derive(Debug)]
pub struct DisplaySink {
    name: String,
    target: DisplayTarget,
    ports: Vec<Port>,
    properties: PropertyBag,
    stats: RenderStats,
    open: bool,
}

impl DisplaySink {
    /// Creates a sink for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::ResourceUnavailable`] if the target is a
    /// device that does not exist.
    pub fn new(name: &str, target: DisplayTarget) -> Result<Self, ConstructionError> {
        target
            .check()
            .map_err(|reason| ConstructionError::ResourceUnavailable {
                kind: DISPLAY_SINK.to_string(),
                name: name.to_string(),
                resource: "display".to_string(),
                reason,
            })?;
        Ok(Self {
            name: name.to_string(),
            target,
            ports: vec![Port::input(
                "sink",
                Caps::new([VideoFormat::Rgba, VideoFormat::Bgrx]),
            )],
            properties: PropertyBag::new(vec![PropertySpec::bool(
                "sync",
                "Render frames at their timestamp",
                true,
            )]),
            stats: RenderStats::default(),
            open: false,
        })
    }

    /// Factory creating sinks for `target`.
    #[must_use]
    pub fn factory(target: DisplayTarget) -> StageFactory {
        Box::new(move |name| Ok(Box::new(Self::new(name, target.clone())?)))
    }

    /// Handle on the render counter.
    #[must_use]
    pub fn stats(&self) -> RenderStats {
        self.stats.clone()
    }

    /// The configured target.
    #[must_use]
    pub fn target(&self) -> &DisplayTarget {
        &self.target
    }
}

impl Stage for DisplaySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        DISPLAY_SINK
    }

    fn ports(&self) -> &[Port] {
        &self.ports
    }

    fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    fn change_state(&mut self, change: StateChange) -> Result<(), StageError> {
        match (change.from, change.to) {
            (State::Null, State::Idle) => {
                self.target.check().map_err(|reason| {
                    StageError::new("Could not open display").with_debug(reason)
                })?;
                self.open = true;
                debug!(stage = %self.name, target = %self.target, "display opened");
            }
            (State::Idle, State::Null) => {
                self.open = false;
                debug!(stage = %self.name, rendered = self.stats.rendered(), "display closed");
            }
            _ => {}
        }
        Ok(())
    }

    fn render(&mut self, frame: &Frame) -> Result<(), StageError> {
        if !self.open {
            return Err(StageError::new("Display is not open"));
        }
        self.stats.rendered.fetch_add(1, Ordering::Relaxed);
        trace!(stage = %self.name, seq = frame.seq, pts = ?frame.pts, layers = frame.layers, "rendered");
        Ok(())
    }

    fn sync_to_clock(&self) -> bool {
        self.properties.bool("sync").unwrap_or(true)
    }
}
