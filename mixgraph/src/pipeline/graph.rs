//! Graph construction, linking and property access.

use super::streaming::Streaming;
use super::topology::{find_path, upstream_order, Link};
use crate::core::{PropertyValue, State, StateSnapshot};
use crate::errors::{ConstructionError, LinkError, PropertyError};
use crate::events::{EventBus, EventMonitor};
use crate::init::Library;
use crate::stages::{Port, PortDirection, Stage};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// A stage shared between the graph and its streaming tasks.
pub(crate) type SharedStage = Arc<Mutex<Box<dyn Stage>>>;

/// Tuning knobs of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphOptions {
    /// Frames buffered per link before the upstream stage waits.
    pub link_capacity: usize,
    /// How long teardown waits for streaming tasks to stop.
    pub shutdown_grace: Duration,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            link_capacity: 4,
            shutdown_grace: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct LifecycleState {
    pub(crate) current: State,
    pub(crate) pending: Option<State>,
    pub(crate) prerolled: bool,
    /// Start of the running clock while Active.
    pub(crate) base: Option<Instant>,
    /// Running time accumulated before the last pause.
    pub(crate) running: Duration,
}

/// State shared between the graph and its streaming tasks.
pub(crate) struct GraphCore {
    pub(crate) name: String,
    pub(crate) bus: EventBus,
    pub(crate) state: Mutex<LifecycleState>,
    pub(crate) settled: Condvar,
    /// Base instant of the running clock; `Some` only while Active.
    pub(crate) clock: watch::Sender<Option<Instant>>,
}

/// A named collection of stages and the links between their ports.
///
/// The graph owns its stages. Construction and linking happen in Null
/// state; [`request_state`](Graph::request_state) drives the graph
/// through Idle, Paused and Active.
pub struct Graph {
    id: Uuid,
    pub(crate) core: Arc<GraphCore>,
    pub(crate) stages: Vec<(String, SharedStage)>,
    pub(crate) links: Vec<Link>,
    pub(crate) streaming: Option<Streaming>,
    pub(crate) options: GraphOptions,
    _library: Library,
}

impl Graph {
    /// Creates an empty graph with default options.
    #[must_use]
    pub fn new(library: &Library, name: impl Into<String>) -> Self {
        Self::with_options(library, name, GraphOptions::default())
    }

    /// Creates an empty graph.
    #[must_use]
    pub fn with_options(library: &Library, name: impl Into<String>, options: GraphOptions) -> Self {
        let bus = EventBus::new();
        bus.set_flushing(true);
        let (clock, _) = watch::channel(None);
        let graph = Self {
            id: Uuid::new_v4(),
            core: Arc::new(GraphCore {
                name: name.into(),
                bus,
                state: Mutex::new(LifecycleState::default()),
                settled: Condvar::new(),
                clock,
            }),
            stages: Vec::new(),
            links: Vec::new(),
            streaming: None,
            options,
            _library: library.clone(),
        };
        debug!(graph = %graph.core.name, id = %graph.id, "graph created");
        graph
    }

    /// Unique id of this graph instance.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Graph name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Options the graph was created with.
    #[must_use]
    pub fn options(&self) -> GraphOptions {
        self.options
    }

    /// The graph's event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.core.bus
    }

    /// Acquires a monitor on the graph's bus.
    #[must_use]
    pub fn monitor(&self) -> EventMonitor {
        self.core.bus.monitor()
    }

    /// Current and pending state.
    #[must_use]
    pub fn state(&self) -> StateSnapshot {
        let st = self.core.state.lock();
        StateSnapshot {
            current: st.current,
            pending: st.pending,
        }
    }

    /// Waits up to `timeout` for an outstanding asynchronous transition to
    /// finish and returns the resulting state.
    #[must_use]
    pub fn wait_settled(&self, timeout: Duration) -> StateSnapshot {
        let deadline = Instant::now() + timeout;
        let mut st = self.core.state.lock();
        while st.pending.is_some() {
            if self.core.settled.wait_until(&mut st, deadline).timed_out() {
                break;
            }
        }
        StateSnapshot {
            current: st.current,
            pending: st.pending,
        }
    }

    /// Stage names in insertion order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Declared links in declaration order.
    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Runs `f` on the named stage.
    pub fn with_stage<R>(&self, name: &str, f: impl FnOnce(&dyn Stage) -> R) -> Option<R> {
        let stage = self.shared(name)?;
        let guard = stage.lock();
        Some(f(guard.as_ref()))
    }

    /// Adds a stage, taking ownership of it.
    ///
    /// # Errors
    ///
    /// Fails if the graph is not in Null state or already holds a stage
    /// with the same name.
    pub fn add(&mut self, stage: Box<dyn Stage>) -> Result<(), ConstructionError> {
        let state = self.state().current;
        if state != State::Null {
            return Err(ConstructionError::GraphNotNull {
                graph: self.core.name.clone(),
                state,
            });
        }
        let name = stage.name().to_string();
        if self.shared(&name).is_some() {
            return Err(ConstructionError::DuplicateName { name });
        }
        debug!(graph = %self.core.name, stage = %name, kind = %stage.kind(), "stage added");
        self.stages.push((name, Arc::new(Mutex::new(stage))));
        Ok(())
    }

    /// Adds stages in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn add_many(
        &mut self,
        stages: impl IntoIterator<Item = Box<dyn Stage>>,
    ) -> Result<(), ConstructionError> {
        stages.into_iter().try_for_each(|stage| self.add(stage))
    }

    /// Links a free output port of `src` to a free input port of `dst`,
    /// requesting a new input port on `dst` if needed.
    ///
    /// # Errors
    ///
    /// Fails if either stage is missing, the link would be a self link or
    /// close a cycle, no free port is left, or the caps do not intersect.
    pub fn link(&mut self, src: &str, dst: &str) -> Result<(), LinkError> {
        let (src_stage, dst_stage) = self.link_endpoints(src, dst)?;

        let src_port = self.free_port(src, &src_stage, PortDirection::Output)?;
        let (dst_port, requested) = {
            let existing = self.free_port(dst, &dst_stage, PortDirection::Input);
            match existing {
                Ok(port) => (port, false),
                Err(err) => match dst_stage.lock().request_port(PortDirection::Input) {
                    Some(port) => (port, true),
                    None => return Err(err),
                },
            }
        };

        if let Err(err) = self.check_caps(src, &src_port, dst, &dst_port) {
            if requested {
                dst_stage.lock().release_port(&dst_port.name);
            }
            return Err(err);
        }
        self.push_link(Link::new(src, src_port.name, dst, dst_port.name));
        Ok(())
    }

    /// Links two named ports.
    ///
    /// # Errors
    ///
    /// As [`link`](Self::link), plus unknown port, wrong direction and port
    /// already linked.
    pub fn link_ports(
        &mut self,
        src: &str,
        src_port: &str,
        dst: &str,
        dst_port: &str,
    ) -> Result<(), LinkError> {
        let (src_stage, dst_stage) = self.link_endpoints(src, dst)?;
        let src_port = self.named_port(src, &src_stage, src_port, PortDirection::Output)?;
        let dst_port = self.named_port(dst, &dst_stage, dst_port, PortDirection::Input)?;
        self.check_caps(src, &src_port, dst, &dst_port)?;
        self.push_link(Link::new(src, src_port.name, dst, dst_port.name));
        Ok(())
    }

    /// Links `names[0] -> names[1] -> ...`, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// See [`link`](Self::link).
    pub fn link_many(&mut self, names: &[&str]) -> Result<(), LinkError> {
        names.windows(2).try_for_each(|pair| self.link(pair[0], pair[1]))
    }

    /// Writes a stage property.
    ///
    /// Once the graph has left Idle only properties declared mutable while
    /// active may change.
    ///
    /// # Errors
    ///
    /// Fails if the stage or property is unknown, the value is invalid, or
    /// the property is not mutable in the current state.
    pub fn set_property(
        &self,
        stage: &str,
        property: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), PropertyError> {
        let shared = self.shared(stage).ok_or_else(|| PropertyError::UnknownStage {
            stage: stage.to_string(),
        })?;
        let state = self.state().current;
        let mut guard = shared.lock();
        let props = guard.properties_mut();
        let spec = props.spec(property).ok_or_else(|| PropertyError::Unknown {
            property: property.to_string(),
        })?;
        if state > State::Idle && !spec.mutable_when_active {
            return Err(PropertyError::NotMutable {
                property: property.to_string(),
                state,
            });
        }
        props.set(property, value)
    }

    /// Reads a stage property.
    #[must_use]
    pub fn property(&self, stage: &str, property: &str) -> Option<PropertyValue> {
        self.with_stage(stage, |s| s.properties().get(property).cloned())
            .flatten()
    }

    pub(crate) fn shared(&self, name: &str) -> Option<SharedStage> {
        self.stages
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, stage)| Arc::clone(stage))
    }

    /// Stages ordered so that every stage follows its upstreams.
    pub(crate) fn upstream_first(&self) -> Vec<(String, SharedStage)> {
        let names: Vec<String> = self.stages.iter().map(|(n, _)| n.clone()).collect();
        upstream_order(&names, &self.links)
            .into_iter()
            .filter_map(|name| self.shared(&name).map(|stage| (name, stage)))
            .collect()
    }

    fn link_endpoints(&self, src: &str, dst: &str) -> Result<(SharedStage, SharedStage), LinkError> {
        let state = self.state().current;
        if state != State::Null {
            return Err(LinkError::GraphNotNull {
                graph: self.core.name.clone(),
                state,
            });
        }
        let src_stage = self.shared(src).ok_or_else(|| LinkError::UnknownStage {
            stage: src.to_string(),
        })?;
        let dst_stage = self.shared(dst).ok_or_else(|| LinkError::UnknownStage {
            stage: dst.to_string(),
        })?;
        if src == dst {
            return Err(LinkError::SelfLink {
                stage: src.to_string(),
            });
        }
        if let Some(path) = find_path(&self.links, dst, src) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(src.to_string());
            cycle.extend(path);
            return Err(LinkError::Cycle { path: cycle });
        }
        Ok((src_stage, dst_stage))
    }

    fn is_linked(&self, stage: &str, port: &str) -> bool {
        self.links.iter().any(|l| l.touches(stage, port))
    }

    fn free_port(
        &self,
        name: &str,
        stage: &SharedStage,
        direction: PortDirection,
    ) -> Result<Port, LinkError> {
        let guard = stage.lock();
        guard
            .ports()
            .iter()
            .find(|p| p.direction == direction && !self.is_linked(name, &p.name))
            .cloned()
            .ok_or_else(|| LinkError::NoFreePort {
                stage: name.to_string(),
                direction,
            })
    }

    fn named_port(
        &self,
        name: &str,
        stage: &SharedStage,
        port: &str,
        direction: PortDirection,
    ) -> Result<Port, LinkError> {
        let found = stage.lock().port(port).cloned().ok_or_else(|| LinkError::UnknownPort {
            stage: name.to_string(),
            port: port.to_string(),
        })?;
        if found.direction != direction {
            return Err(LinkError::WrongDirection {
                stage: name.to_string(),
                port: port.to_string(),
                expected: direction,
            });
        }
        if self.is_linked(name, port) {
            return Err(LinkError::PortAlreadyLinked {
                stage: name.to_string(),
                port: port.to_string(),
            });
        }
        Ok(found)
    }

    fn check_caps(&self, src: &str, src_port: &Port, dst: &str, dst_port: &Port) -> Result<(), LinkError> {
        if src_port.caps.can_intersect(&dst_port.caps) {
            return Ok(());
        }
        Err(LinkError::IncompatibleCaps {
            src: format!("{src}.{}", src_port.name),
            dst: format!("{dst}.{}", dst_port.name),
            src_caps: src_port.caps.clone(),
            dst_caps: dst_port.caps.clone(),
        })
    }

    fn push_link(&mut self, link: Link) {
        debug!(graph = %self.core.name, link = %link, "linked");
        self.links.push(link);
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("name", &self.core.name)
            .field("state", &self.state())
            .field("stages", &self.stage_names())
            .field("links", &self.links.len())
            .finish()
    }
}
