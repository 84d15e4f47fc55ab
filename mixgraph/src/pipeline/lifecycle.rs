//! State transitions of a graph.
//!
//! Upward requests step one level at a time, calling every stage sinks
//! first. Paused to Active completes asynchronously once every sink has
//! prerolled. Downward requests never fail: stage errors are logged and
//! the graph keeps stepping down.

use super::graph::{Graph, GraphCore, LifecycleState, SharedStage};
use super::streaming::Streaming;
use super::Lifecycle;
use crate::core::{State, StateChange, Transition};
use crate::errors::ActivationError;
use crate::events::{Event, Origin};
use crate::stages::PortPresence;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

impl GraphCore {
    fn graph_origin(&self) -> Origin {
        Origin::Graph(self.name.clone())
    }

    fn commit(&self, st: &mut LifecycleState, change: StateChange, pending: Option<State>) {
        st.current = change.to;
        debug!(graph = %self.name, change = %change, pending = ?pending, "graph state changed");
        self.bus.post(Event::state_changed(
            self.graph_origin(),
            change.from,
            change.to,
            pending,
        ));
    }

    /// Applies `change` to every stage in order. On rejection the stages
    /// already changed are moved back and an error event is posted.
    fn change_stages(
        &self,
        order: &[(String, SharedStage)],
        change: StateChange,
        pending: Option<State>,
    ) -> Result<(), ActivationError> {
        for (idx, (name, stage)) in order.iter().enumerate() {
            let result = stage.lock().change_state(change);
            if let Err(source) = result {
                warn!(graph = %self.name, stage = %name, change = %change, error = %source, "stage rejected state change");
                let back = StateChange::new(change.to, change.from);
                for (done, stage) in order[..idx].iter().rev() {
                    let undone = stage.lock().change_state(back);
                    if let Err(err) = undone {
                        warn!(stage = %done, change = %back, error = %err, "rollback failed");
                    }
                }
                self.bus.post(Event::error(
                    Origin::Stage(name.clone()),
                    source.message.clone(),
                    source.debug.clone(),
                ));
                return Err(ActivationError::Rejected {
                    stage: name.clone(),
                    change,
                    source,
                });
            }
        }
        self.post_stage_changes(order, change, pending);
        Ok(())
    }

    fn change_stages_tolerant(
        &self,
        order: &[(String, SharedStage)],
        change: StateChange,
        pending: Option<State>,
    ) {
        for (name, stage) in order {
            let result = stage.lock().change_state(change);
            if let Err(err) = result {
                warn!(graph = %self.name, stage = %name, change = %change, error = %err, "ignoring stage error during shutdown");
            }
        }
        self.post_stage_changes(order, change, pending);
    }

    fn post_stage_changes(
        &self,
        order: &[(String, SharedStage)],
        change: StateChange,
        pending: Option<State>,
    ) {
        for (name, _) in order {
            self.bus.post(Event::state_changed(
                Origin::Stage(name.clone()),
                change.from,
                change.to,
                pending,
            ));
        }
    }

    /// Performs Paused to Active and starts the running clock.
    fn activate(
        &self,
        st: &mut LifecycleState,
        sinks_first: &[(String, SharedStage)],
    ) -> Result<(), ActivationError> {
        let change = StateChange::new(State::Paused, State::Active);
        let result = self.change_stages(sinks_first, change, None);
        st.pending = None;
        if result.is_ok() {
            let now = Instant::now();
            let base = now.checked_sub(st.running).unwrap_or(now);
            st.base = Some(base);
            // Committed before the clock starts so the graph's Active event
            // precedes anything the sinks post.
            self.commit(st, change, None);
            self.clock.send_replace(Some(base));
        }
        self.settled.notify_all();
        result
    }

    fn pause(&self, st: &mut LifecycleState, sinks_first: &[(String, SharedStage)], pending: Option<State>) {
        if let Some(base) = st.base.take() {
            st.running = base.elapsed();
        }
        self.clock.send_replace(None);
        let change = StateChange::new(State::Active, State::Paused);
        self.change_stages_tolerant(sinks_first, change, pending);
        self.commit(st, change, pending);
    }

    /// Called by the streaming engine once every sink holds a frame.
    pub(crate) fn complete_preroll(&self, sinks_first: &[(String, SharedStage)]) {
        let mut st = self.state.lock();
        st.prerolled = true;
        if st.current != State::Paused || st.pending != Some(State::Active) {
            return;
        }
        debug!(graph = %self.name, "prerolled, completing activation");
        if let Err(err) = self.activate(&mut st, sinks_first) {
            warn!(graph = %self.name, error = %err, "asynchronous activation failed");
        }
    }
}

impl Graph {
    /// Requests a state change.
    ///
    /// Upward requests return [`Transition::Async`] when Active has to wait
    /// for the sinks to preroll; the graph then posts the final
    /// state-changed event itself. Requests for Null always succeed.
    ///
    /// Must not be called from inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails if a stage rejects a step, validation or format negotiation
    /// fails, the streaming runtime cannot start, or another transition is
    /// still pending.
    pub fn request_state(&mut self, target: State) -> Result<Transition, ActivationError> {
        if target == State::Null {
            self.teardown();
            return Ok(Transition::Success);
        }

        let core = Arc::clone(&self.core);
        let mut st = core.state.lock();
        if let Some(pending) = st.pending {
            return Err(ActivationError::TransitionInProgress {
                pending,
                requested: target,
            });
        }
        if target < st.current {
            drop(st);
            self.step_down(target);
            return Ok(Transition::Success);
        }

        while let Some(next) = st.current.step_toward(target) {
            let change = StateChange::new(st.current, next);
            let pending = (next != target).then_some(target);
            let sinks_first = self.sinks_first();
            debug!(graph = %core.name, change = %change, "stepping");

            match next {
                State::Idle => {
                    core.bus.set_flushing(false);
                    core.change_stages(&sinks_first, change, pending)?;
                    core.commit(&mut st, change, pending);
                }
                State::Paused => {
                    if let Err(err) = self.validate().and_then(|()| self.negotiate()) {
                        core.bus.post(Event::error(core.graph_origin(), err.to_string(), None));
                        return Err(err);
                    }
                    core.change_stages(&sinks_first, change, pending)?;
                    st.prerolled = false;
                    st.running = Duration::ZERO;
                    let streaming = match Streaming::start(
                        &core,
                        &self.stages,
                        &self.links,
                        sinks_first.clone(),
                        &self.options,
                    ) {
                        Ok(streaming) => streaming,
                        Err(err) => {
                            core.change_stages_tolerant(&sinks_first, StateChange::new(State::Paused, State::Idle), None);
                            core.bus.post(Event::error(core.graph_origin(), err.to_string(), None));
                            return Err(err);
                        }
                    };
                    if streaming.sink_count() == 0 {
                        st.prerolled = true;
                    }
                    self.streaming = Some(streaming);
                    core.commit(&mut st, change, pending);
                }
                State::Active => {
                    if !st.prerolled {
                        st.pending = Some(State::Active);
                        debug!(graph = %core.name, "waiting for sinks to preroll");
                        return Ok(Transition::Async);
                    }
                    core.activate(&mut st, &sinks_first)?;
                }
                State::Null => break,
            }
        }
        Ok(Transition::Success)
    }

    /// Stops streaming and returns the graph to Null. Idempotent.
    pub(crate) fn teardown(&mut self) {
        let snapshot = self.state();
        if snapshot.current == State::Null && snapshot.pending.is_none() && self.streaming.is_none() {
            return;
        }
        info!(graph = %self.core.name, from = %snapshot.current, "tearing down");
        self.step_down(State::Null);
    }

    fn step_down(&mut self, target: State) {
        let core = Arc::clone(&self.core);
        let sinks_first = self.sinks_first();
        {
            let mut st = core.state.lock();
            if st.pending.take().is_some() {
                core.settled.notify_all();
            }
            if st.current == State::Active && target < State::Active {
                let pending = (target != State::Paused).then_some(target);
                core.pause(&mut st, &sinks_first, pending);
            }
        }

        // The streaming tasks may need the state lock to finish.
        if target < State::Paused {
            if let Some(streaming) = self.streaming.take() {
                streaming.stop(self.options.shutdown_grace);
            }
        }

        let mut st = core.state.lock();
        while let Some(next) = st.current.step_toward(target) {
            let change = StateChange::new(st.current, next);
            let pending = (next != target).then_some(target);
            core.change_stages_tolerant(&sinks_first, change, pending);
            core.commit(&mut st, change, pending);
            if next == State::Null {
                core.bus.set_flushing(true);
            }
        }
        core.settled.notify_all();
    }

    fn sinks_first(&self) -> Vec<(String, SharedStage)> {
        let mut order = self.upstream_first();
        order.reverse();
        order
    }

    fn validate(&self) -> Result<(), ActivationError> {
        for (name, stage) in &self.stages {
            let guard = stage.lock();
            let unlinked = guard.ports().iter().find(|p| {
                p.is_input()
                    && p.presence == PortPresence::Always
                    && !self.links.iter().any(|l| l.dst == *name && l.dst_port == p.name)
            });
            if let Some(port) = unlinked {
                return Err(ActivationError::UnlinkedPort {
                    stage: name.clone(),
                    port: port.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn negotiate(&mut self) -> Result<(), ActivationError> {
        let mut formats = Vec::with_capacity(self.links.len());
        for link in &self.links {
            let caps_of = |stage: &str, port: &str| {
                self.shared(stage)
                    .and_then(|s| s.lock().port(port).map(|p| p.caps.clone()))
            };
            let format = caps_of(&link.src, &link.src_port)
                .zip(caps_of(&link.dst, &link.dst_port))
                .and_then(|(src, dst)| src.intersect(&dst).fixate())
                .ok_or_else(|| ActivationError::NotNegotiated {
                    link: link.to_string(),
                })?;
            debug!(link = %link, format = %format, "negotiated");
            formats.push(format);
        }
        for (link, format) in self.links.iter_mut().zip(formats) {
            link.format = Some(format);
        }
        Ok(())
    }
}

impl Lifecycle for Graph {
    fn request_state(&mut self, target: State) -> Result<Transition, ActivationError> {
        Graph::request_state(self, target)
    }

    fn current_state(&self) -> State {
        self.state().current
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        self.teardown();
        self.core.bus.close();
        debug!(graph = %self.core.name, "graph released");
    }
}
