//! Streaming engine: one task per stage, one bounded channel per link.
//!
//! Sources produce until they report end of stream. Filters forward end of
//! stream once all of their inputs finished. Sinks preroll on their first
//! frame, wait for the running clock, and report end of stream to the
//! graph once all of them finished. A stage only receives on the links
//! whose port it [wants](crate::stages::Stage::wants_input), so a full
//! channel blocks its upstream stage.

use super::graph::{GraphCore, GraphOptions, SharedStage};
use super::topology::Link;
use crate::cancellation::CancellationToken;
use crate::core::{Frame, VideoFormat};
use crate::errors::{ActivationError, StageError};
use crate::events::{Event, Origin};
use crate::stages::StageRole;
use std::collections::HashMap;
use std::future::poll_fn;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone)]
enum Flow {
    Frame(Frame),
    Eos,
}

#[derive(Debug)]
struct Inbound {
    port: Arc<str>,
    flow: Flow,
}

#[derive(Debug)]
struct Outlet {
    tx: mpsc::Sender<Flow>,
    format: VideoFormat,
}

/// Receiving end of one link.
#[derive(Debug)]
struct Inlet {
    port: Arc<str>,
    rx: mpsc::Receiver<Flow>,
    closed: bool,
}

/// Every link into one stage.
#[derive(Debug, Default)]
struct Inlets {
    inlets: Vec<Inlet>,
    start: usize,
}

impl Inlets {
    fn push(&mut self, port: &str, rx: mpsc::Receiver<Flow>) {
        self.inlets.push(Inlet {
            port: Arc::from(port),
            rx,
            closed: false,
        });
    }

    fn len(&self) -> usize {
        self.inlets.len()
    }

    fn is_empty(&self) -> bool {
        self.inlets.is_empty()
    }

    /// Asks the stage which ports it is ready for. The stage lock is not
    /// held past this call.
    fn wanted(&self, stage: &SharedStage) -> Vec<bool> {
        let guard = stage.lock();
        self.inlets.iter().map(|i| guard.wants_input(&i.port)).collect()
    }

    /// Next flow from an open inlet the stage wants, rotating the starting
    /// inlet between calls. Falls back to every open inlet when none is
    /// wanted. `None` once every inlet is closed or streaming was cancelled.
    async fn recv(&mut self, wanted: &[bool], token: &CancellationToken) -> Option<Inbound> {
        tokio::select! {
            msg = poll_fn(|cx| self.poll_next(cx, wanted)) => msg,
            () = token.cancelled() => None,
        }
    }

    fn poll_next(&mut self, cx: &mut Context<'_>, wanted: &[bool]) -> Poll<Option<Inbound>> {
        let count = self.inlets.len();
        loop {
            let any_wanted = self
                .inlets
                .iter()
                .zip(wanted)
                .any(|(inlet, &want)| want && !inlet.closed);
            let mut closed_any = false;
            for offset in 0..count {
                let idx = (self.start + offset) % count;
                let inlet = &mut self.inlets[idx];
                if inlet.closed || (any_wanted && !wanted.get(idx).copied().unwrap_or(true)) {
                    continue;
                }
                match inlet.rx.poll_recv(cx) {
                    Poll::Ready(Some(flow)) => {
                        let port = Arc::clone(&inlet.port);
                        self.start = (idx + 1) % count;
                        return Poll::Ready(Some(Inbound { port, flow }));
                    }
                    Poll::Ready(None) => {
                        inlet.closed = true;
                        closed_any = true;
                    }
                    Poll::Pending => {}
                }
            }
            if self.inlets.iter().all(|i| i.closed) {
                return Poll::Ready(None);
            }
            // A wanted inlet closed: the remaining ones were skipped and
            // hold no waker yet.
            if !closed_any {
                return Poll::Pending;
            }
        }
    }
}

struct Shared {
    core: Arc<GraphCore>,
    sinks_first: Vec<(String, SharedStage)>,
    unprerolled: AtomicUsize,
    unfinished: AtomicUsize,
    token: Arc<CancellationToken>,
}

impl Shared {
    fn fail(&self, stage: &str, err: StageError) {
        warn!(graph = %self.core.name, stage = %stage, error = %err, "stage failed while streaming");
        self.core
            .bus
            .post(Event::error(Origin::Stage(stage.to_string()), err.message, err.debug));
    }

    fn sink_prerolled(&self, stage: &str) {
        debug!(graph = %self.core.name, stage = %stage, "sink prerolled");
        if self.unprerolled.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.core.complete_preroll(&self.sinks_first);
        }
    }

    fn sink_finished(&self, stage: &str) {
        debug!(graph = %self.core.name, stage = %stage, "sink reached end of stream");
        if self.unfinished.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.core
                .bus
                .post(Event::end_of_stream(Origin::Graph(self.core.name.clone())));
        }
    }
}

/// Streaming runtime of a graph between Paused and Idle.
pub(crate) struct Streaming {
    runtime: Runtime,
    token: Arc<CancellationToken>,
    sinks: usize,
}

impl Streaming {
    /// Spawns one task per stage. Links must have negotiated formats.
    pub(crate) fn start(
        core: &Arc<GraphCore>,
        stages: &[(String, SharedStage)],
        links: &[Link],
        sinks_first: Vec<(String, SharedStage)>,
        options: &GraphOptions,
    ) -> Result<Self, ActivationError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name(format!("{}-streaming", core.name))
            .enable_time()
            .build()
            .map_err(|e| ActivationError::Runtime {
                reason: e.to_string(),
            })?;

        let mut outlets: HashMap<&str, Vec<Outlet>> = HashMap::new();
        let mut inlets: HashMap<&str, Inlets> = HashMap::new();
        for link in links {
            let format = link.format.ok_or_else(|| ActivationError::NotNegotiated {
                link: link.to_string(),
            })?;
            let (tx, rx) = mpsc::channel(options.link_capacity.max(1));
            outlets
                .entry(link.src.as_str())
                .or_default()
                .push(Outlet { tx, format });
            inlets
                .entry(link.dst.as_str())
                .or_default()
                .push(&link.dst_port, rx);
        }

        let mut plans = Vec::with_capacity(stages.len());
        for (name, stage) in stages {
            let stage_inlets = inlets.remove(name.as_str()).unwrap_or_default();
            let stage_outlets = outlets.remove(name.as_str()).unwrap_or_default();
            let is_sink = !stage_inlets.is_empty() && stage.lock().role() == StageRole::Sink;
            plans.push((name.clone(), Arc::clone(stage), stage_inlets, stage_outlets, is_sink));
        }

        let sinks = plans.iter().filter(|p| p.4).count();
        let token = Arc::new(CancellationToken::new());
        let shared = Arc::new(Shared {
            core: Arc::clone(core),
            sinks_first,
            unprerolled: AtomicUsize::new(sinks),
            unfinished: AtomicUsize::new(sinks),
            token: Arc::clone(&token),
        });

        for (name, stage, stage_inlets, stage_outlets, is_sink) in plans {
            let shared = Arc::clone(&shared);
            if stage_inlets.is_empty() {
                runtime.spawn(source_task(name, stage, stage_outlets, shared));
            } else if is_sink {
                let clock = core.clock.subscribe();
                runtime.spawn(sink_task(name, stage, stage_inlets, clock, shared));
            } else {
                runtime.spawn(filter_task(name, stage, stage_inlets, stage_outlets, shared));
            }
        }

        debug!(graph = %core.name, stages = stages.len(), links = links.len(), sinks, "streaming started");
        Ok(Self {
            runtime,
            token,
            sinks,
        })
    }

    /// Number of sinks that have to preroll.
    pub(crate) fn sink_count(&self) -> usize {
        self.sinks
    }

    /// Cancels every task and shuts the runtime down.
    pub(crate) fn stop(self, grace: Duration) {
        self.token.cancel("teardown");
        self.runtime.shutdown_timeout(grace);
        debug!("streaming stopped");
    }
}

/// Sends `flow` on every outlet. Returns false once downstream is gone or
/// streaming was cancelled.
async fn send_all(outlets: &[Outlet], flow: &Flow, token: &CancellationToken) -> bool {
    for outlet in outlets {
        let flow = match flow {
            Flow::Frame(frame) => {
                let mut frame = frame.clone();
                frame.format = outlet.format;
                Flow::Frame(frame)
            }
            Flow::Eos => Flow::Eos,
        };
        tokio::select! {
            sent = outlet.tx.send(flow) => {
                if sent.is_err() {
                    return false;
                }
            }
            () = token.cancelled() => return false,
        }
    }
    true
}

async fn wait_running(
    clock: &mut watch::Receiver<Option<Instant>>,
    token: &CancellationToken,
) -> Option<Instant> {
    loop {
        let current = *clock.borrow_and_update();
        if let Some(base) = current {
            return Some(base);
        }
        tokio::select! {
            changed = clock.changed() => {
                if changed.is_err() {
                    return None;
                }
            }
            () = token.cancelled() => return None,
        }
    }
}

async fn source_task(name: String, stage: SharedStage, outlets: Vec<Outlet>, shared: Arc<Shared>) {
    if outlets.is_empty() {
        debug!(stage = %name, "source has no links, not producing");
        return;
    }
    let mut seq = 0;
    loop {
        if shared.token.is_cancelled() {
            return;
        }
        let produced = stage.lock().produce(seq);
        match produced {
            Ok(Some(frame)) => {
                trace!(stage = %name, seq, "produced");
                if !send_all(&outlets, &Flow::Frame(frame), &shared.token).await {
                    return;
                }
                seq += 1;
            }
            Ok(None) => {
                debug!(stage = %name, frames = seq, "source finished");
                send_all(&outlets, &Flow::Eos, &shared.token).await;
                return;
            }
            Err(err) => {
                shared.fail(&name, err);
                return;
            }
        }
    }
}

async fn filter_task(
    name: String,
    stage: SharedStage,
    mut inlets: Inlets,
    outlets: Vec<Outlet>,
    shared: Arc<Shared>,
) {
    let mut open = inlets.len();
    loop {
        let wanted = inlets.wanted(&stage);
        let Some(Inbound { port, flow }) = inlets.recv(&wanted, &shared.token).await else {
            return;
        };
        let eos = matches!(flow, Flow::Eos);
        let result = match flow {
            Flow::Frame(frame) => stage.lock().process(&port, frame),
            Flow::Eos => stage.lock().end_of_stream(&port),
        };
        let frames = match result {
            Ok(frames) => frames,
            Err(err) => {
                shared.fail(&name, err);
                return;
            }
        };
        for frame in frames {
            if !send_all(&outlets, &Flow::Frame(frame), &shared.token).await {
                return;
            }
        }
        if eos {
            open = open.saturating_sub(1);
            if open == 0 {
                send_all(&outlets, &Flow::Eos, &shared.token).await;
                return;
            }
        }
    }
}

async fn sink_task(
    name: String,
    stage: SharedStage,
    mut inlets: Inlets,
    mut clock: watch::Receiver<Option<Instant>>,
    shared: Arc<Shared>,
) {
    let mut prerolled = false;
    let mut open = inlets.len();
    loop {
        let wanted = inlets.wanted(&stage);
        let Some(inbound) = inlets.recv(&wanted, &shared.token).await else {
            return;
        };
        if !prerolled {
            prerolled = true;
            shared.sink_prerolled(&name);
        }
        let Some(base) = wait_running(&mut clock, &shared.token).await else {
            return;
        };
        match inbound.flow {
            Flow::Frame(frame) => {
                let sync = stage.lock().sync_to_clock();
                if sync {
                    let at = tokio::time::Instant::from_std(base + frame.pts);
                    tokio::select! {
                        () = tokio::time::sleep_until(at) => {}
                        () = shared.token.cancelled() => return,
                    }
                }
                let rendered = stage.lock().render(&frame);
                if let Err(err) = rendered {
                    shared.fail(&name, err);
                    return;
                }
            }
            Flow::Eos => {
                open = open.saturating_sub(1);
                if open == 0 {
                    shared.sink_finished(&name);
                    return;
                }
            }
        }
    }
}
