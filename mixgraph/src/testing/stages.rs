//! Configurable stage for graph tests.

use crate::core::{
    Caps, Frame, Framerate, PropertyBag, PropertySpec, State, StateChange, VideoFormat,
};
use crate::errors::StageError;
use crate::stages::{Port, Stage};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Kind identifier reported by [`FakeStage`].
pub const FAKE_KIND: &str = "fake";

/// Something a [`FakeStage`] was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// A state step was accepted.
    Changed(String, StateChange),
    /// A state step was refused.
    Refused(String, StateChange),
    /// A frame was produced.
    Produced(String, u64),
    /// A frame was rendered.
    Rendered(String, u64),
}

/// Shared, ordered record of calls across several fakes.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Stage names of accepted steps equal to `change`, in call order.
    #[must_use]
    pub fn changed(&self, change: StateChange) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Changed(stage, c) if *c == change => Some(stage.clone()),
                _ => None,
            })
            .collect()
    }

    /// Sequence numbers rendered by `stage`.
    #[must_use]
    pub fn rendered(&self, stage: &str) -> Vec<u64> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Rendered(s, seq) if s == stage => Some(*seq),
                _ => None,
            })
            .collect()
    }

    /// Number of frames produced by `stage`.
    #[must_use]
    pub fn produced(&self, stage: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Produced(s, _) if s == stage))
            .count()
    }

    fn push(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

/// A stage with scripted behavior.
///
/// Sources produce a fixed number of frames. Filters pass frames through.
/// Sinks accept everything. Any of them can refuse a state step or fail
/// after handling a number of frames.
#[derive(Debug)]
pub struct FakeStage {
    name: String,
    ports: Vec<Port>,
    properties: PropertyBag,
    frames: u64,
    framerate: Framerate,
    reject: Option<State>,
    fail_after: Option<(u64, String)>,
    handled: u64,
    sync: bool,
    pace: Duration,
    log: CallLog,
}

impl FakeStage {
    fn with_ports(name: &str, ports: Vec<Port>) -> Self {
        Self {
            name: name.to_string(),
            ports,
            properties: PropertyBag::new(vec![
                PropertySpec::int("level", "Static tuning value", 0, 100, 0),
                PropertySpec::int("live-level", "Tuning value changeable while active", 0, 100, 0)
                    .mutable_when_active(),
            ]),
            frames: 0,
            framerate: Framerate::new(30, 1),
            reject: None,
            fail_after: None,
            handled: 0,
            sync: false,
            pace: Duration::ZERO,
            log: CallLog::new(),
        }
    }

    /// A source producing `frames` frames on port `src`.
    #[must_use]
    pub fn source(name: &str, frames: u64) -> Self {
        let mut stage = Self::with_ports(name, vec![Port::output("src", Caps::any())]);
        stage.frames = frames;
        stage
    }

    /// A passthrough filter with ports `sink` and `src`.
    #[must_use]
    pub fn filter(name: &str) -> Self {
        Self::with_ports(
            name,
            vec![Port::input("sink", Caps::any()), Port::output("src", Caps::any())],
        )
    }

    /// A sink with port `sink`.
    #[must_use]
    pub fn sink(name: &str) -> Self {
        Self::with_ports(name, vec![Port::input("sink", Caps::any())])
    }

    /// Restricts every port to `formats`.
    #[must_use]
    pub fn with_caps(mut self, formats: impl IntoIterator<Item = VideoFormat>) -> Self {
        let caps = Caps::new(formats);
        for port in &mut self.ports {
            port.caps = caps.clone();
        }
        self
    }

    /// Refuses every step into `state`.
    #[must_use]
    pub fn rejecting(mut self, state: State) -> Self {
        self.reject = Some(state);
        self
    }

    /// Fails with `message` once `frames` frames were handled.
    #[must_use]
    pub fn failing_after(mut self, frames: u64, message: impl Into<String>) -> Self {
        self.fail_after = Some((frames, message.into()));
        self
    }

    /// Paces rendering to frame timestamps.
    #[must_use]
    pub fn syncing(mut self, framerate: Framerate) -> Self {
        self.sync = true;
        self.framerate = framerate;
        self
    }

    /// Blocks the calling thread for `pace` before producing each frame.
    #[must_use]
    pub fn pacing(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// Records calls into `log` instead of a private one.
    #[must_use]
    pub fn logging_to(mut self, log: &CallLog) -> Self {
        self.log = log.clone();
        self
    }

    /// The call log.
    #[must_use]
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn tick(&mut self) -> Result<(), StageError> {
        if let Some((limit, message)) = &self.fail_after {
            if self.handled >= *limit {
                return Err(StageError::new(message.clone())
                    .with_debug(format!("{} failed after {} frames", self.name, self.handled)));
            }
        }
        self.handled += 1;
        Ok(())
    }
}

impl Stage for FakeStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        FAKE_KIND
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
        if self.reject == Some(change.to) {
            self.log.push(Call::Refused(self.name.clone(), change));
            return Err(StageError::new(format!("{} refuses {}", self.name, change.to))
                .with_debug("scripted rejection"));
        }
        if change == StateChange::new(State::Paused, State::Idle) {
            self.handled = 0;
        }
        self.log.push(Call::Changed(self.name.clone(), change));
        Ok(())
    }

    fn produce(&mut self, seq: u64) -> Result<Option<Frame>, StageError> {
        if seq >= self.frames {
            return Ok(None);
        }
        if !self.pace.is_zero() {
            std::thread::sleep(self.pace);
        }
        self.tick()?;
        self.log.push(Call::Produced(self.name.clone(), seq));
        Ok(Some(Frame::new(self.name.as_str(), seq, self.framerate)))
    }

    fn process(&mut self, _port: &str, frame: Frame) -> Result<Vec<Frame>, StageError> {
        self.tick()?;
        Ok(vec![frame])
    }

    fn render(&mut self, frame: &Frame) -> Result<(), StageError> {
        self.tick()?;
        self.log.push(Call::Rendered(self.name.clone(), frame.seq));
        Ok(())
    }

    fn sync_to_clock(&self) -> bool {
        self.sync
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::StageRole;

    #[test]
    fn test_roles() {
        assert_eq!(FakeStage::source("a", 1).role(), StageRole::Source);
        assert_eq!(FakeStage::filter("b").role(), StageRole::Filter);
        assert_eq!(FakeStage::sink("c").role(), StageRole::Sink);
    }

    #[test]
    fn test_source_stops_after_frames() {
        let mut source = FakeStage::source("a", 2);
        assert!(source.produce(0).unwrap().is_some());
        assert!(source.produce(1).unwrap().is_some());
        assert!(source.produce(2).unwrap().is_none());
        assert_eq!(
            source.log().calls(),
            vec![Call::Produced("a".into(), 0), Call::Produced("a".into(), 1)]
        );
        assert_eq!(source.log().produced("a"), 2);
        assert_eq!(source.log().produced("b"), 0);
    }

    #[test]
    fn test_failing_after() {
        let mut sink = FakeStage::sink("out").failing_after(1, "broken");
        let frame = Frame::new("src", 0, Framerate::new(30, 1));
        sink.render(&frame).unwrap();
        let err = sink.render(&frame).unwrap_err();
        assert_eq!(err.message, "broken");
        assert_eq!(err.debug.as_deref(), Some("out failed after 1 frames"));
    }

    #[test]
    fn test_rejecting() {
        let mut sink = FakeStage::sink("out").rejecting(State::Idle);
        let change = StateChange::new(State::Null, State::Idle);
        assert!(sink.change_state(change).is_err());
        assert_eq!(sink.log().calls(), vec![Call::Refused("out".into(), change)]);
    }
}
