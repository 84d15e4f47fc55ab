//! Compositor mixing any number of inputs into one output.

use super::{Port, PortDirection, PortTemplate, Stage, COMPOSITOR};
use crate::core::{Caps, Frame, PropertyBag, State, StateChange, VideoFormat};
use crate::errors::StageError;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug)]
struct Input {
    port: String,
    queue: VecDeque<Frame>,
    eos: bool,
}

impl Input {
    fn is_active(&self) -> bool {
        !self.eos || !self.queue.is_empty()
    }
}

/// Stacks one frame from every active input into an output frame.
///
/// Inputs are request ports named `sink_0`, `sink_1`, ... in link order;
/// the first is the bottom layer. An output frame is emitted once every
/// input that has not finished holds a frame. Each input holds at most one
/// frame; further frames stay on the link until it has been mixed.
#[derive(Debug)]
pub struct Compositor {
    name: Arc<str>,
    ports: Vec<Port>,
    properties: PropertyBag,
    template: PortTemplate,
    inputs: Vec<Input>,
    emitted: u64,
}

impl Compositor {
    /// Creates a compositor without inputs.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            ports: vec![Port::output(
                "src",
                Caps::new([VideoFormat::Ayuv, VideoFormat::I420]),
            )],
            properties: PropertyBag::new(Vec::new()),
            template: PortTemplate::new("sink_"),
            inputs: Vec::new(),
            emitted: 0,
        }
    }

    fn input_caps() -> Caps {
        Caps::new([VideoFormat::Ayuv, VideoFormat::Rgba, VideoFormat::I420])
    }

    fn try_mix(&mut self) -> Option<Frame> {
        let mut active = self.inputs.iter().filter(|i| i.is_active()).peekable();
        active.peek()?;
        if !active.all(|i| !i.queue.is_empty()) {
            return None;
        }

        let layers: Vec<Frame> = self
            .inputs
            .iter_mut()
            .filter_map(|i| i.queue.pop_front())
            .collect();
        let first = layers.first()?;

        let mut out = Frame {
            seq: self.emitted,
            pts: first.pts,
            duration: first.duration,
            width: first.width,
            height: first.height,
            format: first.format,
            origin: Arc::clone(&self.name),
            layers: 0,
            key_color: None,
        };
        for layer in &layers {
            out.pts = out.pts.max(layer.pts);
            out.duration = out.duration.max(layer.duration);
            out.width = out.width.max(layer.width);
            out.height = out.height.max(layer.height);
            out.layers += layer.layers;
        }
        self.emitted += 1;
        trace!(stage = %self.name, seq = out.seq, layers = out.layers, "mixed frame");
        Some(out)
    }

    fn drain(&mut self) -> Vec<Frame> {
        let mut out = Vec::new();
        while let Some(frame) = self.try_mix() {
            out.push(frame);
        }
        out
    }

    fn input_mut(&mut self, port: &str) -> Result<&mut Input, StageError> {
        self.inputs
            .iter_mut()
            .find(|i| i.port == port)
            .ok_or_else(|| StageError::new(format!("frame on unknown port '{port}'")))
    }
}

impl Stage for Compositor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        COMPOSITOR
    }

    fn ports(&self) -> &[Port] {
        &self.ports
    }

    fn request_port(&mut self, direction: PortDirection) -> Option<Port> {
        if direction != PortDirection::Input {
            return None;
        }
        let port = Port::input(self.template.next_name(), Self::input_caps()).requested();
        self.inputs.push(Input {
            port: port.name.clone(),
            queue: VecDeque::new(),
            eos: false,
        });
        self.ports.push(port.clone());
        Some(port)
    }

    fn release_port(&mut self, name: &str) -> bool {
        let before = self.ports.len();
        self.ports.retain(|p| p.name != name || !p.is_input());
        self.inputs.retain(|i| i.port != name);
        self.ports.len() != before
    }

    fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    fn change_state(&mut self, change: StateChange) -> Result<(), StageError> {
        if change.to == State::Idle {
            for input in &mut self.inputs {
                input.queue.clear();
                input.eos = false;
            }
            self.emitted = 0;
        }
        Ok(())
    }

    fn wants_input(&self, port: &str) -> bool {
        !self.inputs.iter().any(|i| i.port == port && !i.queue.is_empty())
    }

    fn process(&mut self, port: &str, frame: Frame) -> Result<Vec<Frame>, StageError> {
        self.input_mut(port)?.queue.push_back(frame);
        Ok(self.drain())
    }

    fn end_of_stream(&mut self, port: &str) -> Result<Vec<Frame>, StageError> {
        self.input_mut(port)?.eos = true;
        Ok(self.drain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Framerate;
    use pretty_assertions::assert_eq;

    fn with_inputs(n: usize) -> Compositor {
        let mut mixer = Compositor::new("mixer");
        for _ in 0..n {
            mixer.request_port(PortDirection::Input).unwrap();
        }
        mixer
    }

    fn frame(origin: &str, seq: u64) -> Frame {
        Frame::new(origin, seq, Framerate::new(10, 1))
    }

    #[test]
    fn test_request_ports_named_in_order() {
        let mixer = with_inputs(2);
        let names: Vec<&str> = mixer.ports().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["src", "sink_0", "sink_1"]);
        assert!(Compositor::new("m").request_port(PortDirection::Output).is_none());
        assert!(mixer.properties().spec("background").is_none());
    }

    #[test]
    fn test_waits_for_every_input() {
        let mut mixer = with_inputs(2);
        assert!(mixer.process("sink_0", frame("bg", 0)).unwrap().is_empty());

        let mut fg = frame("fg", 0);
        fg.pts = std::time::Duration::from_millis(5);
        let out = mixer.process("sink_1", fg).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].layers, 2);
        assert_eq!(out[0].pts, std::time::Duration::from_millis(5));
        assert_eq!(&*out[0].origin, "mixer");
    }

    #[test]
    fn test_holds_one_frame_per_input() {
        let mut mixer = with_inputs(2);
        assert!(mixer.wants_input("sink_0"));
        mixer.process("sink_0", frame("bg", 0)).unwrap();
        assert!(!mixer.wants_input("sink_0"));
        assert!(mixer.wants_input("sink_1"));

        mixer.process("sink_1", frame("fg", 0)).unwrap();
        assert!(mixer.wants_input("sink_0"));
        assert!(mixer.wants_input("sink_1"));
    }

    #[test]
    fn test_finished_input_no_longer_blocks() {
        let mut mixer = with_inputs(2);
        mixer.end_of_stream("sink_1").unwrap();
        let out = mixer.process("sink_0", frame("bg", 0)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].layers, 1);
    }

    #[test]
    fn test_end_of_stream_flushes_queued_frames() {
        let mut mixer = with_inputs(2);
        mixer.process("sink_0", frame("bg", 0)).unwrap();
        mixer.process("sink_0", frame("bg", 1)).unwrap();
        let out = mixer.end_of_stream("sink_1").unwrap();
        assert_eq!(out.iter().map(|f| f.seq).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_release_port() {
        let mut mixer = with_inputs(2);
        assert!(mixer.release_port("sink_0"));
        assert!(!mixer.release_port("sink_0"));
        assert!(!mixer.release_port("src"));
        assert!(mixer.port("sink_1").is_some());
    }

    #[test]
    fn test_unknown_port_is_an_error() {
        let mut mixer = with_inputs(1);
        assert!(mixer.process("sink_7", frame("x", 0)).is_err());
    }
}
