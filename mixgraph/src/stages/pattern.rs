//! Synthetic test-pattern source.

use super::{Port, Stage, PATTERN_SOURCE};
use crate::core::{
    Caps, Frame, Framerate, PropertyBag, PropertyEnum, PropertySpec, State, StateChange,
    VideoFormat,
};
use crate::errors::StageError;
use tracing::trace;

/// Test patterns a [`PatternSource`] can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum Pattern {
    Smpte,
    Snow,
    Black,
    White,
    Red,
    Green,
    Blue,
    #[serde(rename = "checkers-1")]
    Checkers1,
    #[serde(rename = "checkers-2")]
    Checkers2,
    #[serde(rename = "checkers-4")]
    Checkers4,
    #[serde(rename = "checkers-8")]
    Checkers8,
    Circular,
    Blink,
    Smpte75,
    ZonePlate,
    Gamut,
    ChromaZonePlate,
    SolidColor,
    Ball,
    Smpte100,
    Bar,
    Pinwheel,
    Spokes,
    Gradient,
    Colors,
}

impl PropertyEnum for Pattern {
    const TYPE_NAME: &'static str = "Pattern";

    fn variants() -> &'static [Self] {
        &[
            Self::Smpte,
            Self::Snow,
            Self::Black,
            Self::White,
            Self::Red,
            Self::Green,
            Self::Blue,
            Self::Checkers1,
            Self::Checkers2,
            Self::Checkers4,
            Self::Checkers8,
            Self::Circular,
            Self::Blink,
            Self::Smpte75,
            Self::ZonePlate,
            Self::Gamut,
            Self::ChromaZonePlate,
            Self::SolidColor,
            Self::Ball,
            Self::Smpte100,
            Self::Bar,
            Self::Pinwheel,
            Self::Spokes,
            Self::Gradient,
            Self::Colors,
        ]
    }

    fn value(self) -> i32 {
        self as i32
    }

    fn nick(self) -> &'static str {
        match self {
            Self::Smpte => "smpte",
            Self::Snow => "snow",
            Self::Black => "black",
            Self::White => "white",
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Checkers1 => "checkers-1",
            Self::Checkers2 => "checkers-2",
            Self::Checkers4 => "checkers-4",
            Self::Checkers8 => "checkers-8",
            Self::Circular => "circular",
            Self::Blink => "blink",
            Self::Smpte75 => "smpte75",
            Self::ZonePlate => "zone-plate",
            Self::Gamut => "gamut",
            Self::ChromaZonePlate => "chroma-zone-plate",
            Self::SolidColor => "solid-color",
            Self::Ball => "ball",
            Self::Smpte100 => "smpte100",
            Self::Bar => "bar",
            Self::Pinwheel => "pinwheel",
            Self::Spokes => "spokes",
            Self::Gradient => "gradient",
            Self::Colors => "colors",
        }
    }
}

impl std::str::FromStr for Pattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_nick(s).ok_or_else(|| format!("unknown pattern '{s}'"))
    }
}

/// Source emitting frames of a test pattern.
///
/// Properties: `pattern`, `num-buffers` (`-1` for unlimited), `width`,
/// `height` and `framerate` (frames per second).
#[derive(Debug)]
pub struct PatternSource {
    name: String,
    ports: Vec<Port>,
    properties: PropertyBag,
    framerate: Framerate,
}

impl PatternSource {
    /// Creates a source producing `smpte` frames until stopped.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ports: vec![Port::output(
                "src",
                Caps::new([
                    VideoFormat::Ayuv,
                    VideoFormat::Rgba,
                    VideoFormat::I420,
                    VideoFormat::Bgrx,
                ]),
            )],
            properties: PropertyBag::new(vec![
                PropertySpec::enumeration("pattern", "Type of test pattern", Pattern::Smpte)
                    .mutable_when_active(),
                PropertySpec::int(
                    "num-buffers",
                    "Number of frames before end of stream (-1 = unlimited)",
                    -1,
                    i64::from(i32::MAX),
                    -1,
                ),
                PropertySpec::int("width", "Frame width", 1, 16384, 320),
                PropertySpec::int("height", "Frame height", 1, 16384, 240),
                PropertySpec::int("framerate", "Frames per second", 1, 240, 30),
            ]),
            framerate: Framerate::default(),
        }
    }

    fn dimension(&self, name: &str) -> u32 {
        self.properties
            .int(name)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(1)
    }
}

impl Stage for PatternSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        PATTERN_SOURCE
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
        if change == StateChange::new(State::Idle, State::Paused) {
            let fps = self.dimension("framerate");
            self.framerate = Framerate::new(fps, 1);
        }
        Ok(())
    }

    fn produce(&mut self, seq: u64) -> Result<Option<Frame>, StageError> {
        let limit = self.properties.int("num-buffers").unwrap_or(-1);
        if let Ok(limit) = u64::try_from(limit) {
            if seq >= limit {
                return Ok(None);
            }
        }
        let pattern = self.properties.enumeration::<Pattern>("pattern");
        trace!(stage = %self.name, seq, pattern = ?pattern, "generating frame");
        let frame = Frame::new(self.name.as_str(), seq, self.framerate)
            .with_size(self.dimension("width"), self.dimension("height"));
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn paused(source: &mut PatternSource) {
        source
            .change_state(StateChange::new(State::Idle, State::Paused))
            .unwrap();
    }

    #[test]
    fn test_pattern_table_order() {
        assert_eq!(Pattern::Smpte.value(), 0);
        assert_eq!(Pattern::Snow.value(), 1);
        assert_eq!(Pattern::Smpte75.value(), 13);
        assert_eq!(Pattern::Colors.value(), 24);
        assert_eq!(Pattern::variants().len(), 25);
        assert_eq!("zone-plate".parse::<Pattern>(), Ok(Pattern::ZonePlate));
    }

    #[test]
    fn test_num_buffers_limits_output() {
        let mut source = PatternSource::new("bg");
        source.properties_mut().set("num-buffers", 2).unwrap();
        paused(&mut source);

        assert!(source.produce(0).unwrap().is_some());
        assert!(source.produce(1).unwrap().is_some());
        assert!(source.produce(2).unwrap().is_none());
    }

    #[test]
    fn test_unlimited_by_default() {
        let mut source = PatternSource::new("bg");
        paused(&mut source);
        assert!(source.produce(1_000_000).unwrap().is_some());
    }

    #[test]
    fn test_frame_geometry_and_timing() {
        let mut source = PatternSource::new("fg");
        let props = source.properties_mut();
        props.set("width", 640).unwrap();
        props.set("height", 480).unwrap();
        props.set("framerate", 25).unwrap();
        props.set("pattern", "smpte75").unwrap();
        paused(&mut source);

        let frame = source.produce(2).unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (640, 480));
        assert_eq!(frame.pts, Duration::from_millis(80));
        assert_eq!(&*frame.origin, "fg");
        assert_eq!(
            source.properties().enumeration::<Pattern>("pattern"),
            Some(Pattern::Smpte75)
        );
    }

    #[test]
    fn test_num_buffers_range() {
        let mut source = PatternSource::new("bg");
        assert!(source.properties_mut().set("num-buffers", -2).is_err());
    }
}
