//! Frame descriptors moved between stages while streaming.

use super::VideoFormat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A frame rate expressed as a fraction of frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framerate {
    /// Numerator.
    pub num: u32,
    /// Denominator.
    pub den: u32,
}

impl Framerate {
    /// Creates a frame rate. A zero denominator is treated as one.
    #[must_use]
    pub const fn new(num: u32, den: u32) -> Self {
        Self {
            num,
            den: if den == 0 { 1 } else { den },
        }
    }

    /// Duration of a single frame. Zero for a zero numerator.
    #[must_use]
    pub fn frame_duration(&self) -> Duration {
        if self.num == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(1_000_000_000 * u64::from(self.den) / u64::from(self.num))
    }

    /// Presentation timestamp of frame `index`.
    #[must_use]
    pub fn pts_of(&self, index: u64) -> Duration {
        if self.num == 0 {
            return Duration::ZERO;
        }
        let nanos = u128::from(index) * 1_000_000_000 * u128::from(self.den) / u128::from(self.num);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self::new(30, 1)
    }
}

/// Descriptor of one video frame.
///
/// Frames carry timing and format metadata only; pixel payloads stay inside
/// the stage implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Per-producer sequence number.
    pub seq: u64,
    /// Presentation timestamp relative to stream start.
    pub pts: Duration,
    /// Frame duration.
    pub duration: Duration,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout on the link the frame travels.
    pub format: VideoFormat,
    /// Name of the stage that produced the frame.
    pub origin: Arc<str>,
    /// Number of composited layers.
    pub layers: u32,
    /// Colour keyed out by an alpha stage, if any.
    pub key_color: Option<[u8; 3]>,
}

impl Frame {
    /// Creates a single-layer frame.
    #[must_use]
    pub fn new(origin: impl Into<Arc<str>>, seq: u64, framerate: Framerate) -> Self {
        Self {
            seq,
            pts: framerate.pts_of(seq),
            duration: framerate.frame_duration(),
            width: 320,
            height: 240,
            format: VideoFormat::I420,
            origin: origin.into(),
            layers: 1,
            key_color: None,
        }
    }

    /// Sets the frame size.
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}
