//! Media format capabilities of ports.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw video pixel layouts a port can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    /// Planar 4:2:0 YUV.
    I420,
    /// Packed 4:4:4 YUV with alpha.
    Ayuv,
    /// Packed RGB with alpha.
    Rgba,
    /// Packed BGR with padding byte.
    Bgrx,
}

impl VideoFormat {
    /// Every known format, in default preference order.
    pub const ALL: [Self; 4] = [Self::I420, Self::Ayuv, Self::Rgba, Self::Bgrx];

    /// Returns the canonical format name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::I420 => "I420",
            Self::Ayuv => "AYUV",
            Self::Rgba => "RGBA",
            Self::Bgrx => "BGRx",
        }
    }

    /// Returns true if the format carries an alpha channel.
    #[must_use]
    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::Ayuv | Self::Rgba)
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown video format '{s}'"))
    }
}

/// An ordered set of video formats.
///
/// Order expresses preference: when two caps are intersected the result
/// keeps the order of the left-hand side.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Caps {
    formats: Vec<VideoFormat>,
}

impl Caps {
    /// Creates caps from formats, dropping duplicates.
    pub fn new(formats: impl IntoIterator<Item = VideoFormat>) -> Self {
        let mut out = Vec::new();
        for format in formats {
            if !out.contains(&format) {
                out.push(format);
            }
        }
        Self { formats: out }
    }

    /// Caps accepting every known format.
    #[must_use]
    pub fn any() -> Self {
        Self::new(VideoFormat::ALL)
    }

    /// Returns the formats in preference order.
    #[must_use]
    pub fn formats(&self) -> &[VideoFormat] {
        &self.formats
    }

    /// Returns true if no format is allowed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Returns true if `format` is allowed.
    #[must_use]
    pub fn contains(&self, format: VideoFormat) -> bool {
        self.formats.contains(&format)
    }

    /// Returns the formats allowed by both, in `self`'s order.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            formats: self
                .formats
                .iter()
                .copied()
                .filter(|f| other.contains(*f))
                .collect(),
        }
    }

    /// Returns true if the intersection with `other` is non-empty.
    #[must_use]
    pub fn can_intersect(&self, other: &Self) -> bool {
        self.formats.iter().any(|f| other.contains(*f))
    }

    /// Picks the preferred format.
    #[must_use]
    pub fn fixate(&self) -> Option<VideoFormat> {
        self.formats.first().copied()
    }
}

impl fmt::Display for Caps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.formats.iter().map(|v| v.name()).collect();
        write!(f, "video/x-raw(format={{{}}})", names.join(", "))
    }
}
