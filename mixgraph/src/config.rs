//! Session configuration.

use crate::errors::ConfigError;
use crate::pipeline::GraphOptions;
use crate::stages::{AlphaMethod, DisplayTarget, Pattern};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Everything needed to build and run the compositing scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Name of the graph.
    #[serde(default = "default_graph_name")]
    pub graph_name: String,
    /// Pattern of the background source.
    #[serde(default = "default_background")]
    pub background: Pattern,
    /// Pattern of the keyed foreground source.
    #[serde(default = "default_foreground")]
    pub foreground: Pattern,
    /// Keying method of the alpha stage.
    #[serde(default = "default_alpha_method")]
    pub alpha_method: AlphaMethod,
    /// Key colour as `[r, g, b]`, used with the custom method.
    #[serde(default = "default_key_color")]
    pub key_color: [u8; 3],
    /// Frames each source produces; unlimited when absent.
    #[serde(default)]
    pub num_buffers: Option<u32>,
    /// Frames per second of both sources.
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    /// Frame width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Frame height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,
    /// Where the display sink presents frames.
    #[serde(default)]
    pub display: DisplayTarget,
    /// Whether the display paces rendering to frame timestamps.
    #[serde(default = "default_sync")]
    pub sync: bool,
    /// Frames buffered per link.
    #[serde(default = "default_link_capacity")]
    pub link_capacity: usize,
    /// Grace period for streaming shutdown, in milliseconds.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// Exit nonzero when the run ends with an error event.
    #[serde(default)]
    pub strict_exit: bool,
    /// Bound on each supervisor poll, in milliseconds; unbounded when absent.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_graph_name() -> String {
    "test-pipeline".to_string()
}

fn default_background() -> Pattern {
    Pattern::Snow
}

fn default_foreground() -> Pattern {
    Pattern::Smpte75
}

fn default_alpha_method() -> AlphaMethod {
    AlphaMethod::Custom
}

fn default_key_color() -> [u8; 3] {
    [0, 0, 255]
}

fn default_framerate() -> u32 {
    30
}

fn default_width() -> u32 {
    320
}

fn default_height() -> u32 {
    240
}

fn default_sync() -> bool {
    true
}

fn default_link_capacity() -> usize {
    4
}

fn default_shutdown_grace_ms() -> u64 {
    500
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            graph_name: default_graph_name(),
            background: default_background(),
            foreground: default_foreground(),
            alpha_method: default_alpha_method(),
            key_color: default_key_color(),
            num_buffers: None,
            framerate: default_framerate(),
            width: default_width(),
            height: default_height(),
            display: DisplayTarget::default(),
            sync: default_sync(),
            link_capacity: default_link_capacity(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            strict_exit: false,
            timeout_ms: None,
        }
    }
}

impl SessionConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise
    /// as [`from_json_str`](Self::from_json_str).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.graph_name.is_empty() {
            return Err(invalid("graph_name", "must not be empty"));
        }
        if !(1..=240).contains(&self.framerate) {
            return Err(invalid("framerate", format!("{} is outside 1..=240", self.framerate)));
        }
        if !(1..=16384).contains(&self.width) {
            return Err(invalid("width", format!("{} is outside 1..=16384", self.width)));
        }
        if !(1..=16384).contains(&self.height) {
            return Err(invalid("height", format!("{} is outside 1..=16384", self.height)));
        }
        if let Some(n) = self.num_buffers {
            if i32::try_from(n).is_err() {
                return Err(invalid("num_buffers", format!("{n} exceeds {}", i32::MAX)));
            }
        }
        if self.link_capacity == 0 {
            return Err(invalid("link_capacity", "must be at least 1"));
        }
        if self.display == DisplayTarget::Device(Default::default()) {
            return Err(invalid("display", "device path must not be empty"));
        }
        Ok(())
    }

    /// Graph options derived from this configuration.
    #[must_use]
    pub fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            link_capacity: self.link_capacity,
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
        }
    }

    /// Poll bound for the supervisor, if any.
    #[must_use]
    pub fn poll_timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = SessionConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.background, Pattern::Snow);
        assert_eq!(config.foreground, Pattern::Smpte75);
        assert_eq!(config.key_color, [0, 0, 255]);
        assert_eq!(config.graph_options(), GraphOptions::default());
    }

    #[test]
    fn test_partial_document() {
        let config = SessionConfig::from_json_str(
            r#"{
                "background": "checkers-4",
                "alpha_method": "green",
                "num_buffers": 30,
                "display": "headless",
                "sync": false,
                "timeout_ms": 2000
            }"#,
        )
        .unwrap();

        assert_eq!(config.background, Pattern::Checkers4);
        assert_eq!(config.alpha_method, AlphaMethod::Green);
        assert_eq!(config.num_buffers, Some(30));
        assert_eq!(config.display, DisplayTarget::Headless);
        assert!(!config.sync);
        assert_eq!(config.poll_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.framerate, 30);
    }

    #[test]
    fn test_device_display() {
        let config =
            SessionConfig::from_json_str(r#"{"display": {"device": "/dev/fb0"}}"#).unwrap();
        assert_eq!(config.display, DisplayTarget::Device(PathBuf::from("/dev/fb0")));
    }

    #[test]
    fn test_invalid_values() {
        let err = SessionConfig::from_json_str(r#"{"framerate": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "framerate", .. }));

        let err = SessionConfig::from_json_str(r#"{"link_capacity": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "link_capacity", .. }));

        let err = SessionConfig::from_json_str(r#"{"background": "plaid"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = SessionConfig::from_json_str(r#"{"colour": 1}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"graph_name": "demo", "width": 640, "height": 480}}"#).unwrap();

        let config = SessionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.graph_name, "demo");
        assert_eq!((config.width, config.height), (640, 480));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = SessionConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
