//! Operator-facing output channels.
//!
//! Informational lines (end of stream, graph state changes) and diagnostic
//! lines (failures and their debugging details) go through a [`Reporter`].
//! This is separate from `tracing` logging.

use parking_lot::Mutex;
use std::sync::Arc;

/// Destination for operator-facing messages.
pub trait Reporter: Send + Sync {
    /// Writes an informational line.
    fn info(&self, line: &str);

    /// Writes a diagnostic line.
    fn diagnostic(&self, line: &str);
}

/// Writes informational lines to stdout and diagnostics to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn info(&self, line: &str) {
        println!("{line}");
    }

    fn diagnostic(&self, line: &str) {
        eprintln!("{line}");
    }
}

/// Which channel a recorded line was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Informational.
    Info,
    /// Diagnostic.
    Diagnostic,
}

/// Reporter keeping every line in memory.
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    lines: Arc<Mutex<Vec<(Channel, String)>>>,
}

impl RecordingReporter {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line in write order.
    #[must_use]
    pub fn lines(&self) -> Vec<(Channel, String)> {
        self.lines.lock().clone()
    }

    /// Informational lines in write order.
    #[must_use]
    pub fn info_lines(&self) -> Vec<String> {
        self.on(Channel::Info)
    }

    /// Diagnostic lines in write order.
    #[must_use]
    pub fn diagnostic_lines(&self) -> Vec<String> {
        self.on(Channel::Diagnostic)
    }

    /// Returns true if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    fn on(&self, channel: Channel) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, line: &str) {
        self.lines.lock().push((Channel::Info, line.to_string()));
    }

    fn diagnostic(&self, line: &str) {
        self.lines.lock().push((Channel::Diagnostic, line.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_reporter_separates_channels() {
        let reporter = RecordingReporter::new();
        let shared = reporter.clone();
        shared.info("a");
        shared.diagnostic("b");
        shared.info("c");

        assert_eq!(reporter.info_lines(), vec!["a", "c"]);
        assert_eq!(reporter.diagnostic_lines(), vec!["b"]);
        assert_eq!(reporter.lines()[1], (Channel::Diagnostic, "b".to_string()));
    }
}
