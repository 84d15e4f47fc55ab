//! Test doubles for graphs and sessions.
//!
//! This module provides:
//! - [`FakeStage`]: scriptable source, filter or sink
//! - [`ScriptedMonitor`]: event source replaying a fixed list
//! - [`RecordingLifecycle`]: lifecycle controller recording requests
//! - [`RecordingReporter`]: reporter keeping every line

mod doubles;
mod stages;

pub use crate::report::RecordingReporter;
pub use doubles::{RecordingLifecycle, ScriptedMonitor};
pub use stages::{Call, CallLog, FakeStage, FAKE_KIND};
