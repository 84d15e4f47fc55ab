//! mixgraph command line front-end.
//!
//! Builds the keyed compositing scene, plays it and exits once the stream
//! ends or fails.
//!
//! Usage:
//! ```bash
//! # Defaults: snow background, SMPTE 75% foreground keyed on blue
//! mixgraph
//!
//! # Finite headless run
//! mixgraph --num-buffers 60 --display headless --no-sync
//!
//! # Load settings from a file, then override some of them
//! mixgraph --config scene.json --foreground ball --strict-exit
//! ```

use anyhow::Context;
use clap::Parser;
use mixgraph::config::SessionConfig;
use mixgraph::report::ConsoleReporter;
use mixgraph::session::run_session;
use mixgraph::stages::{AlphaMethod, DisplayTarget, Pattern};
use mixgraph::Library;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mixgraph")]
#[command(about = "Composite a keyed test pattern over another and display it")]
#[command(version)]
struct Args {
    /// JSON session configuration applied before the flags below
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pattern of the background source
    #[arg(long)]
    background: Option<Pattern>,

    /// Pattern of the keyed foreground source
    #[arg(long)]
    foreground: Option<Pattern>,

    /// Keying method of the alpha stage
    #[arg(long)]
    alpha_method: Option<AlphaMethod>,

    /// Frames each source produces before end of stream
    #[arg(long, value_name = "N")]
    num_buffers: Option<u32>,

    /// Frames per second
    #[arg(long, value_name = "N")]
    framerate: Option<u32>,

    /// Frame width in pixels
    #[arg(long, value_name = "W")]
    width: Option<u32>,

    /// Frame height in pixels
    #[arg(long, value_name = "H")]
    height: Option<u32>,

    /// auto, headless or a device path
    #[arg(long, value_name = "TARGET")]
    display: Option<DisplayTarget>,

    /// Render frames as fast as they arrive
    #[arg(long)]
    no_sync: bool,

    /// Exit with status 1 when the run ends with an error
    #[arg(long)]
    strict_exit: bool,

    /// Give up after this many milliseconds without a terminal event
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SessionConfig::default(),
        };

        if let Some(pattern) = self.background {
            config.background = pattern;
        }
        if let Some(pattern) = self.foreground {
            config.foreground = pattern;
        }
        if let Some(method) = self.alpha_method {
            config.alpha_method = method;
        }
        if self.num_buffers.is_some() {
            config.num_buffers = self.num_buffers;
        }
        if let Some(framerate) = self.framerate {
            config.framerate = framerate;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(display) = self.display {
            config.display = display;
        }
        if self.timeout_ms.is_some() {
            config.timeout_ms = self.timeout_ms;
        }
        config.sync &= !self.no_sync;
        config.strict_exit |= self.strict_exit;

        config.validate().context("invalid session settings")?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mixgraph=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.into_config()?;
    tracing::info!(graph = %config.graph_name, display = %config.display, "starting session");

    let library = Library::init();
    let outcome = run_session(&library, &config, &ConsoleReporter);
    Ok(outcome.exit.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn config_from(args: &[&str]) -> SessionConfig {
        Args::try_parse_from(std::iter::once("mixgraph").chain(args.iter().copied()))
            .unwrap()
            .into_config()
            .unwrap()
    }

    #[test]
    fn test_no_flags_gives_defaults() {
        assert_eq!(config_from(&[]), SessionConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = config_from(&[
            "--foreground",
            "ball",
            "--num-buffers",
            "60",
            "--display",
            "headless",
            "--no-sync",
            "--timeout-ms",
            "1500",
        ]);
        assert_eq!(config.foreground, Pattern::Ball);
        assert_eq!(config.num_buffers, Some(60));
        assert_eq!(config.display, DisplayTarget::Headless);
        assert!(!config.sync);
        assert_eq!(config.poll_timeout(), Some(Duration::from_millis(1500)));
        assert!(!config.strict_exit);
    }

    #[test]
    fn test_flags_merge_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        std::fs::write(
            &path,
            r#"{"background": "checkers-4", "num_buffers": 30, "sync": false, "strict_exit": true}"#,
        )
        .unwrap();
        let path = path.to_string_lossy().into_owned();

        // Unset flags keep the file's values, including the booleans.
        let config = config_from(&["--config", &path]);
        assert_eq!(config.background, Pattern::Checkers4);
        assert_eq!(config.num_buffers, Some(30));
        assert!(!config.sync);
        assert!(config.strict_exit);

        let config = config_from(&["--config", &path, "--num-buffers", "5", "--background", "ball"]);
        assert_eq!(config.background, Pattern::Ball);
        assert_eq!(config.num_buffers, Some(5));
        assert!(!config.sync);
    }

    #[test]
    fn test_strict_exit_flag_only_enables() {
        assert!(config_from(&["--strict-exit"]).strict_exit);
        assert!(config_from(&[]).sync);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Args::try_parse_from(["mixgraph", "--background", "plaid"]).is_err());
        let args = Args::try_parse_from(["mixgraph", "--framerate", "0"]).unwrap();
        assert!(args.into_config().is_err());
    }
}
