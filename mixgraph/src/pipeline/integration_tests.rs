//! End-to-end tests driving graphs through their lifecycle.

#[cfg(test)]
mod tests {
    use crate::config::SessionConfig;
    use crate::core::{State, StateChange, StateSnapshot, Transition};
    use crate::errors::{ActivationError, ConstructionError, LinkError, PropertyError};
    use crate::events::{EventKind, EventMask, EventPayload, Origin, PollEvents, Timeout};
    use crate::init::Library;
    use crate::pipeline::{Graph, GraphOptions};
    use crate::session::{build_scene, run_session, Exit};
    use crate::stages::{DisplayTarget, Stage};
    use crate::supervisor::{Supervisor, Termination};
    use crate::testing::{Call, CallLog, FakeStage, RecordingReporter};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const SETTLE: Duration = Duration::from_secs(5);

    fn scene_config() -> SessionConfig {
        SessionConfig {
            num_buffers: Some(5),
            sync: false,
            display: DisplayTarget::Headless,
            timeout_ms: Some(5_000),
            ..SessionConfig::default()
        }
    }

    /// `src -> mid -> out`, all logging to `log`.
    fn chain(lib: &Library, log: &CallLog, frames: u64) -> Graph {
        let mut graph = Graph::new(lib, "chain");
        graph
            .add_many([
                Box::new(FakeStage::source("src", frames).logging_to(log)) as Box<dyn Stage>,
                Box::new(FakeStage::filter("mid").logging_to(log)),
                Box::new(FakeStage::sink("out").logging_to(log)),
            ])
            .unwrap();
        graph.link_many(&["src", "mid", "out"]).unwrap();
        graph
    }

    #[test]
    fn test_scene_runs_to_end_of_stream() {
        let lib = Library::init();
        let mut graph = build_scene(&lib, &scene_config()).unwrap();
        let mut monitor = graph.monitor();

        assert_eq!(graph.request_state(State::Active), Ok(Transition::Async));

        let reporter = RecordingReporter::new();
        let mut supervisor =
            Supervisor::new("test-pipeline", &reporter).with_timeout(Timeout::After(SETTLE));
        assert_eq!(supervisor.run(&mut monitor), Termination::EndOfStream);
        assert_eq!(
            reporter.info_lines(),
            vec![
                "Pipeline state changed from NULL to IDLE:",
                "Pipeline state changed from IDLE to PAUSED:",
                "Pipeline state changed from PAUSED to ACTIVE:",
                "End-Of-Stream reached.",
            ]
        );
        assert!(reporter.diagnostic_lines().is_empty());

        assert_eq!(graph.request_state(State::Null), Ok(Transition::Success));
        assert_eq!(graph.state(), StateSnapshot::default());
        assert!(graph.bus().is_flushing());
    }

    #[test]
    fn test_run_session_exits_cleanly() {
        let lib = Library::init();
        let reporter = RecordingReporter::new();
        let outcome = run_session(&lib, &scene_config(), &reporter);

        assert_eq!(outcome.exit, Exit::Success);
        assert_eq!(outcome.termination, Some(Termination::EndOfStream));
        assert_eq!(reporter.info_lines().last().map(String::as_str), Some("End-Of-Stream reached."));
    }

    #[test]
    fn test_preroll_completes_activation() {
        let lib = Library::init();
        let log = CallLog::new();
        let mut graph = chain(&lib, &log, 3);

        assert_eq!(graph.request_state(State::Active), Ok(Transition::Async));
        assert_eq!(
            graph.wait_settled(SETTLE),
            StateSnapshot {
                current: State::Active,
                pending: None,
            }
        );

        let mut monitor = graph.monitor();
        let eos = monitor.poll(Timeout::After(SETTLE), EventKind::EndOfStream.into()).unwrap();
        assert_eq!(eos.origin, Origin::Graph("chain".into()));
        assert_eq!(log.rendered("out"), vec![0, 1, 2]);
    }

    #[test]
    fn test_graph_without_sinks_activates_synchronously() {
        let lib = Library::init();
        let mut graph = Graph::new(&lib, "lonely");
        graph.add(Box::new(FakeStage::source("src", 2))).unwrap();

        assert_eq!(graph.request_state(State::Active), Ok(Transition::Success));
        assert_eq!(graph.state().current, State::Active);
    }

    #[test]
    fn test_stages_change_sinks_first() {
        let lib = Library::init();
        let log = CallLog::new();
        let mut graph = chain(&lib, &log, 1);
        let mut monitor = graph.monitor();

        graph.request_state(State::Idle).unwrap();
        assert_eq!(log.changed(StateChange::new(State::Null, State::Idle)), vec!["out", "mid", "src"]);

        let origins: Vec<Origin> = std::iter::from_fn(|| monitor.poll(Timeout::Immediate, EventMask::ALL))
            .map(|e| e.origin)
            .collect();
        assert_eq!(
            origins,
            vec![
                Origin::Stage("out".into()),
                Origin::Stage("mid".into()),
                Origin::Stage("src".into()),
                Origin::Graph("chain".into()),
            ]
        );
    }

    #[test]
    fn test_rejected_step_rolls_back_and_posts_error() {
        let lib = Library::init();
        let log = CallLog::new();
        let mut graph = Graph::new(&lib, "reject");
        graph
            .add_many([
                Box::new(FakeStage::source("src", 1).logging_to(&log).rejecting(State::Paused)) as Box<dyn Stage>,
                Box::new(FakeStage::sink("out").logging_to(&log)),
            ])
            .unwrap();
        graph.link("src", "out").unwrap();
        let mut monitor = graph.monitor();

        let err = graph.request_state(State::Active).unwrap_err();
        let to_paused = StateChange::new(State::Idle, State::Paused);
        assert!(matches!(
            &err,
            ActivationError::Rejected { stage, change, .. } if stage == "src" && *change == to_paused
        ));
        assert_eq!(graph.state().current, State::Idle);

        let calls = log.calls();
        assert_eq!(
            calls[calls.len() - 3..].to_vec(),
            vec![
                Call::Changed("out".into(), to_paused),
                Call::Refused("src".into(), to_paused),
                Call::Changed("out".into(), StateChange::new(State::Paused, State::Idle)),
            ]
        );

        let event = monitor.poll(Timeout::Immediate, EventKind::Error.into()).unwrap();
        assert_eq!(event.origin, Origin::Stage("src".into()));
        assert_eq!(
            event.payload,
            EventPayload::Error {
                message: "src refuses PAUSED".into(),
                debug: Some("scripted rejection".into()),
            }
        );
    }

    #[test]
    fn test_second_request_while_pending() {
        let lib = Library::init();
        let mut graph = Graph::new(&lib, "stuck");
        graph
            .add_many([
                Box::new(FakeStage::source("src", 10)) as Box<dyn Stage>,
                Box::new(FakeStage::filter("mid").failing_after(0, "cannot process")),
                Box::new(FakeStage::sink("out")),
            ])
            .unwrap();
        graph.link_many(&["src", "mid", "out"]).unwrap();
        let mut monitor = graph.monitor();

        assert_eq!(graph.request_state(State::Active), Ok(Transition::Async));
        let error = monitor.poll(Timeout::After(SETTLE), EventKind::Error.into()).unwrap();
        assert_eq!(error.origin, Origin::Stage("mid".into()));

        assert_eq!(
            graph.request_state(State::Paused),
            Err(ActivationError::TransitionInProgress {
                pending: State::Active,
                requested: State::Paused,
            })
        );
        assert_eq!(
            graph.state(),
            StateSnapshot {
                current: State::Paused,
                pending: Some(State::Active),
            }
        );

        assert_eq!(graph.request_state(State::Null), Ok(Transition::Success));
        assert_eq!(graph.state(), StateSnapshot::default());
    }

    #[test]
    fn test_streaming_error_terminates_supervision() {
        let lib = Library::init();
        let mut graph = Graph::new(&lib, "test-pipeline");
        graph
            .add_many([
                Box::new(FakeStage::source("src", 10)) as Box<dyn Stage>,
                Box::new(FakeStage::sink("out").failing_after(2, "render failed")),
            ])
            .unwrap();
        graph.link("src", "out").unwrap();
        let mut monitor = graph.monitor();
        graph.request_state(State::Active).unwrap();

        let reporter = RecordingReporter::new();
        let termination = Supervisor::new("test-pipeline", &reporter)
            .with_timeout(Timeout::After(SETTLE))
            .run(&mut monitor);

        assert_eq!(
            termination,
            Termination::Error {
                origin: Origin::Stage("out".into()),
                message: "render failed".into(),
                debug: Some("out failed after 2 frames".into()),
            }
        );
        assert!(!reporter.info_lines().is_empty());
        assert_eq!(
            reporter.diagnostic_lines(),
            vec![
                "Error received from element out: render failed",
                "Debugging information: out failed after 2 frames",
            ]
        );
    }

    #[test]
    fn test_pause_and_resume() {
        let lib = Library::init();
        let log = CallLog::new();
        let mut graph = chain(&lib, &log, 1_000);
        graph.request_state(State::Active).unwrap();
        assert_eq!(graph.wait_settled(SETTLE).current, State::Active);

        assert_eq!(graph.request_state(State::Paused), Ok(Transition::Success));
        assert_eq!(graph.state().current, State::Paused);
        assert_eq!(log.changed(StateChange::new(State::Active, State::Paused)), vec!["out", "mid", "src"]);

        assert_eq!(graph.request_state(State::Active), Ok(Transition::Success));
        assert_eq!(graph.state().current, State::Active);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let lib = Library::init();
        let log = CallLog::new();
        let mut graph = chain(&lib, &log, 1_000);

        assert_eq!(graph.request_state(State::Null), Ok(Transition::Success));
        assert!(log.calls().is_empty());

        graph.request_state(State::Active).unwrap();
        graph.wait_settled(SETTLE);
        assert_eq!(graph.request_state(State::Null), Ok(Transition::Success));
        let changed = log.calls().len();
        assert_eq!(graph.request_state(State::Null), Ok(Transition::Success));
        assert_eq!(log.calls().len(), changed);
        assert_eq!(graph.state(), StateSnapshot::default());
    }

    #[test]
    fn test_teardown_wakes_blocked_poll() {
        let lib = Library::init();
        let log = CallLog::new();
        let mut graph = chain(&lib, &log, 1);
        graph.request_state(State::Idle).unwrap();
        let mut monitor = graph.monitor();

        let waiter = std::thread::spawn(move || {
            monitor.poll(Timeout::Infinite, EventKind::EndOfStream.into())
        });
        std::thread::sleep(Duration::from_millis(20));
        graph.request_state(State::Null).unwrap();

        assert!(waiter.join().unwrap().is_none());
    }

    #[test]
    fn test_dropping_graph_closes_bus() {
        let lib = Library::init();
        let log = CallLog::new();
        let mut graph = chain(&lib, &log, 1_000);
        graph.request_state(State::Active).unwrap();
        let mut monitor = graph.monitor();

        drop(graph);
        assert!(monitor.is_closed());
        assert!(monitor.poll(Timeout::Infinite, EventMask::ALL).is_none());
        assert_eq!(log.changed(StateChange::new(State::Idle, State::Null)), vec!["out", "mid", "src"]);
    }

    #[test]
    fn test_unlinked_input_fails_validation() {
        let lib = Library::init();
        let mut graph = Graph::new(&lib, "partial");
        graph.add(Box::new(FakeStage::source("src", 1))).unwrap();
        graph.add(Box::new(FakeStage::sink("out"))).unwrap();

        assert_eq!(
            graph.request_state(State::Paused),
            Err(ActivationError::UnlinkedPort {
                stage: "out".into(),
                port: "sink".into(),
            })
        );
        assert_eq!(graph.state().current, State::Idle);
    }

    #[test]
    fn test_structure_frozen_outside_null() {
        let lib = Library::init();
        let log = CallLog::new();
        let mut graph = chain(&lib, &log, 1);
        graph.request_state(State::Idle).unwrap();

        assert!(matches!(
            graph.add(Box::new(FakeStage::sink("late"))),
            Err(ConstructionError::GraphNotNull { state: State::Idle, .. })
        ));
        assert!(matches!(
            graph.link("src", "out"),
            Err(LinkError::GraphNotNull { state: State::Idle, .. })
        ));
    }

    #[test]
    fn test_property_mutability_follows_state() {
        let lib = Library::init();
        let log = CallLog::new();
        let mut graph = chain(&lib, &log, 1_000);

        graph.set_property("mid", "level", 3).unwrap();
        graph.request_state(State::Idle).unwrap();
        graph.set_property("mid", "level", 4).unwrap();

        graph.request_state(State::Paused).unwrap();
        assert_eq!(
            graph.set_property("mid", "level", 5),
            Err(PropertyError::NotMutable {
                property: "level".into(),
                state: State::Paused,
            })
        );
        graph.set_property("mid", "live-level", 5).unwrap();
        assert_eq!(graph.property("mid", "level"), Some(4i64.into()));
    }

    #[test]
    fn test_library_guard_tracks_graphs() {
        let lib = Library::init();
        let graph = Graph::new(&lib, "guarded");
        drop(lib);
        assert!(crate::is_initialized());
        drop(graph);
    }

    #[test]
    fn test_fast_compositor_input_waits_for_slow_one() {
        let lib = Library::init();
        let log = CallLog::new();
        let options = GraphOptions {
            link_capacity: 4,
            ..GraphOptions::default()
        };
        let mut graph = Graph::with_options(&lib, "uneven", options);
        graph
            .add_many([
                Box::new(FakeStage::source("fast", 1_000_000).logging_to(&log)) as Box<dyn Stage>,
                Box::new(
                    FakeStage::source("slow", 1_000_000)
                        .pacing(Duration::from_millis(20))
                        .logging_to(&log),
                ),
                lib.create_stage("compositor", "mixer").unwrap(),
                Box::new(FakeStage::sink("out").logging_to(&log)),
            ])
            .unwrap();
        graph.link_many(&["fast", "mixer", "out"]).unwrap();
        graph.link("slow", "mixer").unwrap();

        graph.request_state(State::Active).unwrap();
        assert_eq!(graph.wait_settled(SETTLE).current, State::Active);
        std::thread::sleep(Duration::from_millis(300));

        let fast = log.produced("fast");
        let slow = log.produced("slow");
        assert!(slow > 0);
        // One frame held by the mixer, four on the link, one blocked in send.
        assert!(fast <= slow + 6, "fast produced {fast} frames, slow {slow}");
        assert!(!log.rendered("out").is_empty());

        assert_eq!(graph.request_state(State::Null), Ok(Transition::Success));
    }
}
