// tests/reliable_replay.rs

mod common;
use crate::common::{decode_one, init_tracing, spec, stdout};

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use buildtrace::build::{BuildContext, BuildEvents, BuildMessageState, BuildResult, TestState};
use buildtrace::config::{Settings, DEFAULT_MARKER};
use buildtrace::exec::ProcessResult;
use buildtrace::protocol::ServiceMessageDecoder;
use buildtrace::recovery::ReliableBuildContext;
use buildtrace_test_utils::builders::{
    message, source_reference, test_event, MessageLineBuilder, SideChannelBuilder,
};
use buildtrace_test_utils::recorders::{RecordingDiagnostics, RecordingSink};

type TestResult = Result<(), Box<dyn Error>>;

struct Fixture {
    context: ReliableBuildContext<BuildContext>,
    sink: RecordingSink,
    diagnostics: RecordingDiagnostics,
}

fn fixture(settings: Settings) -> Fixture {
    let sink = RecordingSink::default();
    let diagnostics = RecordingDiagnostics::default();
    let decoder = ServiceMessageDecoder::new(DEFAULT_MARKER).expect("valid marker");
    let context = ReliableBuildContext::new(BuildContext::new(), Arc::new(settings), decoder)
        .with_sink(Arc::new(sink.clone()))
        .with_diagnostics(Arc::new(diagnostics.clone()));
    Fixture {
        context,
        sink,
        diagnostics,
    }
}

fn teamcity(dir: &Path) -> Settings {
    Settings::teamcity(dir.join("service-messages"))
}

fn feed(context: &impl BuildEvents, line: &str) -> Vec<buildtrace::build::BuildMessage> {
    context.process_message(&stdout(line), &decode_one(line))
}

fn finish(context: &impl BuildEvents) -> BuildResult {
    context.finish(ProcessResult::finished(&spec(), Some(100), Some(0), Duration::from_millis(5)))
}

#[test]
fn replays_build_problem_from_side_channel() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    SideChannelBuilder::new(&root.path().join("service-messages"), "X")
        .line(
            &MessageLineBuilder::new("buildProblem")
                .attr("description", "compilation failed")
                .build(),
        )
        .write()?;

    let f = fixture(teamcity(root.path()));
    let reference = MessageLineBuilder::new("message")
        .attr("source", "X")
        .attr("text", "see file")
        .build();
    let emitted = feed(&f.context, &reference);
    assert!(emitted.is_empty(), "reference events emit nothing live");
    assert_eq!(f.context.pending_sources(), vec!["X".to_string()]);

    let result = finish(&f.context);
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].state, BuildMessageState::BuildProblem);
    assert_eq!(result.errors()[0].text, "compilation failed");

    // Replayed messages reach the sink too.
    assert_eq!(f.sink.texts(), vec!["compilation failed".to_string()]);
    assert!(f.diagnostics.warnings().is_empty());
    Ok(())
}

#[test]
fn replay_is_in_index_order_and_rebuilds_tests() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    SideChannelBuilder::new(&root.path().join("service-messages"), "tests.idx")
        .line(&test_event("testStdOut", "S", "A").attr("out", "first").build())
        .line(&test_event("testFailed", "S", "A").attr("message", "bad").build())
        .line(&test_event("testFinished", "S", "A").build())
        .line(&test_event("testFinished", "S", "B").attr("duration", "7").build())
        .write()?;

    let f = fixture(teamcity(root.path()));
    feed(&f.context, &source_reference("tests.idx"));
    let result = finish(&f.context);

    let states: Vec<(&str, TestState)> = result
        .tests()
        .iter()
        .map(|t| (t.name.as_str(), t.state))
        .collect();
    assert_eq!(states, vec![("A", TestState::Failed), ("B", TestState::Passed)]);
    assert_eq!(result.tests()[0].output_text(), "first");
    assert_eq!(result.summary().total, 2);
    Ok(())
}

#[test]
fn ordinary_events_pass_through_while_recording() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    let f = fixture(teamcity(root.path()));

    let emitted = feed(&f.context, &message("live warning", "WARNING"));
    assert_eq!(emitted.len(), 1);

    let result = finish(&f.context);
    assert_eq!(result.warnings().len(), 1);
    Ok(())
}

#[test]
fn missing_files_are_skipped_silently() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    let dir = root.path().join("service-messages");
    std::fs::create_dir_all(&dir)?;
    // Index present, log missing.
    std::fs::write(dir.join("no-log"), 4u64.to_be_bytes())?;

    let f = fixture(teamcity(root.path()));
    feed(&f.context, &source_reference("absent"));
    feed(&f.context, &source_reference("no-log"));

    let result = finish(&f.context);
    assert!(result.errors().is_empty());
    assert!(f.diagnostics.warnings().is_empty());
    assert!(f.context.pending_sources().is_empty());
    Ok(())
}

#[test]
fn corrupt_index_keeps_recovered_events_and_warns() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    SideChannelBuilder::new(&root.path().join("service-messages"), "X")
        .line(&message("kept", "FAILURE"))
        .raw_offset(1)
        .raw_log(b"garbage")
        .write()?;

    let f = fixture(teamcity(root.path()));
    feed(&f.context, &source_reference("X"));
    let result = finish(&f.context);

    let errors: Vec<&str> = result.errors().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(errors, vec!["kept"]);
    let warnings = f.diagnostics.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("invalid index"), "{warnings:?}");
    Ok(())
}

#[test]
fn truncated_log_keeps_recovered_events_and_warns() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    let first = message("kept", "FAILURE");
    SideChannelBuilder::new(&root.path().join("service-messages"), "X")
        .line(&first)
        .raw_offset(first.len() as u64 + 500)
        .write()?;

    let f = fixture(teamcity(root.path()));
    feed(&f.context, &source_reference("X"));
    let result = finish(&f.context);

    assert_eq!(result.errors().len(), 1);
    let warnings = f.diagnostics.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("truncated"), "{warnings:?}");
    Ok(())
}

#[test]
fn same_source_is_replayed_once() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    SideChannelBuilder::new(&root.path().join("service-messages"), "X")
        .line(&MessageLineBuilder::new("buildProblem").attr("description", "once").build())
        .write()?;

    let f = fixture(teamcity(root.path()));
    feed(&f.context, &source_reference("X"));
    feed(&f.context, &source_reference("X"));
    let result = finish(&f.context);

    assert_eq!(result.errors().len(), 1);
    Ok(())
}

#[test]
fn without_teamcity_source_events_are_not_intercepted() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    SideChannelBuilder::new(&root.path().join("service-messages"), "X")
        .line(&MessageLineBuilder::new("buildProblem").attr("description", "never").build())
        .write()?;

    let mut settings = teamcity(root.path());
    settings.ci_type = buildtrace::types::CiType::None;
    let f = fixture(settings);

    let emitted = feed(&f.context, &message("inline", "WARNING").replace("]", " source='X']"));
    assert_eq!(emitted.len(), 1);
    assert!(f.context.pending_sources().is_empty());

    let result = finish(&f.context);
    assert!(result.errors().is_empty());
    assert_eq!(result.warnings().len(), 1);
    Ok(())
}

#[test]
fn blank_source_is_not_a_reference() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    let f = fixture(teamcity(root.path()));

    let emitted = feed(
        &f.context,
        &MessageLineBuilder::new("buildProblem")
            .attr("description", "inline problem")
            .attr("source", "  ")
            .build(),
    );
    assert_eq!(emitted.len(), 1);

    let result = finish(&f.context);
    assert_eq!(result.errors().len(), 1);
    Ok(())
}
