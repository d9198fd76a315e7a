// tests/supervisor_fake_process.rs

mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use buildtrace::errors::RunError;
use buildtrace::exec::{
    wait_for_exit, LaunchSpec, Output, ProcessManager, ProcessRunner, ProcessState, RunOptions,
};
use buildtrace::stats::Statistics;
use buildtrace_test_utils::fake_process::{FakeProcess, FAKE_PID};
use buildtrace_test_utils::recorders::RecordingWriter;

type TestResult = Result<(), Box<dyn Error>>;

fn spec() -> LaunchSpec {
    LaunchSpec::new("/opt/tools/dotnet").arg("test").short_name("dotnet")
}

fn ignore_output() -> impl FnMut(&mut Output) + Send {
    |_: &mut Output| {}
}

#[tokio::test]
async fn normal_exit_reports_finished_once() -> TestResult {
    init_tracing();
    let fake = FakeProcess::exiting(3).stdout("hello");
    let counters = fake.counters();
    let stats = Arc::new(Statistics::new());

    let runner = ProcessRunner::new(fake)
        .with_writer(Arc::new(RecordingWriter::default()))
        .with_registry(stats.clone());
    let result =
        with_timeout(runner.run(spec(), &mut ignore_output(), RunOptions::default())).await?;

    assert_eq!(result.state, ProcessState::Finished);
    assert_eq!(result.exit_code, Some(3));
    assert_eq!(result.pid, Some(FAKE_PID));
    assert_eq!(result.name, "dotnet");
    assert!(!result.is_success());
    assert_eq!(counters.kill_calls(), 0);
    assert_eq!(stats.processes().len(), 1);
    Ok(())
}

#[tokio::test]
async fn unhandled_lines_reach_the_default_writer() -> TestResult {
    init_tracing();
    let fake = FakeProcess::exiting(0).stdout("one").stderr("two").stdout("three");
    let writer = RecordingWriter::default();

    let mut handler = |output: &mut Output| {
        if output.line == "two" {
            output.handled = true;
        }
    };
    let runner = ProcessRunner::new(fake).with_writer(Arc::new(writer.clone()));
    with_timeout(runner.run(spec(), &mut handler, RunOptions::default())).await?;

    assert_eq!(writer.lines(), vec!["one".to_string(), "three".to_string()]);
    Ok(())
}

#[tokio::test]
async fn start_failure_is_reported_without_waiting() -> TestResult {
    init_tracing();
    let fake = FakeProcess::failing_to_start(io::ErrorKind::NotFound);
    let counters = fake.counters();
    let stats = Arc::new(Statistics::new());

    let runner = ProcessRunner::new(fake).with_registry(stats.clone());
    let result =
        with_timeout(runner.run(spec(), &mut ignore_output(), RunOptions::default())).await?;

    assert_eq!(result.state, ProcessState::FailedToStart);
    assert_eq!(result.exit_code, None);
    assert!(result.error.as_deref().unwrap_or_default().contains("scripted start failure"));
    assert!(result.to_string().contains("failed to start"));
    assert_eq!(counters.starts(), 1);
    assert_eq!(counters.kill_calls(), 0);
    assert_eq!(stats.totals().failed_to_start, 1);
    Ok(())
}

#[tokio::test]
async fn timeout_kills_once_and_reports_canceled() -> TestResult {
    init_tracing();
    let fake = FakeProcess::hanging().stdout("working...");
    let counters = fake.counters();
    let stats = Arc::new(Statistics::new());

    let runner = ProcessRunner::new(fake)
        .with_writer(Arc::new(RecordingWriter::default()))
        .with_registry(stats.clone());
    let result = with_timeout(runner.run(
        spec(),
        &mut ignore_output(),
        RunOptions::with_timeout(Duration::from_millis(50)),
    ))
    .await?;

    assert_eq!(result.state, ProcessState::Canceled);
    assert_eq!(result.exit_code, None);
    assert!(result.elapsed >= Duration::from_millis(50));
    assert_eq!(counters.kills(), 1);
    assert_eq!(counters.kill_calls(), 1);
    assert_eq!(stats.processes().len(), 1);
    Ok(())
}

#[tokio::test]
async fn continuous_output_does_not_block_the_timeout() -> TestResult {
    init_tracing();
    let fake = FakeProcess::flooding("##teamcity[message text='x']");
    let counters = fake.counters();
    let stats = Arc::new(Statistics::new());

    let mut seen = 0usize;
    let mut handler = |output: &mut Output| {
        seen += 1;
        output.handled = true;
    };
    let runner = ProcessRunner::new(fake)
        .with_registry(stats.clone())
        .with_drain_timeout(Duration::from_millis(50));
    let result = with_timeout(runner.run(
        spec(),
        &mut handler,
        RunOptions::with_timeout(Duration::from_millis(50)),
    ))
    .await?;

    assert_eq!(result.state, ProcessState::Canceled);
    assert_eq!(counters.kills(), 1);
    assert_eq!(stats.processes().len(), 1);
    assert!(seen > 0, "output was still delivered");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn continuous_output_does_not_block_cancellation() -> TestResult {
    init_tracing();
    let fake = FakeProcess::flooding("building...");
    let counters = fake.counters();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let mut handler = |output: &mut Output| output.handled = true;
    let runner = ProcessRunner::new(fake).with_drain_timeout(Duration::from_millis(50));
    let outcome =
        with_timeout(runner.run(spec(), &mut handler, RunOptions::with_cancel(cancel))).await;

    assert!(matches!(outcome, Err(RunError::Cancelled(_))), "{outcome:?}");
    assert_eq!(counters.kills(), 1);
    Ok(())
}

#[tokio::test]
async fn cancellation_kills_and_propagates() -> TestResult {
    init_tracing();
    let fake = FakeProcess::hanging();
    let counters = fake.counters();
    let stats = Arc::new(Statistics::new());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let runner = ProcessRunner::new(fake).with_registry(stats.clone());
    let options = RunOptions::with_cancel(cancel);
    let outcome = with_timeout(runner.run(spec(), &mut ignore_output(), options)).await;

    match outcome {
        Err(RunError::Cancelled(result)) => {
            assert_eq!(result.state, ProcessState::Canceled);
            assert_eq!(result.exit_code, None);
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(counters.kills(), 1);
    assert_eq!(stats.processes().len(), 1);
    assert_eq!(stats.totals().canceled, 1);
    Ok(())
}

#[tokio::test]
async fn timeout_without_cancellation_is_not_an_error() -> TestResult {
    init_tracing();
    let cancel = CancellationToken::new();
    let options = RunOptions {
        timeout: Some(Duration::from_millis(20)),
        cancel: Some(cancel.clone()),
    };

    let runner = ProcessRunner::new(FakeProcess::hanging());
    let result = with_timeout(runner.run(spec(), &mut ignore_output(), options)).await?;
    assert_eq!(result.state, ProcessState::Canceled);
    assert!(!cancel.is_cancelled());
    Ok(())
}

#[tokio::test]
async fn wait_failure_kills_records_and_reraises() -> TestResult {
    init_tracing();
    let fake = FakeProcess::hanging().failing_wait(io::ErrorKind::BrokenPipe);
    let counters = fake.counters();
    let stats = Arc::new(Statistics::new());

    let runner = ProcessRunner::new(fake).with_registry(stats.clone());
    let outcome =
        with_timeout(runner.run(spec(), &mut ignore_output(), RunOptions::default())).await;

    match outcome {
        Err(err @ RunError::Wait { .. }) => {
            assert_eq!(err.result().state, ProcessState::Canceled);
            let source = Error::source(&err).map(ToString::to_string).unwrap_or_default();
            assert!(source.contains("scripted wait failure"), "{source}");
        }
        other => panic!("expected wait failure, got {other:?}"),
    }
    assert_eq!(counters.kills(), 1);
    assert_eq!(stats.processes().len(), 1);
    Ok(())
}

#[tokio::test]
async fn open_streams_after_exit_do_not_stall_the_run() -> TestResult {
    init_tracing();
    let fake = FakeProcess::exiting(0).stdout("last words").keep_streams_open();
    let writer = RecordingWriter::default();

    let runner = ProcessRunner::new(fake)
        .with_writer(Arc::new(writer.clone()))
        .with_drain_timeout(Duration::from_millis(50));
    let result =
        with_timeout(runner.run(spec(), &mut ignore_output(), RunOptions::default())).await?;

    assert_eq!(result.state, ProcessState::Finished);
    assert_eq!(writer.lines(), vec!["last words".to_string()]);
    Ok(())
}

#[tokio::test]
async fn kill_is_idempotent() -> TestResult {
    init_tracing();
    let mut fake = FakeProcess::hanging();
    let counters = fake.counters();

    assert!(!fake.kill(), "killing before start is a no-op");
    fake.start(Arc::new(spec()))?;
    assert!(fake.kill());
    assert!(!fake.kill());
    assert_eq!(counters.kills(), 1);
    assert_eq!(counters.kill_calls(), 3);

    let exited = wait_for_exit(&mut fake, Duration::from_millis(100)).await?;
    assert!(exited);
    assert_eq!(fake.exit_code(), None);
    Ok(())
}

#[tokio::test]
async fn wait_for_exit_times_out_without_killing() -> TestResult {
    init_tracing();
    let mut fake = FakeProcess::hanging();
    let counters = fake.counters();
    fake.start(Arc::new(spec()))?;

    let exited = wait_for_exit(&mut fake, Duration::from_millis(20)).await?;
    assert!(!exited);
    assert_eq!(counters.kill_calls(), 0);
    Ok(())
}
