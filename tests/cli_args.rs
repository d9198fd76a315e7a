// tests/cli_args.rs

use std::path::PathBuf;

use clap::Parser;

use buildtrace::cli::{CliArgs, LogLevel};

#[test]
fn program_and_trailing_args() {
    let args = CliArgs::try_parse_from([
        "buildtrace",
        "--timeout",
        "30s",
        "--service-messages",
        "/agent/sm",
        "--",
        "dotnet",
        "test",
        "--no-build",
        "-v",
        "q",
    ])
    .expect("valid arguments");

    assert_eq!(args.program, "dotnet");
    assert_eq!(args.args, vec!["test", "--no-build", "-v", "q"]);
    assert_eq!(args.timeout.as_deref(), Some("30s"));
    assert_eq!(args.service_messages, Some(PathBuf::from("/agent/sm")));
    assert_eq!(args.config, PathBuf::from("Buildtrace.toml"));
}

#[test]
fn log_level_is_parsed() {
    let args = CliArgs::try_parse_from(["buildtrace", "--log-level", "debug", "make"])
        .expect("valid arguments");
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    assert!(args.args.is_empty());
}

#[test]
fn program_is_required() {
    assert!(CliArgs::try_parse_from(["buildtrace"]).is_err());
}
