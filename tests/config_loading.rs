// tests/config_loading.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::{tempdir, NamedTempFile};

use buildtrace::config::{
    load_and_validate, load_from_path, load_or_default, parse_duration, CiSettings, Settings,
};
use buildtrace::errors::BuildtraceError;
use buildtrace::types::CiType;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{contents}")?;
    Ok(file)
}

#[test]
fn full_file_is_validated() -> TestResult {
    init_tracing();
    let file = write_config(
        r#"
[ci]
integration = "teamcity"
service_messages_dir = "/agent/temp/service-messages"

[process]
timeout = "10m"
drain_timeout = "250ms"

[protocol]
marker = "marker"
"#,
    )?;

    let settings = load_and_validate(file.path())?;
    assert_eq!(settings.ci_type, CiType::TeamCity);
    assert_eq!(
        settings.service_messages_dir(),
        Some(PathBuf::from("/agent/temp/service-messages").as_path())
    );
    assert_eq!(settings.timeout, Some(Duration::from_secs(600)));
    assert_eq!(settings.drain_timeout, Duration::from_millis(250));
    assert_eq!(settings.marker, "marker");
    Ok(())
}

#[test]
fn empty_file_uses_defaults() -> TestResult {
    init_tracing();
    let file = write_config("")?;
    let settings = load_and_validate(file.path())?;
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.marker, "teamcity");
    assert_eq!(settings.ci_type(), CiType::None);
    Ok(())
}

#[test]
fn zero_timeout_means_none() -> TestResult {
    let file = write_config("[process]\ntimeout = \"0s\"\n")?;
    assert_eq!(load_and_validate(file.path())?.timeout, None);
    Ok(())
}

#[test]
fn raw_load_does_not_validate() -> TestResult {
    let file = write_config("[process]\ntimeout = \"soon\"\n")?;
    let raw = load_from_path(file.path())?;
    assert_eq!(raw.process.timeout.as_deref(), Some("soon"));
    assert!(load_and_validate(file.path()).is_err());
    Ok(())
}

#[test]
fn bad_marker_is_a_config_error() -> TestResult {
    let file = write_config("[protocol]\nmarker = \"team city\"\n")?;
    match load_and_validate(file.path()) {
        Err(BuildtraceError::ConfigError(msg)) => assert!(msg.contains("marker"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }

    let file = write_config("[protocol]\nmarker = \"\"\n")?;
    assert!(matches!(
        load_and_validate(file.path()),
        Err(BuildtraceError::ConfigError(_))
    ));
    Ok(())
}

#[test]
fn unknown_integration_is_a_toml_error() -> TestResult {
    let file = write_config("[ci]\nintegration = \"jenkins\"\n")?;
    assert!(matches!(
        load_and_validate(file.path()),
        Err(BuildtraceError::TomlError(_))
    ));
    Ok(())
}

#[test]
fn missing_file_falls_back_to_defaults() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let settings = load_or_default(dir.path().join("Buildtrace.toml"))?;
    assert_eq!(settings, Settings::default());

    assert!(matches!(
        load_and_validate(dir.path().join("Buildtrace.toml")),
        Err(BuildtraceError::IoError(_))
    ));
    Ok(())
}

#[test]
fn agent_environment_overrides() {
    let settings = Settings::default().with_overrides_from(|key| match key {
        "TEAMCITY_VERSION" => Some("2024.12".to_string()),
        "TEAMCITY_SERVICE_MESSAGES_PATH" => Some("/agent/sm".to_string()),
        _ => None,
    });
    assert_eq!(settings.ci_type, CiType::TeamCity);
    assert_eq!(settings.service_messages_dir, Some(PathBuf::from("/agent/sm")));

    let untouched = Settings::default().with_overrides_from(|_| Some("  ".to_string()));
    assert_eq!(untouched, Settings::default());
}

#[test]
fn duration_strings() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("5d").is_err());
}

#[test]
fn parse_duration_rejects_overflowing_values() {
    assert!(parse_duration("18446744073709551615m").is_err());
    assert!(parse_duration("9999999999999999999h").is_err());
    assert!(parse_duration("99999999999999999999s").is_err());
    assert_eq!(
        parse_duration("18446744073709551615ms"),
        Ok(Duration::from_millis(u64::MAX))
    );
}

#[test]
fn ci_type_from_str() {
    assert_eq!("TeamCity".parse::<CiType>(), Ok(CiType::TeamCity));
    assert_eq!("none".parse::<CiType>(), Ok(CiType::None));
    assert!("jenkins".parse::<CiType>().is_err());
}
