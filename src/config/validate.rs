// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{RawSettings, Settings, DEFAULT_DRAIN_TIMEOUT};
use crate::errors::{BuildtraceError, Result};

impl TryFrom<RawSettings> for Settings {
    type Error = BuildtraceError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        validate_marker(&raw.protocol.marker)?;

        let timeout = match raw.process.timeout.as_deref() {
            Some(s) => {
                let dur = parse_setting_duration("[process].timeout", s)?;
                // Zero means "no timeout", same as leaving it out.
                (!dur.is_zero()).then_some(dur)
            }
            None => None,
        };

        let drain_timeout = match raw.process.drain_timeout.as_deref() {
            Some(s) => parse_setting_duration("[process].drain_timeout", s)?,
            None => DEFAULT_DRAIN_TIMEOUT,
        };

        Ok(Settings {
            ci_type: raw.ci.integration,
            service_messages_dir: raw.ci.service_messages_dir,
            timeout,
            drain_timeout,
            marker: raw.protocol.marker,
        })
    }
}

fn validate_marker(marker: &str) -> Result<()> {
    if marker.is_empty() {
        return Err(BuildtraceError::ConfigError(
            "[protocol].marker must not be empty".to_string(),
        ));
    }
    if !marker.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(BuildtraceError::ConfigError(format!(
            "[protocol].marker must be alphanumeric (got '{}')",
            marker
        )));
    }
    Ok(())
}

fn parse_setting_duration(key: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|e| BuildtraceError::ConfigError(format!("{key}: {e}")))
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}
