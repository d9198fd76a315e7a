// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which CI integration the build is running under.
///
/// - `TeamCity`: the agent may redirect service messages to side-channel files
///   and only print `source` references on stdout.
/// - `None`: plain local run; every event is expected inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiType {
    TeamCity,
    None,
}

impl Default for CiType {
    fn default() -> Self {
        CiType::None
    }
}

impl FromStr for CiType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "teamcity" => Ok(CiType::TeamCity),
            "none" | "" => Ok(CiType::None),
            other => Err(format!(
                "invalid ci integration: {other} (expected \"teamcity\" or \"none\")"
            )),
        }
    }
}

/// Output stream a line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    StdOut,
    StdErr,
}

impl Stream {
    pub fn is_error(self) -> bool {
        matches!(self, Stream::StdErr)
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::StdOut => f.write_str("stdout"),
            Stream::StdErr => f.write_str("stderr"),
        }
    }
}
