// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::types::CiType;

/// Default wire-protocol marker (`##teamcity[...]`).
pub const DEFAULT_MARKER: &str = "teamcity";

/// Default grace period for draining output after the process has exited.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variable whose presence means the build runs on a TeamCity agent.
pub const TEAMCITY_VERSION_ENV: &str = "TEAMCITY_VERSION";

/// Environment variable naming the agent's service-messages directory.
pub const SERVICE_MESSAGES_PATH_ENV: &str = "TEAMCITY_SERVICE_MESSAGES_PATH";

/// Settings as read from a TOML file, before validation.
///
/// ```toml
/// [ci]
/// integration = "teamcity"
/// service_messages_dir = "/opt/agent/temp/service-messages"
///
/// [process]
/// timeout = "10m"
/// drain_timeout = "3s"
///
/// [protocol]
/// marker = "teamcity"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSettings {
    #[serde(default)]
    pub ci: CiSection,

    #[serde(default)]
    pub process: ProcessSection,

    #[serde(default)]
    pub protocol: ProtocolSection,
}

/// `[ci]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CiSection {
    /// `"teamcity"` or `"none"` (default).
    #[serde(default)]
    pub integration: CiType,

    /// Directory the CI agent writes index/log file pairs into.
    #[serde(default)]
    pub service_messages_dir: Option<PathBuf>,
}

/// `[process]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProcessSection {
    /// Duration string such as `"30s"`; absent or `"0s"` waits indefinitely.
    #[serde(default)]
    pub timeout: Option<String>,

    /// How long to keep reading output after the process is gone.
    #[serde(default)]
    pub drain_timeout: Option<String>,
}

/// `[protocol]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolSection {
    #[serde(default = "default_marker")]
    pub marker: String,
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

impl Default for ProtocolSection {
    fn default() -> Self {
        Self {
            marker: default_marker(),
        }
    }
}

/// Validated settings used by the rest of the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub ci_type: CiType,
    pub service_messages_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub drain_timeout: Duration,
    pub marker: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ci_type: CiType::None,
            service_messages_dir: None,
            timeout: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            marker: default_marker(),
        }
    }
}

impl Settings {
    /// Settings for a TeamCity agent writing side-channel files into `dir`.
    pub fn teamcity(dir: impl Into<PathBuf>) -> Self {
        Self {
            ci_type: CiType::TeamCity,
            service_messages_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Apply `TEAMCITY_VERSION` / `TEAMCITY_SERVICE_MESSAGES_PATH` from the
    /// process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::with_env_overrides`] with an injectable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup(TEAMCITY_VERSION_ENV).is_some_and(|v| !v.trim().is_empty()) {
            self.ci_type = CiType::TeamCity;
        }
        if let Some(dir) = lookup(SERVICE_MESSAGES_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            self.service_messages_dir = Some(PathBuf::from(dir));
        }
        self
    }
}

/// CI-settings provider consumed by the recovery layer.
pub trait CiSettings: Send + Sync {
    fn ci_type(&self) -> CiType;

    /// Directory holding side-channel index/log pairs, if the agent has one.
    fn service_messages_dir(&self) -> Option<&Path>;
}

impl CiSettings for Settings {
    fn ci_type(&self) -> CiType {
        self.ci_type
    }

    fn service_messages_dir(&self) -> Option<&Path> {
        self.service_messages_dir.as_deref()
    }
}
