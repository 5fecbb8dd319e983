//! Configuration record for the wrapper.
//!
//! [`Config`] is the immutable value the rest of the program reads. It is
//! assembled by [`crate::ConfigLoader`] from the YAML config file, `NTFY_*`
//! environment variables, and CLI overrides, then validated once before the
//! child is spawned.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::WrapError;

/// Default ntfy server when neither the config file nor the environment
/// names one.
pub(crate) const DEFAULT_SERVER: &str = "https://ntfy.sh";

/// Default inactivity deadline before the backstop notification fires.
pub(crate) const DEFAULT_BACKSTOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Marker variable set in the child's environment before exec.
///
/// If the wrapper finds this in its *own* environment at startup, the
/// `claude` it resolved is this wrapper again; it must refuse to start
/// rather than fork itself forever.
pub const WRAP_MARKER_ENV: &str = "WRAPPED";

/// Immutable wrapper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the ntfy server.
    pub ntfy_server: String,
    /// Topic to publish notifications to. Required unless `quiet`.
    pub ntfy_topic: String,
    /// Inactivity deadline. Zero disables the backstop entirely.
    #[serde(with = "humantime_serde")]
    pub backstop_timeout: Duration,
    /// Disable all notifications.
    pub quiet: bool,
    /// Send a one-shot notification when the session starts.
    pub startup_notify: bool,
    /// Explicit path to the real `claude` binary, skipping PATH lookup.
    pub claude_path: Option<PathBuf>,
    /// Arguments prepended to the inner program's argv.
    pub default_args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ntfy_server: DEFAULT_SERVER.to_string(),
            ntfy_topic: String::new(),
            backstop_timeout: DEFAULT_BACKSTOP_TIMEOUT,
            quiet: false,
            startup_notify: false,
            claude_path: None,
            default_args: Vec::new(),
        }
    }
}

impl Config {
    /// Parse a configuration from a YAML string.
    ///
    /// Missing fields fall back to their defaults; unknown keys are ignored.
    pub fn from_yaml(content: &str) -> Result<Self, WrapError> {
        serde_yaml::from_str(content).map_err(|e| WrapError::Config(e.to_string()))
    }

    /// Whether notifications are in play at all.
    pub fn notifications_enabled(&self) -> bool {
        !self.quiet
    }

    /// Validate the configuration before anything is spawned.
    pub fn validate(&self) -> Result<(), WrapError> {
        if self.quiet {
            return Ok(());
        }
        if self.ntfy_topic.is_empty() {
            return Err(WrapError::Config(
                "ntfy_topic is required when notifications are enabled \
                 (set NTFY_TOPIC or pass --quiet)"
                    .into(),
            ));
        }
        if self.ntfy_server.is_empty() {
            return Err(WrapError::Config(
                "ntfy_server must not be empty when notifications are enabled".into(),
            ));
        }
        Ok(())
    }
}

/// Parse a truthy/falsy environment value.
pub(crate) fn parse_bool(name: &str, value: &str) -> Result<bool, WrapError> {
    match value {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(WrapError::Config(format!(
            "invalid {name} value {other:?} (use true/false)"
        ))),
    }
}

/// Serde adapter for humantime-formatted durations (`30s`, `2m`, ...).
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
