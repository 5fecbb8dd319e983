//! Configuration loading with multiple sources merged in priority order.
//!
//! The priority chain (later overrides earlier):
//! 1. Built-in defaults ([`Config::default()`])
//! 2. Config file: `$NTFY_CONFIG`, else `$XDG_CONFIG_HOME/claude-ntfy/config.yaml`,
//!    else `~/.config/claude-ntfy/config.yaml` (a missing file is fine)
//! 3. `NTFY_*` environment variables
//! 4. CLI flags ([`CliOverrides`], applied by the caller's values here)

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::config::parse_bool;
use crate::{Config, WrapError};

pub const ENV_TOPIC: &str = "NTFY_TOPIC";
pub const ENV_SERVER: &str = "NTFY_SERVER";
pub const ENV_BACKSTOP_TIMEOUT: &str = "NTFY_BACKSTOP_TIMEOUT";
pub const ENV_QUIET: &str = "NTFY_QUIET";
pub const ENV_STARTUP: &str = "NTFY_STARTUP";
pub const ENV_DEFAULT_ARGS: &str = "NTFY_DEFAULT_ARGS";
pub const ENV_CONFIG: &str = "NTFY_CONFIG";
pub const ENV_CLAUDE_PATH: &str = "NTFY_CLAUDE_PATH";

const APP_DIR: &str = "claude-ntfy";
const CONFIG_FILE: &str = "config.yaml";

/// Values taken from the command line; these outrank everything else.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// `--config PATH`
    pub config_path: Option<PathBuf>,
    /// `--quiet`
    pub quiet: bool,
}

/// Assembles a [`Config`] from file, environment, and CLI overrides.
pub struct ConfigLoader {
    overrides: CliOverrides,
    /// Environment source override for tests; `None` reads the process env.
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new(overrides: CliOverrides) -> Self {
        Self {
            overrides,
            env: None,
        }
    }

    /// Read environment variables from the given map instead of the process
    /// environment (test injection only).
    #[cfg(test)]
    #[must_use]
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Load and merge configuration from all sources.
    ///
    /// The result is validated by the caller once binary discovery is done;
    /// this only fails on unreadable or malformed input.
    pub fn load(&self) -> Result<Config, WrapError> {
        let mut cfg = Config::default();

        if let Some(path) = self.config_file_path() {
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    cfg = Config::from_yaml(&text).map_err(|e| match e {
                        WrapError::Config(msg) => {
                            WrapError::Config(format!("{}: {msg}", path.display()))
                        }
                        other => other,
                    })?;
                    debug!(path = %path.display(), "loaded config file");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "no config file, using defaults");
                }
                Err(e) => {
                    return Err(WrapError::Config(format!(
                        "failed to read {}: {e}",
                        path.display()
                    )));
                }
            }
        }

        self.apply_env(&mut cfg)?;

        if self.overrides.quiet {
            cfg.quiet = true;
        }

        Ok(cfg)
    }

    fn env_var(&self, name: &str) -> Option<String> {
        let value = match &self.env {
            Some(map) => map.get(name).cloned(),
            None => std::env::var(name).ok(),
        };
        value.filter(|v| !v.is_empty())
    }

    /// Resolve the config file location: CLI flag, then `$NTFY_CONFIG`, then
    /// the XDG directory, then `~/.config`.
    fn config_file_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.overrides.config_path {
            return Some(path.clone());
        }
        if let Some(path) = self.env_var(ENV_CONFIG) {
            return Some(PathBuf::from(path));
        }
        if let Some(xdg) = self.env_var("XDG_CONFIG_HOME") {
            return Some(PathBuf::from(xdg).join(APP_DIR).join(CONFIG_FILE));
        }
        dirs::home_dir().map(|home| home.join(".config").join(APP_DIR).join(CONFIG_FILE))
    }

    fn apply_env(&self, cfg: &mut Config) -> Result<(), WrapError> {
        if let Some(topic) = self.env_var(ENV_TOPIC) {
            cfg.ntfy_topic = topic;
        }
        if let Some(server) = self.env_var(ENV_SERVER) {
            cfg.ntfy_server = server;
        }
        if let Some(timeout) = self.env_var(ENV_BACKSTOP_TIMEOUT) {
            cfg.backstop_timeout = humantime::parse_duration(&timeout).map_err(|e| {
                WrapError::Config(format!("invalid {ENV_BACKSTOP_TIMEOUT} {timeout:?}: {e}"))
            })?;
        }
        if let Some(quiet) = self.env_var(ENV_QUIET) {
            cfg.quiet = parse_bool(ENV_QUIET, &quiet)?;
        }
        if let Some(startup) = self.env_var(ENV_STARTUP) {
            cfg.startup_notify = parse_bool(ENV_STARTUP, &startup)?;
        }
        if let Some(args) = self.env_var(ENV_DEFAULT_ARGS) {
            cfg.default_args = args
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(path) = self.env_var(ENV_CLAUDE_PATH) {
            cfg.claude_path = Some(PathBuf::from(path));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;

    fn loader_with(env: &[(&str, &str)]) -> ConfigLoader {
        let map = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        // Pin the file source to a nonexistent path unless the test supplies
        // XDG_CONFIG_HOME, so the host's real config never leaks in.
        let has_xdg = env.iter().any(|(k, _)| *k == "XDG_CONFIG_HOME");
        let config_path = if has_xdg {
            None
        } else {
            Some(PathBuf::from("/nonexistent/config.yaml"))
        };
        ConfigLoader::new(CliOverrides {
            config_path,
            quiet: false,
        })
        .with_env(map)
    }

    #[test]
    fn defaults_when_nothing_set() {
        // Point at a nonexistent file so a real ~/.config/claude-ntfy on the
        // host cannot leak into the test.
        let overrides = CliOverrides {
            config_path: Some(PathBuf::from("/nonexistent/config.yaml")),
            quiet: false,
        };
        let cfg = ConfigLoader::new(overrides)
            .with_env(HashMap::new())
            .load()
            .unwrap();
        assert_eq!(cfg.ntfy_server, "https://ntfy.sh");
        assert!(cfg.ntfy_topic.is_empty());
    }

    #[test]
    fn env_overrides_defaults() {
        let cfg = loader_with(&[
            (ENV_TOPIC, "alerts"),
            (ENV_SERVER, "https://push.internal"),
            (ENV_BACKSTOP_TIMEOUT, "45s"),
            (ENV_QUIET, "false"),
            (ENV_STARTUP, "yes"),
            (ENV_DEFAULT_ARGS, "--model, opus ,"),
            (ENV_CLAUDE_PATH, "/opt/claude/bin/claude"),
        ])
        .load()
        .unwrap();

        assert_eq!(cfg.ntfy_topic, "alerts");
        assert_eq!(cfg.ntfy_server, "https://push.internal");
        assert_eq!(cfg.backstop_timeout, Duration::from_secs(45));
        assert!(!cfg.quiet);
        assert!(cfg.startup_notify);
        assert_eq!(cfg.default_args, vec!["--model", "opus"]);
        assert_eq!(
            cfg.claude_path.as_deref(),
            Some(std::path::Path::new("/opt/claude/bin/claude"))
        );
    }

    #[test]
    fn env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ntfy_topic: from-file\nbackstop_timeout: 5m").unwrap();

        let overrides = CliOverrides {
            config_path: Some(file.path().to_path_buf()),
            quiet: false,
        };
        let cfg = ConfigLoader::new(overrides)
            .with_env(
                [(ENV_TOPIC.to_string(), "from-env".to_string())]
                    .into_iter()
                    .collect(),
            )
            .load()
            .unwrap();

        assert_eq!(cfg.ntfy_topic, "from-env");
        // Untouched file values survive.
        assert_eq!(cfg.backstop_timeout, Duration::from_secs(300));
    }

    #[test]
    fn cli_quiet_outranks_env() {
        let overrides = CliOverrides {
            config_path: None,
            quiet: true,
        };
        let cfg = ConfigLoader::new(overrides)
            .with_env(
                [(ENV_QUIET.to_string(), "false".to_string())]
                    .into_iter()
                    .collect(),
            )
            .load()
            .unwrap();
        assert!(cfg.quiet);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let overrides = CliOverrides {
            config_path: Some(PathBuf::from("/nonexistent/claude-ntfy/config.yaml")),
            quiet: false,
        };
        assert!(ConfigLoader::new(overrides)
            .with_env(HashMap::new())
            .load()
            .is_ok());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ntfy_topic: [oops").unwrap();

        let overrides = CliOverrides {
            config_path: Some(file.path().to_path_buf()),
            quiet: false,
        };
        let err = ConfigLoader::new(overrides)
            .with_env(HashMap::new())
            .load()
            .unwrap_err();
        assert!(matches!(err, WrapError::Config(_)));
    }

    #[test]
    fn invalid_env_duration_is_an_error() {
        let err = loader_with(&[(ENV_BACKSTOP_TIMEOUT, "whenever")])
            .load()
            .unwrap_err();
        assert!(err.to_string().contains(ENV_BACKSTOP_TIMEOUT));
    }

    #[test]
    fn xdg_dir_used_when_set() {
        let dir = tempfile::tempdir().unwrap();
        let conf_dir = dir.path().join(APP_DIR);
        std::fs::create_dir_all(&conf_dir).unwrap();
        std::fs::write(conf_dir.join(CONFIG_FILE), "ntfy_topic: xdg-topic\n").unwrap();

        let cfg = loader_with(&[("XDG_CONFIG_HOME", dir.path().to_str().unwrap())])
            .load()
            .unwrap();
        assert_eq!(cfg.ntfy_topic, "xdg-topic");
    }
}
