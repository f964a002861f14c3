//! Configuration loading and parsing.
//!
//! Every field of the TOML file is optional and falls back to [`SyncConfig::default`].

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::playback_log::CommandLogSource;

/// Configuration file schema.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    /// Playback log poll interval in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Default output device check interval in milliseconds.
    pub device_poll_interval_ms: Option<u64>,
    /// How often the status display is refreshed, in milliseconds.
    pub display_interval_ms: Option<u64>,
    /// How long shutdown waits for an in-flight sync cycle, in milliseconds.
    pub shutdown_grace_ms: Option<u64>,
    /// Player log settings.
    pub log: Option<LogSourceConfig>,
}

/// `[log]` table.
#[derive(Debug, Default, Deserialize)]
pub struct LogSourceConfig {
    /// Program and arguments that print recent player log lines.
    pub command: Option<Vec<String>>,
    /// Keys that precede a sample rate in the log output.
    pub rate_keys: Option<Vec<String>>,
    /// Kill the log command after this many milliseconds (0 disables).
    pub timeout_ms: Option<u64>,
}

impl FileConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg =
            toml::from_str::<FileConfig>(&raw).with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Resolved runtime settings.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    pub device_poll_interval: Duration,
    pub display_interval: Duration,
    pub shutdown_grace: Duration,
    pub log_command: Vec<String>,
    pub rate_keys: Vec<String>,
    pub log_timeout: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            device_poll_interval: Duration::from_millis(500),
            display_interval: Duration::from_millis(500),
            shutdown_grace: Duration::from_secs(2),
            log_command: default_log_command(),
            rate_keys: ["sampleRate", "asbdSampleRate", "sample rate"]
                .into_iter()
                .map(String::from)
                .collect(),
            log_timeout: Some(Duration::from_secs(5)),
        }
    }
}

#[cfg(target_os = "macos")]
fn default_log_command() -> Vec<String> {
    [
        "log",
        "show",
        "--style",
        "compact",
        "--last",
        "10s",
        "--predicate",
        "process == \"Music\"",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(not(target_os = "macos"))]
fn default_log_command() -> Vec<String> {
    Vec::new()
}

impl SyncConfig {
    /// Merge a config file over the defaults.
    pub fn from_file(cfg: &FileConfig) -> Result<Self> {
        let mut out = Self::default();
        if let Some(ms) = cfg.poll_interval_ms {
            out.poll_interval = interval_from_ms("poll_interval_ms", ms)?;
        }
        if let Some(ms) = cfg.device_poll_interval_ms {
            out.device_poll_interval = interval_from_ms("device_poll_interval_ms", ms)?;
        }
        if let Some(ms) = cfg.display_interval_ms {
            out.display_interval = interval_from_ms("display_interval_ms", ms)?;
        }
        if let Some(ms) = cfg.shutdown_grace_ms {
            out.shutdown_grace = Duration::from_millis(ms);
        }
        if let Some(log) = cfg.log.as_ref() {
            if let Some(command) = log.command.as_ref() {
                out.log_command = command.clone();
            }
            if let Some(keys) = log.rate_keys.as_ref() {
                if keys.iter().all(|k| k.trim().is_empty()) {
                    return Err(anyhow!("log.rate_keys must contain at least one key"));
                }
                out.rate_keys = keys.clone();
            }
            if let Some(ms) = log.timeout_ms {
                out.log_timeout = (ms > 0).then(|| Duration::from_millis(ms));
            }
        }
        Ok(out)
    }

    /// Build the playback log source described by this config.
    pub fn log_source(&self) -> Result<CommandLogSource> {
        let (program, args) = self
            .log_command
            .split_first()
            .filter(|(program, _)| !program.trim().is_empty())
            .ok_or_else(|| anyhow!("log.command must be set in the config on this platform"))?;
        Ok(CommandLogSource::new(
            program.clone(),
            args.to_vec(),
            self.rate_keys.clone(),
            self.log_timeout,
        ))
    }
}

/// Parse an interval, rejecting zero.
pub fn interval_from_ms(field: &str, ms: u64) -> Result<Duration> {
    if ms == 0 {
        return Err(anyhow!("{field} must be greater than zero"));
    }
    Ok(Duration::from_millis(ms))
}
