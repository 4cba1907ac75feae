//! Configuration model.
//!
//! One YAML document selects a source variant, a light variant, and the
//! apply policy. The file is validated here, before any adapter is built;
//! the sync loop only ever sees already-valid adapter instances.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Root of the presencelight configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub source: SourceConfig,
    pub light: LightConfig,
    #[serde(default)]
    pub apply_policy: ApplyPolicy,
}

/// When the loop forwards a freshly read status to the light.
///
/// Exactly one policy applies per deployment; the loop logs the active one
/// at startup and never mixes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyPolicy {
    /// Apply only when the status differs from the last applied one.
    /// Suitable for idempotent actuators (both shipped variants are).
    #[default]
    OnChange,
    /// Re-apply every tick, for devices whose physical state may drift.
    EveryTick,
}

impl std::fmt::Display for ApplyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyPolicy::OnChange => write!(f, "on-change"),
            ApplyPolicy::EveryTick => write!(f, "every-tick"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Closed set of status source variants, selected by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SourceConfig {
    LogFile(LogFileConfig),
    CloudDirectory(CloudDirectoryConfig),
    DesktopAutomation(DesktopAutomationConfig),
}

impl SourceConfig {
    /// Configured polling period. Only valid after [`Config::validate`].
    pub fn poll_interval(&self) -> Duration {
        let secs = match self {
            SourceConfig::LogFile(c) => c.interval_secs,
            SourceConfig::CloudDirectory(c) => c.interval_secs,
            SourceConfig::DesktopAutomation(c) => c.interval_secs,
        };
        Duration::from_secs(secs)
    }

    fn section(&self) -> &'static str {
        match self {
            SourceConfig::LogFile(_) => "log-file",
            SourceConfig::CloudDirectory(_) => "cloud-directory",
            SourceConfig::DesktopAutomation(_) => "desktop-automation",
        }
    }
}

/// Tail a status log written by the presence application itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogFileConfig {
    /// Log file location. May reference environment variables as `${VAR}`
    /// or `%VAR%`.
    pub path: String,
    pub interval_secs: u64,
}

impl LogFileConfig {
    /// Path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<PathBuf, ConfigError> {
        expand_env(&self.path, "source.path").map(PathBuf::from)
    }
}

/// Poll a cloud directory's presence REST endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudDirectoryConfig {
    pub interval_secs: u64,
    pub client_id: String,
    pub tenant_id: String,
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default = "default_presence_url")]
    pub presence_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_authority() -> String {
    "https://login.microsoftonline.com".to_owned()
}

fn default_presence_url() -> String {
    "https://graph.microsoft.com/v1.0/me/presence".to_owned()
}

fn default_scopes() -> Vec<String> {
    vec!["Presence.Read".to_owned()]
}

/// Read the status caption from the presence application's own window via
/// UI automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesktopAutomationConfig {
    pub interval_secs: u64,
    pub process_name: String,
    pub window_name: String,
    #[serde(default = "default_true")]
    pub restart_process: bool,
    #[serde(default)]
    pub restart_argument: Option<String>,
    /// Element-text pattern; `@status` marks the capture group, e.g.
    /// `"Your profile, status displayed as @status\\."`.
    pub status_pattern: String,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Lights
// ---------------------------------------------------------------------------

/// Closed set of light actuator variants, selected by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LightConfig {
    RelayPair(RelayPairConfig),
    Rgb(RgbConfig),
}

/// Two independently addressable on/off relays (red + green), DIY-mode
/// HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayPairConfig {
    pub red_url: String,
    pub green_url: String,
    /// Relay firmware API version; the device-info payload shape changed
    /// after 3.5.
    #[serde(default = "default_api_version")]
    pub api_version: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_version() -> f64 {
    3.0
}

fn default_timeout_secs() -> u64 {
    10
}

/// A single RGB peripheral behind the vendor's localhost REST bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RgbConfig {
    /// Color only the headset zone instead of every zone.
    #[serde(default)]
    pub headset_only: bool,
    #[serde(default = "default_rgb_bridge_url")]
    pub bridge_url: String,
}

fn default_rgb_bridge_url() -> String {
    "http://localhost:54235/razer/chromasdk".to_owned()
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

/// Load and validate a configuration file.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let config: Config = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Reject configurations no adapter could be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.poll_interval().is_zero() {
            return Err(ConfigError::NonPositiveInterval {
                section: self.source.section(),
            });
        }
        if let SourceConfig::LogFile(log) = &self.source {
            log.resolved_path()?;
        }
        if let SourceConfig::DesktopAutomation(desktop) = &self.source {
            if !desktop.status_pattern.contains("@status") {
                return Err(ConfigError::MissingStatusPlaceholder);
            }
        }
        Ok(())
    }
}

/// Expand `${VAR}` and `%VAR%` references against the process environment.
fn expand_env(value: &str, field: &'static str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    loop {
        let (prefix, name, suffix) = match (rest.find("${"), rest.find('%')) {
            (Some(dollar), percent) if percent.map_or(true, |p| dollar < p) => {
                let after = &rest[dollar + 2..];
                match after.find('}') {
                    Some(end) => (&rest[..dollar], &after[..end], &after[end + 1..]),
                    None => break,
                }
            }
            (_, Some(percent)) => {
                let after = &rest[percent + 1..];
                match after.find('%') {
                    Some(end) if end > 0 => (&rest[..percent], &after[..end], &after[end + 1..]),
                    _ => break,
                }
            }
            _ => break,
        };
        let resolved = std::env::var(name).map_err(|_| ConfigError::UndefinedEnvVar {
            name: name.to_owned(),
            field,
        })?;
        out.push_str(prefix);
        out.push_str(&resolved);
        rest = suffix;
    }
    out.push_str(rest);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
