//! Error types shared across the workspace.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems. Any of these aborts startup; the sync loop
/// is never constructed from an invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with file path context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Polling interval missing or zero for the named source section.
    #[error("{section}: polling interval must be greater than zero")]
    NonPositiveInterval { section: &'static str },

    /// The desktop automation status pattern lacks the `@status`
    /// placeholder, so no capture group can be substituted.
    #[error("desktop-automation: status pattern must contain the @status placeholder")]
    MissingStatusPlaceholder,

    /// The desktop automation status pattern is not a valid regex after
    /// placeholder substitution.
    #[error("desktop-automation: invalid status pattern: {0}")]
    InvalidStatusPattern(String),

    /// A referenced environment variable is not set.
    #[error("undefined environment variable {name} in {field}")]
    UndefinedEnvVar { name: String, field: &'static str },
}

/// Convenience constructor for [`ConfigError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

/// Failures surfaced by a light actuator after local recovery (retries) is
/// exhausted. The loop logs these and retries the same target status on the
/// next tick.
#[derive(Debug, Error)]
pub enum ActuatorError {
    /// Transport-level failure talking to the device.
    #[error("transport error during {context}: {message}")]
    Transport {
        context: &'static str,
        message: String,
    },

    /// The device answered but rejected the command.
    #[error("device rejected {context}: {message}")]
    Device {
        context: &'static str,
        message: String,
    },

    /// Shutdown cancelled an in-flight retry ladder.
    #[error("operation cancelled")]
    Cancelled,
}
