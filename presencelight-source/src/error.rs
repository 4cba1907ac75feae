//! Error types internal to the source adapters.
//!
//! These never cross the [`StatusSource`](presencelight_core::StatusSource)
//! boundary: every variant of [`SourceError`] is caught inside `read`,
//! logged, and answered with the previous status.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while taking one presence reading.
#[derive(Debug, Error)]
pub enum SourceError {
    /// I/O failure on the status log, with annotated path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP transport failure against the directory API.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token acquisition failed or the cached credential was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The directory answered with an unexpected payload.
    #[error("unexpected directory response: {0}")]
    Protocol(String),

    /// The target application window could not be located.
    #[error("window not found for process {process}")]
    WindowNotFound { process: String },

    /// A memoized window handle no longer answers property reads.
    #[error("window handle is stale")]
    StaleWindow,

    /// Relaunching the watched process failed.
    #[error("failed to relaunch {process}: {message}")]
    Relaunch { process: String, message: String },
}

/// Convenience constructor for [`SourceError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SourceError {
    SourceError::Io {
        path: path.into(),
        source,
    }
}
