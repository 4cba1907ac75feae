//! Desktop UI automation status source.
//!
//! Reads the presence caption straight out of the presence application's
//! window through a platform accessibility backend (the [`UiAutomation`]
//! trait). The configured pattern carries a `@status` placeholder that
//! becomes a capture group; the captured text is the raw token.
//!
//! Walking an accessibility tree is expensive, so the located window handle
//! is memoized across polls and only re-located after a property access on
//! it fails (the handle went stale, e.g. the application restarted).

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use presencelight_core::config::DesktopAutomationConfig;
use presencelight_core::{normalize, CanonicalStatus, ConfigError, NormalizedReading, StatusSource};

use crate::error::SourceError;

/// Opaque handle to a located application window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowHandle(pub u64);

/// Platform accessibility backend. The adapter logic is platform-neutral;
/// a backend supplies window lookup, element enumeration, and process
/// relaunch.
#[async_trait]
pub trait UiAutomation: Send {
    /// Locate the main window of the named process.
    async fn find_window(
        &mut self,
        process_name: &str,
        window_name: &str,
    ) -> Result<WindowHandle, SourceError>;

    /// Text labels of the candidate presence elements under a window.
    /// Fails with [`SourceError::StaleWindow`] when the handle no longer
    /// answers property reads.
    async fn element_labels(&mut self, window: &WindowHandle) -> Result<Vec<String>, SourceError>;

    /// Relaunch the watched process, minimized, with an optional argument.
    async fn relaunch(
        &mut self,
        process_name: &str,
        argument: Option<&str>,
    ) -> Result<(), SourceError>;
}

/// Reads the presence caption from the application window.
pub struct DesktopAutomationSource {
    ui: Box<dyn UiAutomation>,
    config: DesktopAutomationConfig,
    interval: Duration,
    pattern: Regex,
    window: Option<WindowHandle>,
    last_status: CanonicalStatus,
}

impl DesktopAutomationSource {
    pub fn new(
        config: DesktopAutomationConfig,
        ui: Box<dyn UiAutomation>,
    ) -> Result<Self, ConfigError> {
        if config.interval_secs == 0 {
            return Err(ConfigError::NonPositiveInterval {
                section: "desktop-automation",
            });
        }
        if !config.status_pattern.contains("@status") {
            return Err(ConfigError::MissingStatusPlaceholder);
        }
        let pattern = Regex::new(&config.status_pattern.replace("@status", "(.+)"))
            .map_err(|e| ConfigError::InvalidStatusPattern(e.to_string()))?;
        Ok(Self {
            ui,
            interval: Duration::from_secs(config.interval_secs),
            config,
            pattern,
            window: None,
            last_status: CanonicalStatus::Unknown,
        })
    }

    /// One poll against the accessibility tree. `Ok(None)` means "no new
    /// reading this cycle" (window missing or handle went stale).
    async fn capture(&mut self) -> Result<Option<String>, SourceError> {
        let window = match self.window.clone() {
            Some(window) => window,
            None => match self
                .ui
                .find_window(&self.config.process_name, &self.config.window_name)
                .await
            {
                Ok(window) => {
                    debug!(process = %self.config.process_name, "application window located");
                    self.window = Some(window.clone());
                    window
                }
                Err(SourceError::WindowNotFound { .. }) => {
                    if self.config.restart_process {
                        info!(
                            process = %self.config.process_name,
                            "window not found; relaunching process"
                        );
                        if let Err(err) = self
                            .ui
                            .relaunch(
                                &self.config.process_name,
                                self.config.restart_argument.as_deref(),
                            )
                            .await
                        {
                            warn!(error = %err, "process relaunch failed");
                        }
                    }
                    return Ok(None);
                }
                Err(err) => return Err(err),
            },
        };

        let labels = match self.ui.element_labels(&window).await {
            Ok(labels) => labels,
            Err(SourceError::StaleWindow) => {
                debug!("memoized window handle is stale; re-locating next cycle");
                self.window = None;
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        for label in &labels {
            if let Some(captures) = self.pattern.captures(label) {
                debug!(label = %label, "presence element matched");
                return Ok(Some(captures[1].trim().to_owned()));
            }
        }

        // No element matched; the normalizer turns this into Unknown with
        // a warning, same as an unrecognized token.
        Ok(Some("Unknown".to_owned()))
    }
}

#[async_trait]
impl StatusSource for DesktopAutomationSource {
    fn poll_interval(&self) -> Duration {
        self.interval
    }

    async fn read(&mut self, _cancel: &CancellationToken) -> CanonicalStatus {
        match self.capture().await {
            Ok(Some(token)) => match normalize(&token, "desktop-automation") {
                NormalizedReading::Mapped(status) => {
                    if status != self.last_status {
                        info!(status = %status, "desktop automation presence status changed");
                        self.last_status = status;
                    }
                }
                NormalizedReading::Ignore => {}
                NormalizedReading::Unmapped => self.last_status = CanonicalStatus::Unknown,
            },
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "desktop automation read failed; keeping previous status");
            }
        }
        self.last_status
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
