//! # presencelight-source
//!
//! The three status source variants behind the
//! [`StatusSource`](presencelight_core::StatusSource) boundary:
//!
//! - [`LogFileSource`] — tail the presence application's own log file
//! - [`CloudDirectorySource`] — poll a cloud directory presence endpoint
//! - [`DesktopAutomationSource`] — read the status caption from the
//!   application window via a platform [`UiAutomation`] backend
//!
//! All variants share one failure policy: errors are contained inside
//! `read` and answered with the previous canonical status, so a flaky
//! source can never take the sync loop down.

pub mod cloud;
pub mod desktop;
pub mod error;
pub mod logfile;

pub use cloud::{AccessToken, CloudDirectorySource, DirectoryApi, RestDirectoryApi};
pub use desktop::{DesktopAutomationSource, UiAutomation, WindowHandle};
pub use error::SourceError;
pub use logfile::LogFileSource;
