//! Log-file status source.
//!
//! The presence application appends state-transition lines of the form
//! `"... (current state: Available -> Busy) ..."` to its log. This adapter
//! polls that file read-only (a concurrent appender is expected), re-reads
//! only the bytes appended since the last observed modification time, and
//! takes the newest transition line as the current status.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use presencelight_core::config::LogFileConfig;
use presencelight_core::{normalize, CanonicalStatus, ConfigError, NormalizedReading, StatusSource};

use crate::error::{io_err, SourceError};

const STATE_OPEN: &str = " (current state: ";
const STATE_CLOSE: &str = ") ";
const TRANSITION: &str = " -> ";

/// Polls a status log for state-transition lines.
pub struct LogFileSource {
    path: PathBuf,
    interval: Duration,
    last_status: CanonicalStatus,
    last_mtime: Option<SystemTime>,
    read_offset: u64,
}

impl LogFileSource {
    pub fn new(config: &LogFileConfig) -> Result<Self, ConfigError> {
        if config.interval_secs == 0 {
            return Err(ConfigError::NonPositiveInterval {
                section: "log-file",
            });
        }
        Ok(Self {
            path: config.resolved_path()?,
            interval: Duration::from_secs(config.interval_secs),
            last_status: CanonicalStatus::Unknown,
            last_mtime: None,
            read_offset: 0,
        })
    }

    /// Scan appended log content and fold the newest transition line into
    /// `last_status`. An absent file is not an error: the previous status
    /// stands until the log reappears.
    async fn scan(&mut self) -> Result<(), SourceError> {
        let meta = match fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(io_err(&self.path, err)),
        };

        let mtime = meta.modified().map_err(|e| io_err(&self.path, e))?;
        if self.last_mtime.is_some_and(|prev| mtime <= prev) {
            return Ok(());
        }

        // A shrinking file means rotation; start over from the beginning.
        let len = meta.len();
        if len < self.read_offset {
            self.read_offset = 0;
        }

        let mut file = fs::File::open(&self.path)
            .await
            .map_err(|e| io_err(&self.path, e))?;
        file.seek(SeekFrom::Start(self.read_offset))
            .await
            .map_err(|e| io_err(&self.path, e))?;
        let mut appended = String::new();
        file.read_to_string(&mut appended)
            .await
            .map_err(|e| io_err(&self.path, e))?;

        // The appender may be mid-line; only complete lines are consumed
        // and the torn tail is re-read next cycle.
        let consumed = appended.rfind('\n').map_or(0, |i| i + 1);

        // Most recent line first; the first transition line wins.
        for line in appended[..consumed].lines().rev() {
            let Some(token) = extract_state_token(line) else {
                continue;
            };
            match normalize(token, "log-file") {
                NormalizedReading::Mapped(status) => {
                    if status != self.last_status {
                        info!(status = %status, "log-file presence status changed");
                        self.last_status = status;
                    }
                }
                NormalizedReading::Ignore => {}
                NormalizedReading::Unmapped => self.last_status = CanonicalStatus::Unknown,
            }
            break;
        }

        self.read_offset += consumed as u64;
        self.last_mtime = Some(mtime);
        Ok(())
    }
}

/// Pull the status token out of one log line, or `None` when the line is
/// not a state transition. The token is whatever follows the last `" -> "`
/// between the literal delimiters.
fn extract_state_token(line: &str) -> Option<&str> {
    let start = line.find(STATE_OPEN)? + STATE_OPEN.len();
    let rest = &line[start..];
    let end = rest.find(STATE_CLOSE)?;
    let info = &rest[..end];
    info.split(TRANSITION).last()
}

#[async_trait]
impl StatusSource for LogFileSource {
    fn poll_interval(&self) -> Duration {
        self.interval
    }

    async fn read(&mut self, _cancel: &CancellationToken) -> CanonicalStatus {
        if let Err(err) = self.scan().await {
            warn!(error = %err, "log-file read failed; keeping previous status");
        }
        self.last_status
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;
    use std::io::Write;

    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    use super::*;

    fn source_for(dir: &TempDir) -> LogFileSource {
        LogFileSource::new(&LogFileConfig {
            path: dir.path().join("teams.log").display().to_string(),
            interval_secs: 5,
        })
        .expect("construct source")
    }

    fn append(dir: &TempDir, lines: &[&str], mtime_unix: i64) {
        let path = dir.path().join("teams.log");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .expect("open log");
        for line in lines {
            writeln!(file, "{line}").expect("append line");
        }
        drop(file);
        set_file_mtime(&path, FileTime::from_unix_time(mtime_unix, 0)).expect("set mtime");
    }

    /// Append raw bytes with no trailing newline, as a writer mid-line.
    fn append_raw(dir: &TempDir, text: &str, mtime_unix: i64) {
        let path = dir.path().join("teams.log");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .expect("open log");
        write!(file, "{text}").expect("append text");
        drop(file);
        set_file_mtime(&path, FileTime::from_unix_time(mtime_unix, 0)).expect("set mtime");
    }

    #[test]
    fn zero_interval_is_a_config_error() {
        let result = LogFileSource::new(&LogFileConfig {
            path: "/tmp/teams.log".to_owned(),
            interval_secs: 0,
        });
        assert!(matches!(
            result,
            Err(ConfigError::NonPositiveInterval { .. })
        ));
    }

    #[tokio::test]
    async fn absent_file_yields_previous_status() {
        let dir = TempDir::new().expect("dir");
        let mut source = source_for(&dir);
        let cancel = CancellationToken::new();
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Unknown);
    }

    #[tokio::test]
    async fn transition_lines_are_read_newest_first() {
        let dir = TempDir::new().expect("dir");
        let mut source = source_for(&dir);
        let cancel = CancellationToken::new();

        append(
            &dir,
            &["12:00:01 StatusIndicatorStateService: Added (current state: Available -> Busy) tag"],
            1_000,
        );
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Busy);

        append(
            &dir,
            &["12:00:07 StatusIndicatorStateService: Added (current state: Busy -> Available) tag"],
            1_001,
        );
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Available);
    }

    #[tokio::test]
    async fn newest_of_several_appended_lines_wins() {
        let dir = TempDir::new().expect("dir");
        let mut source = source_for(&dir);
        let cancel = CancellationToken::new();

        append(
            &dir,
            &[
                "a (current state: Unknown -> Available) x",
                "b irrelevant line",
                "c (current state: Available -> DoNotDisturb) x",
            ],
            1_000,
        );
        assert_eq!(source.read(&cancel).await, CanonicalStatus::DoNotDisturb);
    }

    #[tokio::test]
    async fn unchanged_mtime_skips_rescan() {
        let dir = TempDir::new().expect("dir");
        let mut source = source_for(&dir);
        let cancel = CancellationToken::new();

        append(&dir, &["a (current state: Unknown -> Busy) x"], 1_000);
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Busy);

        // Append without advancing mtime; the gate must hold the old value.
        append(&dir, &["b (current state: Busy -> Available) x"], 1_000);
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Busy);

        // Advancing mtime picks the appended line up.
        set_file_mtime(
            dir.path().join("teams.log"),
            FileTime::from_unix_time(1_002, 0),
        )
        .expect("set mtime");
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Available);
    }

    #[tokio::test]
    async fn new_activity_keeps_previous_status() {
        let dir = TempDir::new().expect("dir");
        let mut source = source_for(&dir);
        let cancel = CancellationToken::new();

        append(&dir, &["a (current state: Unknown -> Busy) x"], 1_000);
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Busy);

        append(&dir, &["b (current state: Busy -> NewActivity) x"], 1_001);
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Busy);
    }

    #[tokio::test]
    async fn unmapped_token_resolves_unknown() {
        let dir = TempDir::new().expect("dir");
        let mut source = source_for(&dir);
        let cancel = CancellationToken::new();

        append(&dir, &["a (current state: Unknown -> Busy) x"], 1_000);
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Busy);

        append(&dir, &["b (current state: Busy -> Focusing) x"], 1_001);
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Unknown);
    }

    #[tokio::test]
    async fn torn_line_is_held_until_the_writer_completes_it() {
        let dir = TempDir::new().expect("dir");
        let mut source = source_for(&dir);
        let cancel = CancellationToken::new();

        // The appender is caught mid-line: nothing to consume yet.
        append_raw(&dir, "a (current state: Unknown -> Bu", 1_000);
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Unknown);

        // The write completes; the whole line must be seen on this poll.
        append_raw(&dir, "sy) tag\n", 1_001);
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Busy);
    }

    #[tokio::test]
    async fn complete_lines_before_a_torn_tail_are_consumed() {
        let dir = TempDir::new().expect("dir");
        let mut source = source_for(&dir);
        let cancel = CancellationToken::new();

        append_raw(
            &dir,
            "a (current state: Unknown -> Busy) x\nb (current state: Busy -> Avail",
            1_000,
        );
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Busy);

        append_raw(&dir, "able) x\n", 1_001);
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Available);
    }

    #[tokio::test]
    async fn deleted_file_mid_run_yields_previous_status() {
        let dir = TempDir::new().expect("dir");
        let mut source = source_for(&dir);
        let cancel = CancellationToken::new();

        append(&dir, &["a (current state: Unknown -> Busy) x"], 1_000);
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Busy);

        std::fs::remove_file(dir.path().join("teams.log")).expect("delete log");
        assert_eq!(source.read(&cancel).await, CanonicalStatus::Busy);
    }

    #[test]
    fn token_extraction() {
        assert_eq!(
            extract_state_token("x (current state: Available -> Busy) y"),
            Some("Busy")
        );
        // No transition arrow: the whole state text is the token.
        assert_eq!(
            extract_state_token("x (current state: Busy) y"),
            Some("Busy")
        );
        assert_eq!(extract_state_token("no delimiters here"), None);
        assert_eq!(extract_state_token("x (current state: unterminated"), None);
    }
}
