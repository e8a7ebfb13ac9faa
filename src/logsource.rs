//! Raw kernel log acquisition: journal, ring buffer or log files, first one that gives output wins
//!
//! ```no_run
//! use usbwhy::logsource::{LogFallback, LogWindow};
//!
//! let window = LogWindow { since: Some(3600), lines: None };
//! let chain = LogFallback::system(&window, &["/var/log/kern.log".to_string()]);
//! let entries = usbwhy::logsource::collect_entries(&chain, &window);
//! println!("{} USB related entries", entries.len());
//! ```
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::{filter_usb_entries, LogEntry};
use crate::command;
use crate::error::{Error, ErrorKind, Result};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Well known kernel log files tried after the journal and ring buffer
pub const DEFAULT_LOG_FILES: &[&str] = &["/var/log/kern.log", "/var/log/messages", "/var/log/syslog"];

/// Bound on how much history to read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogWindow {
    /// Only entries from the last N seconds; entries without a timestamp are always kept
    pub since: Option<u64>,
    /// Only the last N raw lines (ring buffer and files)
    pub lines: Option<usize>,
}

/// A fallible supplier of raw log text
pub trait LogSource: std::fmt::Debug {
    /// Short name for logging
    fn name(&self) -> String;
    /// Read the raw log; an error or empty output moves on to the next source
    fn read(&self) -> Result<String>;
}

/// Keep only the last `n` lines of `text`; zero is no limit
fn tail(text: String, n: Option<usize>) -> String {
    match n {
        Some(n) if n > 0 => {
            let lines: Vec<&str> = text.lines().collect();
            let start = lines.len().saturating_sub(n);
            lines[start..].join("\n")
        }
        _ => text,
    }
}

/// Kernel messages from the systemd journal
#[derive(Debug, Clone, Default)]
pub struct Journal {
    /// Passed as `--since=-Ns`
    pub since: Option<u64>,
}

impl LogSource for Journal {
    fn name(&self) -> String {
        "journalctl".into()
    }

    fn read(&self) -> Result<String> {
        let since = self.since.map(|s| format!("--since=-{}s", s));
        let mut args = vec!["-k", "--no-pager", "-o", "short-iso"];
        if let Some(s) = since.as_deref() {
            args.push(s);
        }
        command::run("journalctl", &args, COMMAND_TIMEOUT)
    }
}

/// Kernel ring buffer via `dmesg`
#[derive(Debug, Clone, Default)]
pub struct RingBuffer {
    /// Keep only the last N lines
    pub lines: Option<usize>,
}

impl LogSource for RingBuffer {
    fn name(&self) -> String {
        "dmesg".into()
    }

    fn read(&self) -> Result<String> {
        // -T gives wall clock times but older util-linux lacks it
        let out = match command::run("dmesg", &["-T"], COMMAND_TIMEOUT) {
            Ok(out) => out,
            Err(e) => {
                log::debug!("dmesg -T failed, trying plain dmesg: {:#}", e);
                command::run("dmesg", &[], COMMAND_TIMEOUT)?
            }
        };
        Ok(tail(out, self.lines))
    }
}

/// A log file on disk
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
    lines: Option<usize>,
}

impl LogFile {
    /// New source reading `path`, keeping the last `lines` lines
    pub fn new<P: AsRef<Path>>(path: P, lines: Option<usize>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lines,
        }
    }
}

impl LogSource for LogFile {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<String> {
        let bytes = fs::read(&self.path)?;
        // logs can contain partial multi-byte sequences from early boot
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(tail(text, self.lines))
    }
}

/// Ordered list of sources; the first to return non-empty text is used
#[derive(Debug, Default)]
pub struct LogFallback {
    sources: Vec<Box<dyn LogSource>>,
}

impl LogFallback {
    /// Empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source to try after those already added
    pub fn with_source<S: LogSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// The usual system chain: journal, ring buffer, then each of `log_files`
    pub fn system(window: &LogWindow, log_files: &[String]) -> Self {
        let mut chain = Self::new()
            .with_source(Journal {
                since: window.since,
            })
            .with_source(RingBuffer {
                lines: window.lines,
            });
        for path in log_files {
            chain = chain.with_source(LogFile::new(path, window.lines));
        }
        chain
    }

    /// Try each source in order; error if none produced output
    pub fn read(&self) -> Result<(String, String)> {
        for source in &self.sources {
            match source.read() {
                Ok(text) if !text.trim().is_empty() => {
                    log::info!("Reading kernel log from {}", source.name());
                    return Ok((source.name(), text));
                }
                Ok(_) => log::debug!("{} returned no output", source.name()),
                Err(e) => log::debug!("{} unavailable: {:#}", source.name(), e),
            }
        }

        Err(Error::new(
            ErrorKind::NotFound,
            "No kernel log source available; tried journalctl, dmesg and log files",
        ))
    }
}

/// Oldest time still inside a window of `since` seconds; `None` if the window reaches past what a timestamp can hold
fn cutoff(since: u64) -> Option<DateTime<Local>> {
    let secs = i64::try_from(since).ok()?;
    let window = chrono::Duration::try_seconds(secs)?;
    Local::now().checked_sub_signed(window)
}

/// Drop entries with a timestamp older than `since` seconds ago; entries without one are kept
pub fn apply_since(entries: Vec<LogEntry>, since: Option<u64>) -> Vec<LogEntry> {
    let Some(since) = since else {
        return entries;
    };
    let Some(cutoff) = cutoff(since) else {
        log::debug!("--since {} covers all time", since);
        return entries;
    };
    entries
        .into_iter()
        .filter(|e| e.timestamp.map(|t| t >= cutoff).unwrap_or(true))
        .collect()
}

/// Read raw lines from `chain`, keep the USB relevant ones and classify them
///
/// Never fails: no available source gives an empty list so diagnosis still runs.
pub fn collect_entries(chain: &LogFallback, window: &LogWindow) -> Vec<LogEntry> {
    match chain.read() {
        Ok((source, text)) => {
            let lines: Vec<&str> = text.lines().collect();
            let entries = apply_since(filter_usb_entries(&lines), window.since);
            log::debug!(
                "{} of {} lines from {} are USB related",
                entries.len(),
                lines.len(),
                source
            );
            entries
        }
        Err(e) => {
            log::warn!("{:#}", e);
            Vec::new()
        }
    }
}
