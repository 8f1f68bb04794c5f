//! Enumerated user-facing log messages.
//!
//! Call sites name *what happened* with a [`LogKind`] and optionally attach one
//! contextual [`LogValue`]; the wording and severity live here, in one place.

use std::fmt;
use std::path::Path;

use tracing::{error, info, warn};

/// Severity attached to each [`LogKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something failed; the affected job (or the process) did not succeed.
    Error,
    /// A fallback was taken; processing continues.
    Warning,
    /// Normal progress information.
    Info,
}

/// Every message the download pipeline reports to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Destination directory is not writable.
    PathNotWritable,
    /// A job finished unsuccessfully.
    DownloadFailed,
    /// The local modification time could not be aligned with the remote one.
    FiletimeSetFailed,
    /// A job list file could not be read.
    JobFileUnreadable,
    /// The server did not report a modification time.
    FiletimeUnknown,
    /// No filename could be derived from headers or URL.
    FilenameUnknown,
    /// No extension could be derived from content type or URL.
    FiletypeUnknown,
    /// Timestamps match but sizes do not.
    SizeMismatch,
    /// A partial local file was found.
    IncompleteFile,
    /// The local file already matches the remote one.
    SkipDownloaded,
    /// Transfer continues from a byte offset.
    ResumeAt,
    /// Transfer is about to start.
    Downloading,
    /// A job finished successfully.
    Done,
}

impl LogKind {
    /// Severity used when emitting this kind.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::PathNotWritable
            | Self::DownloadFailed
            | Self::FiletimeSetFailed
            | Self::JobFileUnreadable => Severity::Error,
            Self::FiletimeUnknown
            | Self::FilenameUnknown
            | Self::FiletypeUnknown
            | Self::SizeMismatch => Severity::Warning,
            Self::IncompleteFile
            | Self::SkipDownloaded
            | Self::ResumeAt
            | Self::Downloading
            | Self::Done => Severity::Info,
        }
    }

    /// Human-readable message text.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::PathNotWritable => "Path is not writable",
            Self::DownloadFailed => "Couldn't download file",
            Self::FiletimeSetFailed => {
                "Tried but couldn't set file modification time to remote file time"
            }
            Self::JobFileUnreadable => "Couldn't open job list",
            Self::FiletimeUnknown => "Couldn't determine file modification time",
            Self::FilenameUnknown => "Couldn't determine filename",
            Self::FiletypeUnknown => "Couldn't determine filetype, using .bin",
            Self::SizeMismatch => {
                "Remote and local file modification time match, but size is different; redownloading"
            }
            Self::IncompleteFile => "Found incomplete file at",
            Self::SkipDownloaded => "Skipping already downloaded file",
            Self::ResumeAt => "Resuming download at byte",
            Self::Downloading => "Downloading to",
            Self::Done => "Done",
        }
    }

    /// Stable machine-readable code, recorded as the `event` field.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::PathNotWritable => "path_not_writable",
            Self::DownloadFailed => "download_failed",
            Self::FiletimeSetFailed => "filetime_set_failed",
            Self::JobFileUnreadable => "job_file_unreadable",
            Self::FiletimeUnknown => "filetime_unknown",
            Self::FilenameUnknown => "filename_unknown",
            Self::FiletypeUnknown => "filetype_unknown",
            Self::SizeMismatch => "size_mismatch",
            Self::IncompleteFile => "incomplete_file",
            Self::SkipDownloaded => "skip_downloaded",
            Self::ResumeAt => "resume_at",
            Self::Downloading => "downloading",
            Self::Done => "done",
        }
    }
}

/// Optional context attached to a log message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogValue {
    /// Free text, usually a path or filename.
    Text(String),
    /// A number, usually a byte offset.
    Number(i64),
}

impl LogValue {
    /// Context value for a filesystem path.
    #[must_use]
    pub fn path(path: &Path) -> Self {
        Self::Text(path.display().to_string())
    }
}

impl fmt::Display for LogValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "\"{text}\""),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<&str> for LogValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for LogValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for LogValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<u64> for LogValue {
    fn from(value: u64) -> Self {
        Self::Number(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

/// Renders the full line for a message, as it appears in the log.
#[must_use]
pub fn render(kind: LogKind, value: Option<&LogValue>) -> String {
    match value {
        Some(value) => format!("{} {value}", kind.message()),
        None => kind.message().to_string(),
    }
}

/// Emits `kind` at its severity with the optional context value.
pub fn log_event(kind: LogKind, value: Option<LogValue>) {
    let line = render(kind, value.as_ref());
    match kind.severity() {
        Severity::Error => error!(event = kind.code(), "{line}"),
        Severity::Warning => warn!(event = kind.code(), "{line}"),
        Severity::Info => info!(event = kind.code(), "{line}"),
    }
}
