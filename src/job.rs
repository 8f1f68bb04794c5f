//! Download job descriptions and job list files.
//!
//! A job list file holds one `URL [FILENAME]` entry per line. The URL and the
//! optional filename are separated by the first run of whitespace; blank lines
//! and lines starting with `#` are ignored.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// URL schemes accepted as the start of a job.
pub const SUPPORTED_SCHEMES: [&str; 3] = ["http://", "https://", "ftp://"];

/// One requested download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadJob {
    /// Resource to fetch.
    pub url: String,
    /// Destination directory.
    pub path: PathBuf,
    /// Caller-supplied filename, used instead of a derived one.
    pub filename: Option<String>,
}

impl DownloadJob {
    /// Creates a job; an empty filename override counts as none.
    #[must_use]
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>, filename: Option<String>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            filename: filename.filter(|name| !name.trim().is_empty()),
        }
    }
}

/// Errors reading a job list file.
#[derive(Debug, Error)]
pub enum JobFileError {
    /// The file could not be opened or read.
    #[error("couldn't open job list {path}: {source}")]
    Read {
        /// The job list path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Returns true when `value` starts with a supported URL scheme.
#[must_use]
pub fn looks_like_url(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    SUPPORTED_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// Parses one job list line into a job for `dir`.
///
/// Returns `None` for blank lines, comments, and lines whose first token is
/// not a supported URL.
#[must_use]
pub fn parse_job_line(line: &str, dir: &Path) -> Option<DownloadJob> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let (url, filename) = match trimmed.split_once(char::is_whitespace) {
        Some((url, rest)) => (url, Some(rest.trim().to_string())),
        None => (trimmed, None),
    };

    if !looks_like_url(url) {
        warn!(line = %trimmed, "skipping job list line without a supported URL");
        return None;
    }

    Some(DownloadJob::new(url, dir, filename))
}

/// Reads all jobs from a job list file.
///
/// # Errors
///
/// Returns [`JobFileError::Read`] if the file cannot be read; no jobs can be
/// derived from it.
pub fn load_job_file(file: &Path, dir: &Path) -> Result<Vec<DownloadJob>, JobFileError> {
    let contents = std::fs::read_to_string(file).map_err(|source| JobFileError::Read {
        path: file.to_path_buf(),
        source,
    })?;
    let jobs: Vec<DownloadJob> = contents
        .lines()
        .filter_map(|line| parse_job_line(line, dir))
        .collect();
    debug!(file = %file.display(), jobs = jobs.len(), "loaded job list");
    Ok(jobs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_job_line_url_only() {
        let job = parse_job_line("https://example.com/a.pdf", Path::new("out")).unwrap();
        assert_eq!(job.url, "https://example.com/a.pdf");
        assert_eq!(job.path, PathBuf::from("out"));
        assert!(job.filename.is_none());
    }

    #[test]
    fn test_parse_job_line_with_filename_keeps_inner_spaces() {
        let job = parse_job_line(
            "https://example.com/a.pdf   Annual Report 2024",
            Path::new("."),
        )
        .unwrap();
        assert_eq!(job.url, "https://example.com/a.pdf");
        assert_eq!(job.filename.as_deref(), Some("Annual Report 2024"));
    }

    #[test]
    fn test_parse_job_line_skips_blank_and_comment() {
        assert!(parse_job_line("   ", Path::new(".")).is_none());
        assert!(parse_job_line("# mirror list", Path::new(".")).is_none());
    }

    #[test]
    fn test_parse_job_line_rejects_non_url() {
        assert!(parse_job_line("example.com/a.pdf", Path::new(".")).is_none());
    }

    #[test]
    fn test_looks_like_url_accepts_ftp_case_insensitive() {
        assert!(looks_like_url("FTP://mirror.example.org/pub/file.iso"));
        assert!(!looks_like_url("file:///etc/passwd"));
    }

    #[test]
    fn test_load_job_file_reads_all_lines() {
        let dir = TempDir::new().unwrap();
        let list = dir.path().join("jobs.txt");
        std::fs::write(
            &list,
            "https://example.com/one.zip\n\n# skip\nftp://example.org/two.iso two\n",
        )
        .unwrap();

        let jobs = load_job_file(&list, Path::new("downloads")).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].filename.as_deref(), Some("two"));
        assert!(jobs.iter().all(|job| job.path == Path::new("downloads")));
    }

    #[test]
    fn test_load_job_file_missing_is_error() {
        let dir = TempDir::new().unwrap();
        let err = load_job_file(&dir.path().join("nope.txt"), Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("nope.txt"));
    }
}
