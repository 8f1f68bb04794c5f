//! Error types for the download module.
//!
//! This module defines structured errors for all download operations,
//! providing context-rich error messages for debugging and user feedback.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while probing, planning or transferring a download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Socket-level failure on a connection the crate manages itself (FTP).
    #[error("connection error downloading {url}: {source}")]
    Connection {
        /// The URL being transferred.
        url: String,
        /// The underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// Connection could not be established within the connect timeout.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success terminal HTTP status.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Negative or unexpected FTP reply.
    #[error("FTP {code} downloading {url}: {message}")]
    FtpStatus {
        /// The URL being transferred.
        url: String,
        /// Reply code, or 0 when the reply could not be parsed.
        code: u16,
        /// Reply text.
        message: String,
    },

    /// The server refused the requested resume offset (HTTP 416).
    #[error("server rejected resume offset for {url}")]
    RangeNotSatisfiable {
        /// The URL whose range request was refused.
        url: String,
    },

    /// File system error during download (create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Destination directory lacks write permission.
    #[error("path is not writable: {path}")]
    PermissionDenied {
        /// The directory that cannot be written.
        path: PathBuf,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The transport cannot handle the URL's scheme.
    #[error("unsupported scheme '{scheme}' for {url}")]
    UnsupportedScheme {
        /// The URL that was requested.
        url: String,
        /// The scheme the transport does not handle.
        scheme: String,
    },

    /// Downloaded file size does not match expected server content length.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Download path that failed verification.
        path: PathBuf,
        /// Expected size in bytes.
        expected_bytes: u64,
        /// Actual size in bytes.
        actual_bytes: u64,
    },

    /// Transfer was cancelled by an interrupt; the partial file was flushed.
    #[error("download interrupted: {path}")]
    Interrupted {
        /// The partially written file.
        path: PathBuf,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a socket error for a self-managed connection.
    pub fn connection(url: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connection {
            url: url.into(),
            source,
        }
    }

    /// Creates an FTP reply error.
    pub fn ftp_status(url: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Self::FtpStatus {
            url: url.into(),
            code,
            message: message.into(),
        }
    }

    /// Creates a range-not-satisfiable error.
    pub fn range_not_satisfiable(url: impl Into<String>) -> Self {
        Self::RangeNotSatisfiable { url: url.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a permission error for a destination directory.
    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied { path: path.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an unsupported scheme error.
    pub fn unsupported_scheme(url: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            url: url.into(),
            scheme: scheme.into(),
        }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates an interrupted error.
    pub fn interrupted(path: impl Into<PathBuf>) -> Self {
        Self::Interrupted { path: path.into() }
    }

    /// Returns true when the URL itself cannot be used by the transport.
    ///
    /// The probe propagates these; every other probe failure only means the
    /// remote metadata is undetermined.
    #[must_use]
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl { .. } | Self::UnsupportedScheme { .. }
        )
    }
}

// Note on From trait implementations:
// We do NOT implement `From<reqwest::Error>` or `From<std::io::Error>` because
// our error variants require context (url, path) that the source errors don't
// provide. The helper constructors are the way to build these errors.
