//! Fetcher Core Library
//!
//! This library provides the download-resolution and resume engine behind the
//! `fetcher` command-line tool: it inspects remote metadata and local files to
//! decide whether to skip, resume or restart a transfer, derives a safe local
//! filename, and streams the body to disk with live progress.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - Probe, filename resolution, resume planning, transfer and progress
//! - [`job`] - Download job descriptions and job list files
//! - [`event`] - Enumerated log messages emitted through a single logging call

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod event;
pub mod job;
mod user_agent;

// Re-export commonly used types
pub use download::{
    BatchSummary, DownloadError, Downloader, FtpTransport, HttpTransport, JobOutcome, JobPlan,
    ProgressMode, RemoteMetadata, ResumeDecision, ResumeOffset, SchemeTransport, Transport,
    TransportConfig,
};
pub use event::{LogKind, LogValue, log_event};
pub use job::{DownloadJob, JobFileError, load_job_file, parse_job_line};
