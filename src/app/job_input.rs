//! Turns the command line into download jobs.
//!
//! Jobs are collected in this order: positional targets, `--url` entries, then
//! each `--file` job list in the order given.

use std::path::Path;

use fetcher_core::job::looks_like_url;
use fetcher_core::{DownloadJob, JobFileError, LogKind, LogValue, load_job_file, log_event};
use tracing::{debug, warn};

use crate::cli::Args;

/// Pairs positional values into jobs: a URL starts a job and the value right
/// after it, when it is not a URL itself, becomes its filename.
pub(crate) fn pair_targets(values: &[String], dir: &Path) -> Vec<DownloadJob> {
    let mut jobs = Vec::new();
    let mut iter = values.iter().peekable();

    while let Some(value) = iter.next() {
        if !looks_like_url(value) {
            warn!(value = %value, "ignoring argument that is not a supported URL");
            continue;
        }
        let filename = iter.next_if(|next| !looks_like_url(next)).cloned();
        jobs.push(DownloadJob::new(value.trim(), dir, filename));
    }

    jobs
}

/// Collects every job requested on the command line.
///
/// # Errors
///
/// Returns [`JobFileError`] when a job list file cannot be read.
pub(crate) fn collect_jobs(args: &Args) -> Result<Vec<DownloadJob>, JobFileError> {
    let mut jobs = pair_targets(&args.targets, &args.path);

    for entry in &args.url_groups {
        // `-u URL1 URL2` reads as two URLs rather than a URL with a URL-shaped name.
        jobs.extend(pair_targets(entry, &args.path));
    }

    for file in &args.files {
        match load_job_file(file, &args.path) {
            Ok(file_jobs) => jobs.extend(file_jobs),
            Err(e) => {
                log_event(LogKind::JobFileUnreadable, Some(LogValue::path(file)));
                return Err(e);
            }
        }
    }

    debug!(jobs = jobs.len(), "collected jobs");
    Ok(jobs)
}
