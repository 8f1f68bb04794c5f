//! Dry-run command flow for previewing what each job would do.

use anyhow::Result;
use fetcher_core::{DownloadJob, Downloader};
use serde_json::json;
use tracing::{info, warn};

/// Counts from a dry run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DryRunReport {
    pub planned: usize,
    pub failed: usize,
}

/// Plans every job and prints one JSON object per job on stdout.
///
/// Jobs that cannot be planned are printed with an `error` field instead of a
/// plan.
pub async fn run_dry_run_preview(
    downloader: &Downloader,
    jobs: &[DownloadJob],
) -> Result<DryRunReport> {
    info!(jobs = jobs.len(), "Planning jobs (dry run)");
    let mut report = DryRunReport::default();

    for job in jobs {
        let line = match downloader.plan_job(job).await {
            Ok(plan) => {
                report.planned += 1;
                serde_json::to_string(&plan)?
            }
            Err(error) => {
                report.failed += 1;
                warn!(url = %job.url, error = %error, "Couldn't plan job");
                json!({ "url": job.url, "error": error.to_string() }).to_string()
            }
        };
        println!("{line}");
    }

    info!(
        planned = report.planned,
        failed = report.failed,
        "Dry run - no files downloaded"
    );
    Ok(report)
}
