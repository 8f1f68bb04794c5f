//! Per-job pipeline and sequential batch runner.
//!
//! A job runs probe, target resolution, planning and transfer in that order.
//! Jobs in a batch are independent: a failing job is logged and the batch
//! moves on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;

use super::error::DownloadError;
use super::executor::{TransferExecutor, TransferOutcome};
use super::filename::resolve_target;
use super::metadata::{RemoteMetadata, probe};
use super::progress::{ProgressMode, TerminalProgress};
use super::resume::{PlanReason, ResumeDecision, plan};
use super::transport::Transport;
use crate::event::{LogKind, LogValue, log_event};
use crate::job::DownloadJob;

/// Everything decided for a job before any bytes move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobPlan {
    /// Requested URL.
    pub url: String,
    /// Destination file.
    pub path: PathBuf,
    /// Probe results.
    pub metadata: RemoteMetadata,
    /// What the transfer will do.
    pub decision: ResumeDecision,
    /// Why.
    pub reason: PlanReason,
}

/// How a job finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The local file was already complete.
    Skipped {
        /// Destination file.
        path: PathBuf,
    },
    /// Bytes were transferred.
    Downloaded {
        /// Destination file.
        path: PathBuf,
        /// Bytes received in this run.
        bytes_written: u64,
        /// File size afterwards.
        final_size: u64,
        /// Whether an existing prefix was extended.
        resumed: bool,
    },
}

impl JobOutcome {
    /// Destination file of the job.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Skipped { path } | Self::Downloaded { path, .. } => path,
        }
    }
}

/// Counts for a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    completed: usize,
    skipped: usize,
    failed: usize,
    interrupted: bool,
}

impl BatchSummary {
    /// Jobs that transferred bytes.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Jobs whose file was already complete.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Jobs that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Jobs that ran to an outcome (succeeded, skipped or failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }

    /// Jobs that ended without error.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.completed + self.skipped
    }

    /// Whether the batch stopped early because of cancellation.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.interrupted
    }
}

/// Runs download jobs through a shared [`Transport`].
pub struct Downloader {
    transport: Arc<dyn Transport>,
    progress: ProgressMode,
    cancel: CancellationToken,
}

impl Downloader {
    /// Creates a downloader that draws progress on the terminal.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            progress: ProgressMode::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Sets how progress is drawn.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressMode) -> Self {
        self.progress = progress;
        self
    }

    /// Uses `cancel` to stop running transfers.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that interrupts the current transfer and the rest of a batch.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Probes the remote resource and decides what a run would do.
    ///
    /// Touches nothing on disk.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] or
    /// [`DownloadError::UnsupportedScheme`] for URLs that cannot be fetched,
    /// and [`DownloadError::Interrupted`] when cancelled before the server
    /// answers.
    #[instrument(skip(self, job), fields(url = %job.url))]
    pub async fn plan_job(&self, job: &DownloadJob) -> Result<JobPlan, DownloadError> {
        let metadata = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(DownloadError::interrupted(&job.path)),
            metadata = probe(self.transport.as_ref(), &job.url) => metadata?,
        };
        let target = resolve_target(&job.url, job.filename.as_deref(), &metadata, &job.path);
        let plan = plan(&target.full_path, &metadata, &job.url);
        debug!(decision = ?plan.decision, reason = ?plan.reason, "job planned");

        Ok(JobPlan {
            url: job.url.clone(),
            path: target.full_path,
            metadata,
            decision: plan.decision,
            reason: plan.reason,
        })
    }

    /// Runs one job to completion.
    ///
    /// # Errors
    ///
    /// Returns the first error from planning or transfer. The failure is also
    /// logged as a download-failed event.
    #[instrument(skip(self, job), fields(url = %job.url))]
    pub async fn run_job(&self, job: &DownloadJob) -> Result<JobOutcome, DownloadError> {
        let result = self.execute_job(job).await;
        match &result {
            Ok(outcome) => {
                log_event(LogKind::Done, Some(LogValue::path(outcome.path())));
            }
            Err(e) => {
                log_event(LogKind::DownloadFailed, Some(LogValue::from(job.url.as_str())));
                info!(error = %e, "job failed");
            }
        }
        result
    }

    async fn execute_job(&self, job: &DownloadJob) -> Result<JobOutcome, DownloadError> {
        let job_plan = self.plan_job(job).await?;
        let url = Url::parse(&job.url).map_err(|_| DownloadError::invalid_url(&job.url))?;

        let executor = TransferExecutor::new(self.transport.as_ref(), self.cancel.clone());
        let mut progress = TerminalProgress::new(self.progress);
        let outcome = executor
            .execute(
                &url,
                &job_plan.path,
                job_plan.decision,
                &job_plan.metadata,
                &mut progress,
            )
            .await?;

        Ok(match outcome {
            TransferOutcome::Skipped => JobOutcome::Skipped {
                path: job_plan.path,
            },
            TransferOutcome::Completed {
                bytes_written,
                final_size,
                resumed,
            } => JobOutcome::Downloaded {
                path: job_plan.path,
                bytes_written,
                final_size,
                resumed,
            },
        })
    }

    /// Runs `jobs` one after another.
    ///
    /// A failed job does not stop the batch. Cancellation does: the current
    /// job ends as interrupted and the remaining jobs are not started.
    pub async fn run_batch(&self, jobs: &[DownloadJob]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        info!(jobs = jobs.len(), "starting batch");

        for job in jobs {
            if self.cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }
            match self.run_job(job).await {
                Ok(JobOutcome::Skipped { .. }) => summary.skipped += 1,
                Ok(JobOutcome::Downloaded { .. }) => summary.completed += 1,
                Err(e) => {
                    summary.failed += 1;
                    if matches!(e, DownloadError::Interrupted { .. }) {
                        summary.interrupted = true;
                        break;
                    }
                }
            }
        }

        info!(
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed,
            interrupted = summary.interrupted,
            "batch finished"
        );
        summary
    }
}
