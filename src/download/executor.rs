//! Byte transfer for a planned download.
//!
//! The executor checks the destination directory, streams the body straight
//! into the destination file (append for a resume, truncate for a restart),
//! reports progress on every chunk, and aligns the file's modification time
//! with the server's afterwards.

use std::path::Path;
use std::time::Instant;

use futures_util::StreamExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::DownloadError;
use super::fs_probe::{ensure_directory, is_writable, local_state, set_modification_time};
use super::metadata::RemoteMetadata;
use super::progress::{ProgressSink, ProgressTracker};
use super::resume::{ResumeDecision, ResumeOffset};
use super::transport::{BodyStream, Transport};
use crate::event::{LogKind, LogValue, log_event};

/// Result of executing a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Nothing was transferred.
    Skipped,
    /// The body was written to disk.
    Completed {
        /// Bytes received in this session.
        bytes_written: u64,
        /// File size after the transfer.
        final_size: u64,
        /// Whether the bytes were appended to an existing prefix.
        resumed: bool,
    },
}

struct SessionResult {
    outcome: TransferOutcome,
    last_modified: Option<i64>,
}

/// Performs transfers through a [`Transport`].
pub struct TransferExecutor<'a> {
    transport: &'a dyn Transport,
    cancel: CancellationToken,
}

impl<'a> TransferExecutor<'a> {
    /// Creates an executor; cancelling `cancel` stops a running transfer.
    #[must_use]
    pub fn new(transport: &'a dyn Transport, cancel: CancellationToken) -> Self {
        Self { transport, cancel }
    }

    /// Executes `decision` for `url` into `full_path`.
    ///
    /// `metadata` is the probe result. Its modification time is applied to the
    /// finished file when the transfer response does not report one, and its
    /// length drives progress when the response has no length of its own.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::PermissionDenied`] when the directory is not writable;
    ///   no request is made in that case.
    /// - Transport, IO, integrity and interrupt errors from the transfer.
    #[instrument(skip(self, metadata, progress), fields(url = %url, path = %full_path.display()))]
    pub async fn execute(
        &self,
        url: &Url,
        full_path: &Path,
        decision: ResumeDecision,
        metadata: &RemoteMetadata,
        progress: &mut dyn ProgressSink,
    ) -> Result<TransferOutcome, DownloadError> {
        if decision == ResumeDecision::Skip {
            return Ok(TransferOutcome::Skipped);
        }

        let dir = match full_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !is_writable(dir) {
            log_event(LogKind::PathNotWritable, Some(LogValue::path(dir)));
            return Err(DownloadError::permission_denied(dir));
        }
        ensure_directory(dir).map_err(|e| DownloadError::io(dir, e))?;

        log_event(LogKind::Downloading, Some(LogValue::path(full_path)));

        let session = match self
            .session(url, full_path, decision, metadata, progress)
            .await
        {
            Err(DownloadError::RangeNotSatisfiable { .. })
                if matches!(decision, ResumeDecision::ResumeAt(_)) =>
            {
                warn!("server rejected resume offset; restarting from byte 0");
                self.session(url, full_path, ResumeDecision::Restart, metadata, progress)
                    .await?
            }
            other => other?,
        };

        match session
            .last_modified
            .or(metadata.remote_mod_time)
            .filter(|t| *t > 0)
        {
            Some(time) => {
                if let Err(e) = set_modification_time(full_path, time) {
                    debug!(error = %e, "setting modification time failed");
                    log_event(LogKind::FiletimeSetFailed, Some(LogValue::path(full_path)));
                }
            }
            None => log_event(LogKind::FiletimeUnknown, None),
        }

        Ok(session.outcome)
    }

    async fn session(
        &self,
        url: &Url,
        full_path: &Path,
        decision: ResumeDecision,
        metadata: &RemoteMetadata,
        progress: &mut dyn ProgressSink,
    ) -> Result<SessionResult, DownloadError> {
        let resume = match decision {
            // Append at whatever end the file has when the transfer starts.
            ResumeDecision::ResumeAt(ResumeOffset::ServerDetermined) => Some(ResumeOffset::Bytes(
                local_state(full_path).map_or(0, |local| local.size),
            )),
            ResumeDecision::ResumeAt(offset) => Some(offset),
            ResumeDecision::Restart | ResumeDecision::Skip => None,
        };

        // Headers may never arrive; an interrupt must still end the job.
        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(DownloadError::interrupted(full_path)),
            response = self.transport.fetch(url, resume) => response?,
        };
        let appending = resume.is_some() && response.continues_from_offset;
        if resume.is_some() && !appending {
            warn!("server sent the whole resource; rewriting from byte 0");
        }

        let file = open_destination(full_path, appending).await?;
        let start_size = if appending {
            file.metadata()
                .await
                .map_err(|e| DownloadError::io(full_path, e))?
                .len()
        } else {
            0
        };

        let last_modified = response.last_modified;
        let body_length = response.body_length;
        let expected_length = body_length.or_else(|| {
            metadata
                .content_length
                .and_then(|total| total.checked_sub(start_size))
                .filter(|remaining| *remaining > 0)
        });
        let result = self
            .stream_to_file(file, response.body, full_path, start_size, expected_length, progress)
            .await;
        progress.finish();
        let bytes_written = result?;

        let final_size = start_size + bytes_written;
        if let Some(expected) = body_length.map(|len| start_size + len)
            && expected != final_size
        {
            return Err(DownloadError::integrity(full_path, expected, final_size));
        }

        debug!(bytes_written, final_size, resumed = appending, "transfer complete");
        Ok(SessionResult {
            outcome: TransferOutcome::Completed {
                bytes_written,
                final_size,
                resumed: appending,
            },
            last_modified,
        })
    }

    /// Streams the body into `file`, flushing and closing it on every exit path.
    async fn stream_to_file(
        &self,
        file: File,
        mut body: BodyStream,
        full_path: &Path,
        start_size: u64,
        expected_length: Option<u64>,
        progress: &mut dyn ProgressSink,
    ) -> Result<u64, DownloadError> {
        let mut writer = BufWriter::new(file);
        let mut tracker = ProgressTracker::new(start_size, Instant::now());
        let mut bytes_written: u64 = 0;

        let streamed = loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    break Err(DownloadError::interrupted(full_path));
                }
                chunk = body.next() => match chunk {
                    None => break Ok(()),
                    Some(Err(e)) => break Err(e),
                    Some(Ok(bytes)) => {
                        if let Err(e) = writer.write_all(&bytes).await {
                            break Err(DownloadError::io(full_path, e));
                        }
                        bytes_written += bytes.len() as u64;
                        if let Some(line) =
                            tracker.status_at(Instant::now(), expected_length, bytes_written)
                        {
                            progress.update(&line);
                        }
                    }
                },
            }
        };

        // Flush whatever arrived, even when the transfer failed, so a later
        // run can resume from it.
        let flushed = writer.flush().await;
        drop(writer);

        streamed?;
        flushed.map_err(|e| DownloadError::io(full_path, e))?;
        Ok(bytes_written)
    }
}

async fn open_destination(full_path: &Path, append: bool) -> Result<File, DownloadError> {
    let opened = if append {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(full_path)
            .await
    } else {
        File::create(full_path).await
    };
    opened.map_err(|e| DownloadError::io(full_path, e))
}
