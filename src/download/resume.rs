//! Skip / restart / resume decision for a destination file.
//!
//! Policy, in order:
//! 1. No local file: restart from byte 0.
//! 2. Remote modification time known and equal to the local one: skip when the
//!    sizes match too, otherwise restart (the server state is inconsistent).
//! 3. Remote modification time unknown and sizes equal: skip.
//! 4. Otherwise resume at the local file size.
//!
//! For FTP the resume offset is replaced by [`ResumeOffset::ServerDetermined`]:
//! the transfer appends at whatever size the file has when it starts.

use std::path::Path;

use serde::Serialize;
use url::Url;

use super::fs_probe::{LocalFileState, local_state};
use super::metadata::RemoteMetadata;
use crate::event::{LogKind, LogValue, log_event};

/// Where an append-mode transfer continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i64")]
pub enum ResumeOffset {
    /// Continue at this exact byte.
    Bytes(u64),
    /// Append at the local file size measured when the transfer starts.
    ServerDetermined,
}

impl ResumeOffset {
    /// Raw value used by transfer layers that take a signed offset.
    pub const SERVER_DETERMINED_SENTINEL: i64 = -1;

    /// Returns the offset as a signed integer; the sentinel is `-1`.
    #[must_use]
    pub fn as_raw(self) -> i64 {
        match self {
            Self::Bytes(offset) => i64::try_from(offset).unwrap_or(i64::MAX),
            Self::ServerDetermined => Self::SERVER_DETERMINED_SENTINEL,
        }
    }
}

impl From<ResumeOffset> for i64 {
    fn from(offset: ResumeOffset) -> Self {
        offset.as_raw()
    }
}

/// What to do with the destination file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "offset", rename_all = "snake_case")]
pub enum ResumeDecision {
    /// Local file already matches the remote one.
    Skip,
    /// Rewrite the file from byte 0.
    Restart,
    /// Local file is a valid prefix; append from the offset.
    ResumeAt(ResumeOffset),
}

/// Why the planner reached its decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanReason {
    /// Nothing exists at the destination.
    NoLocalFile,
    /// Modification time and size both match.
    TimeAndSizeMatch,
    /// Modification time matches but the size does not.
    TimeMatchSizeDiffers,
    /// No remote modification time; sizes match.
    SizeMatchWithoutTime,
    /// The local file is treated as a partial download.
    PartialFile,
}

/// A decision plus the reason for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// What to do.
    pub decision: ResumeDecision,
    /// Why.
    pub reason: PlanReason,
}

/// Decides from already-gathered local and remote facts. Pure.
#[must_use]
pub fn decide(local: Option<LocalFileState>, metadata: &RemoteMetadata, ftp: bool) -> Plan {
    let Some(local) = local else {
        return Plan {
            decision: ResumeDecision::Restart,
            reason: PlanReason::NoLocalFile,
        };
    };

    let sizes_match = metadata.content_length == Some(local.size);

    match metadata.remote_mod_time.filter(|t| *t > 0) {
        Some(remote_time) if remote_time == local.modified => {
            if sizes_match {
                Plan {
                    decision: ResumeDecision::Skip,
                    reason: PlanReason::TimeAndSizeMatch,
                }
            } else {
                Plan {
                    decision: ResumeDecision::Restart,
                    reason: PlanReason::TimeMatchSizeDiffers,
                }
            }
        }
        None if sizes_match => Plan {
            decision: ResumeDecision::Skip,
            reason: PlanReason::SizeMatchWithoutTime,
        },
        _ => {
            let offset = if ftp {
                ResumeOffset::ServerDetermined
            } else {
                ResumeOffset::Bytes(local.size)
            };
            Plan {
                decision: ResumeDecision::ResumeAt(offset),
                reason: PlanReason::PartialFile,
            }
        }
    }
}

/// Returns true when `url` uses the FTP scheme.
#[must_use]
pub fn is_ftp(url: &str) -> bool {
    Url::parse(url).is_ok_and(|parsed| parsed.scheme() == "ftp")
}

/// Plans the transfer for `full_path`, logging the outcome.
pub fn plan(full_path: &Path, metadata: &RemoteMetadata, url: &str) -> Plan {
    let local = local_state(full_path);
    let plan = decide(local, metadata, is_ftp(url));

    match plan.reason {
        PlanReason::NoLocalFile => {}
        PlanReason::TimeMatchSizeDiffers => {
            log_event(LogKind::SizeMismatch, Some(LogValue::path(full_path)));
        }
        PlanReason::TimeAndSizeMatch | PlanReason::SizeMatchWithoutTime => {
            let name = full_path
                .file_name()
                .map_or_else(|| full_path.display().to_string(), |n| n.to_string_lossy().into_owned());
            log_event(LogKind::SkipDownloaded, Some(LogValue::from(name)));
        }
        PlanReason::PartialFile => {
            log_event(LogKind::IncompleteFile, Some(LogValue::path(full_path)));
            if let Some(local) = local {
                log_event(LogKind::ResumeAt, Some(LogValue::from(local.size)));
            }
        }
    }

    plan
}
