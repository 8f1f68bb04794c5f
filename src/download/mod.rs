//! Resumable download engine.
//!
//! A job flows through four stages:
//!
//! 1. [`metadata::probe`] issues a header-only request and captures size,
//!    type, disposition, redirect target and modification time.
//! 2. [`filename::resolve_target`] picks the destination path from the
//!    override, the disposition, the redirect target or the URL.
//! 3. [`resume::plan`] compares the remote facts with the local file and
//!    decides to skip, restart or resume.
//! 4. [`executor::TransferExecutor`] streams the body to disk with a progress
//!    line and applies the server's modification time.
//!
//! [`Downloader`] ties the stages together and runs batches.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fetcher_core::{DownloadJob, Downloader, SchemeTransport, TransportConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = SchemeTransport::new(&TransportConfig::default())?;
//! let downloader = Downloader::new(Arc::new(transport));
//! let job = DownloadJob::new("https://example.com/paper.pdf", "./downloads", None);
//! let outcome = downloader.run_job(&job).await?;
//! println!("Saved: {}", outcome.path().display());
//! # Ok(())
//! # }
//! ```

pub mod constants;
mod error;
pub mod executor;
pub mod filename;
pub mod fs_probe;
pub mod ftp;
pub mod metadata;
pub mod mime;
mod orchestrator;
pub mod progress;
pub mod resume;
pub mod transport;

pub use error::DownloadError;
pub use metadata::RemoteMetadata;
pub use orchestrator::{BatchSummary, Downloader, JobOutcome, JobPlan};
pub use progress::ProgressMode;
pub use resume::{PlanReason, ResumeDecision, ResumeOffset};
pub use ftp::FtpTransport;
pub use transport::{HttpTransport, SchemeTransport, Transport, TransportConfig};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
