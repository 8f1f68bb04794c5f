use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::CommandFactory;
use fetcher_core::{Downloader, SchemeTransport, TransportConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::{exit_handler, job_input, terminal};
use crate::cli::Args;
use crate::commands;

pub(crate) async fn run_fetcher(args: Args) -> Result<ProcessExit> {
    terminal::init_tracing(args.default_log_level());
    debug!(?args, "CLI arguments parsed");

    let jobs = job_input::collect_jobs(&args)?;
    if jobs.is_empty() {
        eprintln!("{}", Args::command().render_usage());
        return Ok(ProcessExit::Usage);
    }

    let config = TransportConfig {
        connect_timeout: Duration::from_secs(args.connect_timeout),
        ..TransportConfig::default()
    };
    let transport = SchemeTransport::new(&config).context("couldn't build HTTP client")?;
    let cancel = CancellationToken::new();
    let downloader = Downloader::new(Arc::new(transport))
        .with_progress(terminal::progress_mode(args.quiet))
        .with_cancellation(cancel.clone());

    if args.dry_run {
        let report = commands::run_dry_run_preview(&downloader, &jobs).await?;
        return Ok(exit_handler::determine_exit_outcome(
            report.planned,
            report.failed,
        ));
    }

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after flushing the current file");
            cancel.cancel();
        }
    });

    info!(jobs = jobs.len(), "Fetcher starting");
    let summary = downloader.run_batch(&jobs).await;
    interrupt.abort();

    Ok(exit_handler::exit_outcome_for_batch(&summary))
}
