//! CLI entry point for the fetcher tool.

use std::process::ExitCode;

mod app;
mod cli;
mod commands;

use cli::Args;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every job succeeded or was already complete.
    Success,
    /// Some jobs failed.
    Partial,
    /// Every job failed.
    Failure,
    /// No jobs were given.
    Usage,
    /// Stopped by Ctrl-C.
    Interrupted,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Partial => 1,
            Self::Failure | Self::Usage => 2,
            Self::Interrupted => 130,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse_cli();

    match app::runtime::run_fetcher(args).await {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
