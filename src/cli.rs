//! CLI argument definitions using clap derive macros.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};

use fetcher_core::download::constants::CONNECT_TIMEOUT_SECS;

/// Download files over HTTP, HTTPS or FTP, resuming partial downloads.
///
/// Each URL may be followed by a filename to save it as. Files that are
/// already complete are skipped; partial files are resumed where possible.
#[derive(Parser, Debug)]
#[command(name = "fetcher")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to download, each optionally followed by a filename
    #[arg(value_name = "URL [FILENAME]")]
    pub targets: Vec<String>,

    /// Add a download; repeatable
    #[arg(
        short = 'u',
        long = "url",
        value_names = ["URL", "FILENAME"],
        num_args = 1..=2,
        action = clap::ArgAction::Append
    )]
    pub urls: Vec<String>,

    /// `--url` values grouped per occurrence, filled in by [`Args::parse_cli`].
    #[arg(skip)]
    pub url_groups: Vec<Vec<String>>,

    /// Read downloads from a file with one `URL [FILENAME]` per line; repeatable
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Directory to save files into
    #[arg(short = 'p', long = "path", value_name = "DIR", default_value = ".")]
    pub path: PathBuf,

    /// Show what would be downloaded without transferring anything
    #[arg(long)]
    pub dry_run: bool,

    /// Seconds to wait for a connection (1-600)
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = CONNECT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..=600)
    )]
    pub connect_timeout: u64,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse_cli() -> Self {
        Self::try_parse_cli_from(std::env::args_os()).unwrap_or_else(|error| error.exit())
    }

    /// Parses `itr` like [`Args::parse_cli`] but returns the error.
    pub fn try_parse_cli_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(itr)?;
        Self::from_cli_matches(&matches)
    }

    fn from_cli_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let mut args = Self::from_arg_matches(matches)?;
        args.url_groups = matches
            .try_get_occurrences::<String>("urls")
            .ok()
            .flatten()
            .map(|occurrences| {
                occurrences
                    .map(|values| values.cloned().collect())
                    .collect()
            })
            .unwrap_or_default();
        Ok(args)
    }

    /// Default log level from the verbosity flags; `RUST_LOG` still wins.
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
