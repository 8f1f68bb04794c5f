use std::io::IsTerminal;

use fetcher_core::ProgressMode;

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_draw_progress(
    stderr_is_terminal: bool,
    quiet: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

pub(crate) fn progress_mode(quiet: bool) -> ProgressMode {
    if should_draw_progress(std::io::stderr().is_terminal(), quiet, is_dumb_terminal()) {
        ProgressMode::Terminal
    } else {
        ProgressMode::Hidden
    }
}

pub(crate) fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal() && !is_dumb_terminal())
        .with_env_filter(filter)
        .try_init();
}
