//! Progress line formatting and rendering.
//!
//! [`format_status`] is a pure function of the transfer counters. A
//! [`ProgressTracker`] owns the per-job clock, and a [`ProgressSink`] puts the
//! resulting line on screen.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::constants::PROGRESS_BAR_WIDTH;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * KIB;
const GIB: f64 = 1024.0 * MIB;
const TIB: f64 = 1024.0 * GIB;

const UNITS: [(f64, &str); 4] = [(TIB, "TiB"), (GIB, "GiB"), (MIB, "MiB"), (KIB, "KiB")];

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Counters for one progress tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Bytes already on disk when this transfer started.
    pub resume_offset: u64,
    /// Bytes expected in this transfer session.
    pub session_total: u64,
    /// Bytes received in this transfer session.
    pub session_done: u64,
    /// Value of `session_done` when the segment clock last started.
    pub segment_start: u64,
    /// Seconds since the segment clock started.
    pub elapsed_secs: f64,
}

/// Scales `bytes` to the largest binary unit in which it is at least 1.
#[must_use]
pub fn scale_bytes(bytes: f64) -> (f64, &'static str) {
    UNITS
        .iter()
        .find(|(size, _)| bytes >= *size)
        .map_or((bytes, "B"), |(size, unit)| (bytes / size, *unit))
}

/// Formats seconds as `D:HH:MM:SS`, omitting leading zero components.
///
/// Minutes are always shown so a short ETA reads `00:07`.
#[must_use]
pub fn format_eta(total_secs: u64) -> String {
    let days = total_secs / DAY;
    let hours = (total_secs % DAY) / HOUR;
    let mins = (total_secs % HOUR) / MINUTE;
    let secs = total_secs % MINUTE;

    if days > 0 {
        format!("{days}D:{hours:02}:{mins:02}:{secs:02}")
    } else if hours > 0 {
        format!("{hours:02}:{mins:02}:{secs:02}")
    } else {
        format!("{mins:02}:{secs:02}")
    }
}

/// Renders the progress line, or `None` while the total size is unknown.
///
/// Speed covers only the bytes received since the segment clock started.
/// Speed and ETA are left off when they are not finite (no time has passed
/// yet, or nothing was received in the segment).
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn format_status(snapshot: &ProgressSnapshot) -> Option<String> {
    if snapshot.session_total == 0 {
        return None;
    }

    let total = (snapshot.resume_offset + snapshot.session_total) as f64;
    let done = (snapshot.resume_offset + snapshot.session_done) as f64;
    let fraction = (done / total).clamp(0.0, 1.0);

    let segment_done = snapshot.session_done.saturating_sub(snapshot.segment_start) as f64;
    let remaining = snapshot.session_total.saturating_sub(snapshot.session_done) as f64;
    let speed = segment_done / snapshot.elapsed_secs;
    let eta = remaining / speed;

    let dots = ((fraction * PROGRESS_BAR_WIDTH as f64).round() as usize).min(PROGRESS_BAR_WIDTH);
    let bar = format!("{}{}", "=".repeat(dots), " ".repeat(PROGRESS_BAR_WIDTH - dots));

    let (done_value, done_unit) = scale_bytes(done);
    let (total_value, total_unit) = scale_bytes(total);
    let mut line = format!(
        "{:3.0}% [{bar}] {done_value:.2} {done_unit} / {total_value:.2} {total_unit}",
        fraction * 100.0
    );

    if speed.is_finite() && speed > 0.0 && eta.is_finite() && eta >= 0.0 {
        let (speed_value, speed_unit) = scale_bytes(speed);
        let eta = format_eta(eta.round() as u64);
        line.push_str(&format!(
            " ({speed_value:.2} {speed_unit}/s) [{eta} left]"
        ));
    }

    Some(line)
}

/// Per-job progress state.
///
/// The clock restarts whenever the reported session total changes, so speed
/// and ETA describe only the current segment.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    resume_offset: u64,
    started: Instant,
    segment_start: u64,
    current_total: Option<u64>,
}

impl ProgressTracker {
    /// Starts tracking a session that resumes at `resume_offset`.
    #[must_use]
    pub fn new(resume_offset: u64, started: Instant) -> Self {
        Self {
            resume_offset,
            started,
            segment_start: 0,
            current_total: None,
        }
    }

    /// Returns the line for a tick at `now`.
    pub fn status_at(
        &mut self,
        now: Instant,
        session_total: Option<u64>,
        session_done: u64,
    ) -> Option<String> {
        let session_total = session_total?;
        match self.current_total {
            Some(previous) if previous != session_total => {
                self.current_total = Some(session_total);
                self.started = now;
                self.segment_start = session_done;
            }
            None => self.current_total = Some(session_total),
            Some(_) => {}
        }

        format_status(&ProgressSnapshot {
            resume_offset: self.resume_offset,
            session_total,
            session_done,
            segment_start: self.segment_start,
            elapsed_secs: now.saturating_duration_since(self.started).as_secs_f64(),
        })
    }
}

/// Destination for rendered progress lines.
pub trait ProgressSink: Send {
    /// Replaces the current line with `line`.
    fn update(&mut self, line: &str);

    /// Called once when the transfer ends, on success or failure.
    fn finish(&mut self);
}

impl ProgressSink for Vec<String> {
    fn update(&mut self, line: &str) {
        self.push(line.to_string());
    }

    fn finish(&mut self) {}
}

/// Whether progress is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressMode {
    /// Redraw a single line on stderr.
    #[default]
    Terminal,
    /// Draw nothing.
    Hidden,
}

/// Single-line in-place renderer on stderr.
#[derive(Debug)]
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    /// Creates a renderer for one job.
    #[must_use]
    pub fn new(mode: ProgressMode) -> Self {
        let bar = match mode {
            ProgressMode::Terminal => {
                ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr())
            }
            ProgressMode::Hidden => ProgressBar::hidden(),
        };
        bar.set_style(
            ProgressStyle::with_template("{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self { bar }
    }
}

impl ProgressSink for TerminalProgress {
    fn update(&mut self, line: &str) {
        self.bar.set_message(line.to_string());
    }

    fn finish(&mut self) {
        self.bar.finish();
    }
}
