//! Progress display for the tagging and classification passes.
//!
//! Bars are drawn on the terminal unless plain output is on (`--log-only`,
//! or manual mode where genre prompts own the terminal). Plain output prints
//! `[phase] n/total (pct%)` lines to stderr instead.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static PLAIN_OUTPUT: AtomicBool = AtomicBool::new(false);

pub fn use_plain_output(enabled: bool) {
    PLAIN_OUTPUT.store(enabled, Ordering::Relaxed);
}

pub fn plain_output() -> bool {
    PLAIN_OUTPUT.load(Ordering::Relaxed)
}

/// Run time for the summary: "0.4s", "42.0s", "2m 30s", "1h 05m".
pub fn elapsed_label(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        0..=59 => format!("{:.1}s", d.as_secs_f64()),
        60..=3599 => format!("{}m {:02}s", secs / 60, secs % 60),
        _ => format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60),
    }
}

/// Plain-output line after `done` of `total` groups, printed every `every`
/// groups and once at the end.
fn progress_line(phase: &str, done: u64, total: u64, every: u64) -> Option<String> {
    if total == 0 || (done % every.max(1) != 0 && done != total) {
        return None;
    }
    let pct = 100.0 * done as f64 / total as f64;
    Some(format!("[{}] {}/{} ({:.1}%)", phase, done, total, pct))
}

/// Progress of one pass over the track groups of a directory.
pub struct PhaseProgress {
    bar: ProgressBar,
    phase: &'static str,
    every: u64,
}

impl PhaseProgress {
    pub fn start(phase: &'static str, total: usize, every: u64) -> Self {
        let bar = ProgressBar::new(total as u64);
        if plain_output() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{msg:>10} [{elapsed_precise}] [{bar:40.green/white}] {pos}/{len} groups ({eta})")
                    .unwrap()
                    .progress_chars("=> "),
            );
        }
        bar.set_message(phase);
        Self { bar, phase, every }
    }

    pub fn advance(&self) {
        self.bar.inc(1);
        if !plain_output() {
            return;
        }
        let done = self.bar.position();
        let total = self.bar.length().unwrap_or(done);
        if let Some(line) = progress_line(self.phase, done, total, self.every) {
            eprintln!("{}", line);
        }
    }

    pub fn done(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }

    /// Leave the bar where it stopped, for a pass that was cut short.
    pub fn abandon(self) {
        self.bar.abandon();
    }
}

/// Spinner shown while the catalog playlist is indexed.
pub fn catalog_spinner(catalog_ref: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if plain_output() {
        spinner.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} Indexing catalog {msg} [{elapsed_precise}]")
                .unwrap(),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
    }
    spinner.set_message(catalog_ref.to_string());
    spinner
}
