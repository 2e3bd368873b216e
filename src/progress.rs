//! Progress display for a run
//!
//! Provides visual feedback on stderr using indicatif. Workers get a cheap
//! `Ticker` clone of the active bar so they can advance it concurrently.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for the run phases
pub struct Progress {
    /// Whether progress display is enabled (disabled in quiet/JSON mode)
    enabled: bool,
    /// Current progress bar
    bar: Option<ProgressBar>,
}

/// Handle used by workers to advance the current bar
#[derive(Clone, Default)]
pub struct Ticker {
    bar: Option<ProgressBar>,
}

impl Ticker {
    /// Increment progress by one, showing what just finished
    pub fn tick(&self, message: &str) {
        if let Some(ref bar) = self.bar {
            bar.set_message(message.to_string());
            bar.inc(1);
        }
    }
}

impl Progress {
    /// Create a new progress reporter
    pub fn new(enabled: bool) -> Self {
        Self { enabled, bar: None }
    }

    /// Create a disabled progress reporter
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Show a spinner with a message for an indeterminate phase
    pub fn spinner(&mut self, message: &str) {
        if !self.enabled {
            return;
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.bar = Some(spinner);
    }

    /// Start a progress bar for a known number of packages
    pub fn start(&mut self, total: u64, message: &str) {
        if !self.enabled || total == 0 {
            return;
        }

        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} {prefix} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("█▓▒░"));
        }
        bar.set_prefix(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        self.bar = Some(bar);
    }

    /// Ticker bound to the current bar
    pub fn ticker(&self) -> Ticker {
        Ticker {
            bar: self.bar.clone(),
        }
    }

    /// Finish and clear the current progress bar
    pub fn finish_and_clear(&mut self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
        self.bar = None;
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new(true)
    }
}
