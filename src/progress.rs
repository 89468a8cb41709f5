//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`ProgressCallback`] trait consumed by the
//! fingerprinting and clustering stages, and the [`Progress`] struct which
//! implements it with terminal progress bars.
//!
//! Progress is advisory: callbacks are invoked from worker threads, must not
//! block, and may be called out of order (a later `processed` count can
//! arrive before an earlier one).

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Phase name for directory discovery.
pub const PHASE_WALKING: &str = "walking";
/// Phase name for cache warming / fingerprinting.
pub const PHASE_HASHING: &str = "hashing";
/// Phase name for the pairwise clustering pass.
pub const PHASE_CLUSTERING: &str = "clustering";

/// Progress callback for the duplicate detection pipeline.
///
/// Implement this trait to receive progress updates.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (e.g., "hashing", "clustering")
    /// * `total` - Total number of items to process
    fn on_phase_start(&self, _phase: &str, _total: usize) {}

    /// Called as work completes.
    ///
    /// # Arguments
    ///
    /// * `processed` - Items finished so far
    /// * `total` - Total number of items
    fn on_progress(&self, processed: usize, total: usize);

    /// Called when a phase completes.
    fn on_phase_end(&self, _phase: &str) {}
}

/// Progress reporter using indicatif.
///
/// Shows one spinner while walking and one bar for each counted phase.
pub struct Progress {
    multi: MultiProgress,
    active: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use photodupe::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            active: Mutex::new(None),
            quiet,
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style(phase: &str) -> ProgressStyle {
        let template = if phase == PHASE_CLUSTERING {
            "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})"
        } else {
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} {per_sec} (ETA: {eta})"
        };
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }

    fn set_active(&self, pb: Option<ProgressBar>) -> Option<ProgressBar> {
        match self.active.lock() {
            Ok(mut active) => std::mem::replace(&mut *active, pb),
            Err(_) => None,
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        let pb = if phase == PHASE_WALKING {
            let pb = self.multi.add(ProgressBar::new_spinner());
            pb.set_style(Self::spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            let pb = self.multi.add(ProgressBar::new(total as u64));
            pb.set_style(Self::bar_style(phase));
            pb
        };
        pb.set_message(match phase {
            PHASE_WALKING => "Finding images".to_string(),
            PHASE_HASHING => "Fingerprinting".to_string(),
            PHASE_CLUSTERING => "Comparing".to_string(),
            other => other.to_string(),
        });

        if let Some(previous) = self.set_active(Some(pb)) {
            previous.finish_and_clear();
        }
    }

    fn on_progress(&self, processed: usize, _total: usize) {
        if self.quiet {
            return;
        }

        if let Ok(active) = self.active.lock() {
            if let Some(ref pb) = *active {
                // Out-of-order reports must not move the bar backwards.
                if processed as u64 > pb.position() {
                    pb.set_position(processed as u64);
                }
            }
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        if let Some(pb) = self.set_active(None) {
            pb.finish_with_message(format!("{} complete", capitalize(phase)));
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_progress_ignores_events() {
        let progress = Progress::new(true);
        progress.on_phase_start(PHASE_HASHING, 10);
        progress.on_progress(5, 10);
        progress.on_phase_end(PHASE_HASHING);

        assert!(progress.active.lock().unwrap().is_none());
    }

    #[test]
    fn test_progress_never_moves_backwards() {
        let progress = Progress::new(false);
        progress.on_phase_start(PHASE_CLUSTERING, 300);
        progress.on_progress(200, 300);
        progress.on_progress(100, 300);

        let position = progress.active.lock().unwrap().as_ref().unwrap().position();
        assert_eq!(position, 200);
        progress.on_phase_end(PHASE_CLUSTERING);
        assert!(progress.active.lock().unwrap().is_none());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("hashing"), "Hashing");
        assert_eq!(capitalize(""), "");
    }
}
