//! Terminal progress for resolution runs

use indicatif::{ProgressBar, ProgressStyle};
use taxa_resolver::ProgressSink;

/// Resolution of the bar; fractions are mapped onto `0..=BAR_LENGTH`
const BAR_LENGTH: u64 = 1000;

/// Progress bar fed by the resolution pipeline
///
/// Cloning shares the underlying bar, so one copy can be handed to the worker
/// thread while the other finishes the bar.
#[derive(Clone)]
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(BAR_LENGTH);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { bar }
    }

    /// Bar that never draws (JSON output, quiet runs)
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn advance(&self, fraction: f64) {
        let position = (fraction.clamp(0.0, 1.0) * BAR_LENGTH as f64).round() as u64;
        self.bar.set_position(position);
    }

    fn set_message(&self, text: &str) {
        self.bar.set_message(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_maps_onto_bar() {
        let progress = BarProgress::hidden();
        progress.advance(0.25);
        assert_eq!(progress.position(), 250);
        progress.advance(1.5);
        assert_eq!(progress.position(), BAR_LENGTH);
    }
}
