//! Progress reporting and cooperative cancellation

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Passive receiver of pipeline progress
///
/// `advance` receives the overall completed fraction in `[0, 1]`; values never
/// decrease within one resolution. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn advance(&self, fraction: f64);
    fn set_message(&self, text: &str);
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&self, _fraction: f64) {}
    fn set_message(&self, _text: &str) {}
}

/// Forwards messages to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn advance(&self, _fraction: f64) {}

    fn set_message(&self, text: &str) {
        info!("{}", text);
    }
}

/// Maps a sub-task's `[0, 1]` progress onto the `[start, end]` band of an outer sink
///
/// Keeps a high-water mark, so a restarted sub-task (e.g. a retried download)
/// never moves the outer sink backwards.
pub struct ScaledProgress<'a> {
    inner: &'a dyn ProgressSink,
    start: f64,
    end: f64,
    reached: AtomicU64,
}

impl<'a> ScaledProgress<'a> {
    pub fn new(inner: &'a dyn ProgressSink, start: f64, end: f64) -> Self {
        Self {
            inner,
            start,
            end,
            reached: AtomicU64::new(start.to_bits()),
        }
    }
}

impl ProgressSink for ScaledProgress<'_> {
    fn advance(&self, fraction: f64) {
        let value = (self.start + (self.end - self.start) * fraction.clamp(0.0, 1.0)).max(0.0);
        // non-negative floats order like their bit patterns
        let previous = f64::from_bits(self.reached.fetch_max(value.to_bits(), Ordering::SeqCst));
        if value > previous {
            self.inner.advance(value);
        }
    }

    fn set_message(&self, text: &str) {
        self.inner.set_message(text);
    }
}

/// Shared flag checked by the pipeline at every stage boundary
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; observed at the next stage boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        fractions: Mutex<Vec<f64>>,
    }

    impl ProgressSink for Recorder {
        fn advance(&self, fraction: f64) {
            self.fractions.lock().unwrap().push(fraction);
        }
        fn set_message(&self, _text: &str) {}
    }

    #[test]
    fn test_scaled_progress_maps_into_band() {
        let recorder = Recorder::default();
        let band = ScaledProgress::new(&recorder, 0.2, 0.6);
        band.advance(0.5);
        band.advance(1.0);
        band.advance(2.0);

        let fractions = recorder.fractions.lock().unwrap().clone();
        assert_eq!(fractions.len(), 2);
        assert!((fractions[0] - 0.4).abs() < 1e-9);
        assert!((fractions[1] - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_scaled_progress_never_goes_backwards() {
        let recorder = Recorder::default();
        let band = ScaledProgress::new(&recorder, 0.0, 1.0);
        band.advance(0.7);
        // restarted sub-task
        band.advance(0.1);
        band.advance(0.8);

        assert_eq!(*recorder.fractions.lock().unwrap(), vec![0.7, 0.8]);
    }

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let worker_copy = token.clone();
        assert!(!worker_copy.is_cancelled());

        let handle = std::thread::spawn(move || token.cancel());
        handle.join().unwrap();

        assert!(worker_copy.is_cancelled());
    }
}
