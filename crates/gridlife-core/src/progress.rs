//! Completion tracking for the in-flight generation and the UI sampler

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::flag::{sleep_unless_stopped, StopFlag};
use crate::queue::ResultQueue;
use crate::view::{GameView, Progress};

/// Shared counters behind the progress readout.
///
/// The cell map bumps `computed` from worker tasks while a generation is in
/// flight; the sampler thread reads both counters without touching the map
/// itself.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    computed: AtomicUsize,
    frontier_len: AtomicUsize,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cell_computed(&self) {
        self.computed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset_computed(&self) {
        self.computed.store(0, Ordering::Relaxed);
    }

    pub(crate) fn set_frontier_len(&self, len: usize) {
        self.frontier_len.store(len, Ordering::Relaxed);
    }

    /// Fraction of the current frontier already evaluated.
    ///
    /// An empty frontier counts as complete: nothing can change, so there is
    /// nothing left to compute.
    pub fn completion(&self) -> f64 {
        let frontier = self.frontier_len.load(Ordering::Relaxed);
        if frontier == 0 {
            return 1.0;
        }
        self.computed.load(Ordering::Relaxed) as f64 / frontier as f64
    }
}

/// Periodically reports computation progress to the view.
///
/// Fires only while the result queue is empty: if buffered generations are
/// waiting, the view is behind the computation and a percentage would be
/// stale the moment it is drawn.
pub(crate) fn sampler_loop<V: GameView>(
    queue: ResultQueue,
    tracker: Arc<ProgressTracker>,
    view: Arc<V>,
    stop: StopFlag,
    period: Duration,
) {
    debug!("progress sampler running");
    while !stop.is_on() {
        if queue.is_empty() {
            view.update_progress(Progress::Fraction(tracker.completion()));
        }
        if !sleep_unless_stopped(&stop, period) {
            break;
        }
    }
    debug!("progress sampler finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_frontier_is_complete() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.completion(), 1.0);
    }

    #[test]
    fn test_partial_completion() {
        let tracker = ProgressTracker::new();
        tracker.set_frontier_len(4);
        assert_eq!(tracker.completion(), 0.0);
        tracker.cell_computed();
        assert_eq!(tracker.completion(), 0.25);
        tracker.cell_computed();
        tracker.cell_computed();
        tracker.cell_computed();
        assert_eq!(tracker.completion(), 1.0);
    }

    #[test]
    fn test_reset_zeroes_computed() {
        let tracker = ProgressTracker::new();
        tracker.set_frontier_len(2);
        tracker.cell_computed();
        tracker.reset_computed();
        assert_eq!(tracker.completion(), 0.0);
    }
}
