//! Cooperative stop flag shared by the pipeline threads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often blocking waits across the pipeline re-check the stop flag.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Cross-thread cancellation signal.
///
/// Producer, consumer, sampler and worker tasks all observe the same flag at
/// safe points instead of being terminated. Reads are lock-free loads on the
/// hot paths; writes go through the same atomic, so no thread ever observes
/// a torn transition.
#[derive(Clone, Debug, Default)]
pub struct StopFlag {
    status: Arc<AtomicBool>,
}

impl StopFlag {
    /// Creates a new flag in the off state.
    pub fn new() -> Self {
        Self {
            status: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Requests that all loops observing this flag wind down.
    pub fn set_on(&self) {
        self.status.store(true, Ordering::SeqCst);
    }

    /// Clears the flag so loops may run.
    pub fn set_off(&self) {
        self.status.store(false, Ordering::SeqCst);
    }

    pub fn is_on(&self) -> bool {
        self.status.load(Ordering::SeqCst)
    }
}

/// Sleeps for `duration`, waking early if the flag turns on.
///
/// Returns `false` if the sleep was cut short by a stop request.
pub fn sleep_unless_stopped(stop: &StopFlag, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    while !stop.is_on() {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(POLL_INTERVAL));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_toggles() {
        let flag = StopFlag::new();
        assert!(!flag.is_on());
        flag.set_on();
        assert!(flag.is_on());
        flag.set_off();
        assert!(!flag.is_on());
    }

    #[test]
    fn test_flag_shared_across_threads() {
        let flag = StopFlag::new();
        let remote = flag.clone();
        let handle = thread::spawn(move || {
            remote.set_on();
        });
        handle.join().expect("setter thread panicked");
        assert!(flag.is_on());
    }

    #[test]
    fn test_sleep_runs_to_completion() {
        let flag = StopFlag::new();
        let started = Instant::now();
        assert!(sleep_unless_stopped(&flag, Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_sleep_interrupted_promptly() {
        let flag = StopFlag::new();
        let remote = flag.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            remote.set_on();
        });
        let started = Instant::now();
        assert!(!sleep_unless_stopped(&flag, Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(1));
        handle.join().expect("setter thread panicked");
    }

    #[test]
    fn test_sleep_with_flag_already_on() {
        let flag = StopFlag::new();
        flag.set_on();
        assert!(!sleep_unless_stopped(&flag, Duration::from_secs(10)));
    }
}
