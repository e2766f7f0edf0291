//! Periodic ingestion: one pass immediately, then one every interval until
//! shutdown is requested.
//!
//! Passes run on the calling thread, so a slow pass delays the next one
//! instead of overlapping it. The interval is measured from the end of one
//! pass to the start of the next, so the cadence drifts by the pass duration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Longest single sleep between shutdown checks.
const TICK: Duration = Duration::from_millis(200);

/// Cloneable shutdown request shared with signal handlers.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag on SIGINT or SIGTERM.
    pub fn register_signals(&self) -> std::io::Result<()> {
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&self.0))?;
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&self.0))?;
        Ok(())
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs a pass eagerly and then again one interval after each pass ends.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    shutdown: ShutdownFlag,
}

impl Scheduler {
    pub fn new(interval: Duration, shutdown: ShutdownFlag) -> Self {
        Self { interval, shutdown }
    }

    /// Run `pass` until shutdown is requested. Returns the number of passes.
    ///
    /// The wait before each pass starts after the previous pass returns.
    pub fn run(&self, mut pass: impl FnMut()) -> usize {
        let mut passes = 0;
        tracing::info!(interval_secs = self.interval.as_secs(), "scheduler started");
        while !self.shutdown.is_requested() {
            passes += 1;
            tracing::debug!(pass = passes, "starting scheduled pass");
            pass();
            if !self.sleep_interval() {
                break;
            }
        }
        tracing::info!(passes, "scheduler stopped");
        passes
    }

    /// Sleep for one interval. Returns false if shutdown interrupted it.
    fn sleep_interval(&self) -> bool {
        let deadline = Instant::now() + self.interval;
        loop {
            if self.shutdown.is_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(TICK.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pass_runs_immediately() {
        let shutdown = ShutdownFlag::new();
        let scheduler = Scheduler::new(Duration::from_secs(3600), shutdown.clone());

        let started = Instant::now();
        let passes = scheduler.run(|| shutdown.request());

        assert_eq!(passes, 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn repeats_until_shutdown() {
        let shutdown = ShutdownFlag::new();
        let scheduler = Scheduler::new(Duration::from_millis(10), shutdown.clone());

        let mut count = 0;
        let passes = scheduler.run(|| {
            count += 1;
            if count == 3 {
                shutdown.request();
            }
        });

        assert_eq!(passes, 3);
        assert_eq!(count, 3);
    }

    #[test]
    fn interval_starts_after_each_pass_ends() {
        let shutdown = ShutdownFlag::new();
        let scheduler = Scheduler::new(Duration::from_millis(60), shutdown.clone());

        let started = Instant::now();
        let mut starts = Vec::new();
        scheduler.run(|| {
            starts.push(started.elapsed());
            std::thread::sleep(Duration::from_millis(60));
            if starts.len() == 3 {
                shutdown.request();
            }
        });

        // Each start waits for the previous 60ms pass plus the 60ms interval.
        assert_eq!(starts.len(), 3);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(120));
        }
    }

    #[test]
    fn shutdown_before_start_runs_nothing() {
        let shutdown = ShutdownFlag::new();
        shutdown.request();
        let scheduler = Scheduler::new(Duration::from_millis(10), shutdown);
        assert_eq!(scheduler.run(|| panic!("must not run")), 0);
    }

    #[test]
    fn shutdown_from_another_thread_interrupts_sleep() {
        let shutdown = ShutdownFlag::new();
        let scheduler = Scheduler::new(Duration::from_secs(3600), shutdown.clone());

        let remote = shutdown.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            remote.request();
        });

        let started = Instant::now();
        let passes = scheduler.run(|| {});
        handle.join().unwrap();

        assert_eq!(passes, 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
