//! Fixed-interval sweep driver.
//!
//! Wraps a [`SweepRunner`] in a poll loop: run one sweep over all active
//! tenants, log the outcome, sleep, repeat. A directory failure aborts the
//! current run only; the next interval retries it. Shutdown is requested
//! through the shared handle and observed at the top of each iteration, so
//! worst-case shutdown latency is one poll interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::sweep::{SweepRunner, SweepScope};

/// The periodic driver around [`SweepRunner::run_sweep`].
pub struct SweepScheduler {
    runner: SweepRunner,
    interval: Duration,
    dry_run: bool,
    shutdown: Arc<AtomicBool>,
}

impl SweepScheduler {
    /// Creates a scheduler sweeping every `interval`.
    #[must_use]
    pub fn new(runner: SweepRunner, interval: Duration, dry_run: bool) -> Self {
        let shutdown = runner.shutdown_handle();
        Self {
            runner,
            interval,
            dry_run,
            shutdown,
        }
    }

    /// Handle for requesting shutdown.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Runs the scheduler loop until shutdown is requested.
    pub async fn run(&self) {
        info!(
            interval_secs = self.interval.as_secs(),
            dry_run = self.dry_run,
            "sweep scheduler starting"
        );

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.runner.run_sweep(SweepScope::All, self.dry_run).await {
                Ok(report) => {
                    info!(
                        tenants = report.tenants.len(),
                        violations = report.total_violations(),
                        errors = report.total_errors(),
                        "scheduled sweep finished"
                    );
                },
                Err(err) => {
                    warn!(error = %err, "sweep aborted, retrying at next interval");
                },
            }
            tokio::time::sleep(self.interval).await;
        }

        info!("sweep scheduler shutting down");
    }
}
