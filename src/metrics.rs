// Job metrics module
//
// Counters the job runner updates as jobs and items complete

use crate::models::JobStatus;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Conversion metrics shared by the job runner and its workers
///
/// Uses atomic operations so the worker can record without locks while the
/// interface thread reads. Logged on shutdown by the host.
#[derive(Debug)]
pub struct JobMetrics {
    pub jobs_submitted: AtomicUsize,
    pub jobs_succeeded: AtomicUsize,
    pub jobs_failed: AtomicUsize,
    pub jobs_cancelled: AtomicUsize,

    /// Submissions refused because another job was running
    pub jobs_rejected_busy: AtomicUsize,

    pub items_converted: AtomicUsize,
    pub items_failed: AtomicUsize,

    /// Time spent inside adapter calls, in milliseconds
    pub total_conversion_time_ms: AtomicU64,

    start_time: Instant,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self {
            jobs_submitted: AtomicUsize::new(0),
            jobs_succeeded: AtomicUsize::new(0),
            jobs_failed: AtomicUsize::new(0),
            jobs_cancelled: AtomicUsize::new(0),
            jobs_rejected_busy: AtomicUsize::new(0),
            items_converted: AtomicUsize::new(0),
            items_failed: AtomicUsize::new(0),
            total_conversion_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_busy(&self) {
        self.jobs_rejected_busy.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the terminal status of a job
    pub fn record_finished(&self, status: JobStatus) {
        let counter = match status {
            JobStatus::Success => &self.jobs_succeeded,
            JobStatus::Failure => &self.jobs_failed,
            JobStatus::Cancelled => &self.jobs_cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one adapter call and how long it took
    pub fn record_item(&self, converted: bool, duration: Duration) {
        if converted {
            self.items_converted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.items_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_conversion_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average adapter time per item in milliseconds
    pub fn avg_conversion_time_ms(&self) -> f64 {
        let total = self.total_conversion_time_ms.load(Ordering::Relaxed);
        let count = self.items_converted.load(Ordering::Relaxed)
            + self.items_failed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Conversion Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Jobs: {} submitted, {} succeeded, {} failed, {} cancelled, {} rejected (busy)",
            self.jobs_submitted.load(Ordering::Relaxed),
            self.jobs_succeeded.load(Ordering::Relaxed),
            self.jobs_failed.load(Ordering::Relaxed),
            self.jobs_cancelled.load(Ordering::Relaxed),
            self.jobs_rejected_busy.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Items: {} converted, {} failed (avg: {:.2}ms per item)",
            self.items_converted.load(Ordering::Relaxed),
            self.items_failed.load(Ordering::Relaxed),
            self.avg_conversion_time_ms()
        );
    }
}

impl Default for JobMetrics {
    fn default() -> Self {
        Self::new()
    }
}
