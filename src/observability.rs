//! Dispatcher counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_started: AtomicU64,
    jobs_released: AtomicU64,
    tasks_enqueued: AtomicU64,
    tasks_executed: AtomicU64,
    tasks_discarded: AtomicU64,
    redirects_followed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "jobs_started", "Metric incremented");
    }

    pub fn job_released(&self) {
        self.jobs_released.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "jobs_released", "Metric incremented");
    }

    pub fn task_enqueued(&self) {
        self.tasks_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_executed(&self) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tasks_discarded(&self, count: u64) {
        self.tasks_discarded.fetch_add(count, Ordering::Relaxed);
        tracing::trace!(counter = "tasks_discarded", count, "Metric incremented");
    }

    pub fn redirect_followed(&self) {
        self.redirects_followed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "redirects_followed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_released: self.jobs_released.load(Ordering::Relaxed),
            tasks_enqueued: self.tasks_enqueued.load(Ordering::Relaxed),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            tasks_discarded: self.tasks_discarded.load(Ordering::Relaxed),
            redirects_followed: self.redirects_followed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub jobs_started: u64,
    pub jobs_released: u64,
    pub tasks_enqueued: u64,
    pub tasks_executed: u64,
    pub tasks_discarded: u64,
    pub redirects_followed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = Metrics::new();
        metrics.job_started();
        metrics.task_enqueued();
        metrics.task_enqueued();
        metrics.tasks_discarded(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_started, 1);
        assert_eq!(snapshot.tasks_enqueued, 2);
        assert_eq!(snapshot.tasks_discarded, 3);
        assert_eq!(snapshot.jobs_released, 0);
    }
}
