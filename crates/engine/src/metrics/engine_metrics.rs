use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Default)]
pub struct EngineMetrics {
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    patterns_evaluated: AtomicU64,
    patterns_rejected: AtomicU64,
    rows_scanned: AtomicU64,
    evaluation_timeouts: AtomicU64,
    alerts_inserted: AtomicU64,
    duplicates_ignored: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_failed: AtomicU64,
    run_latency_sum_us: AtomicU64,
    run_latency_count: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_runs_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_runs_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_patterns_evaluated(&self) {
        self.patterns_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_patterns_rejected(&self) {
        self.patterns_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_scanned(&self, count: u64) {
        self.rows_scanned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_evaluation_timeouts(&self) {
        self.evaluation_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_alerts_inserted(&self, count: u64) {
        self.alerts_inserted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_duplicates_ignored(&self, count: u64) {
        self.duplicates_ignored.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_notifications_sent(&self, count: u64) {
        self.notifications_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_notifications_failed(&self, count: u64) {
        self.notifications_failed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_run_latency(&self, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        self.run_latency_sum_us.fetch_add(us, Ordering::Relaxed);
        self.run_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn runs_completed_val(&self) -> u64 {
        self.runs_completed.load(Ordering::Relaxed)
    }

    pub fn runs_failed_val(&self) -> u64 {
        self.runs_failed.load(Ordering::Relaxed)
    }

    pub fn patterns_evaluated_val(&self) -> u64 {
        self.patterns_evaluated.load(Ordering::Relaxed)
    }

    pub fn patterns_rejected_val(&self) -> u64 {
        self.patterns_rejected.load(Ordering::Relaxed)
    }

    pub fn rows_scanned_val(&self) -> u64 {
        self.rows_scanned.load(Ordering::Relaxed)
    }

    pub fn evaluation_timeouts_val(&self) -> u64 {
        self.evaluation_timeouts.load(Ordering::Relaxed)
    }

    pub fn alerts_inserted_val(&self) -> u64 {
        self.alerts_inserted.load(Ordering::Relaxed)
    }

    pub fn duplicates_ignored_val(&self) -> u64 {
        self.duplicates_ignored.load(Ordering::Relaxed)
    }

    pub fn notifications_sent_val(&self) -> u64 {
        self.notifications_sent.load(Ordering::Relaxed)
    }

    pub fn notifications_failed_val(&self) -> u64 {
        self.notifications_failed.load(Ordering::Relaxed)
    }

    pub fn run_latency_vals(&self) -> (u64, u64) {
        (
            self.run_latency_sum_us.load(Ordering::Relaxed),
            self.run_latency_count.load(Ordering::Relaxed),
        )
    }
}
