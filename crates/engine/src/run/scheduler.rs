//! Background cadence for the worker: the periodic sweep and the ledger
//! retention purge. Intervals are jittered so a fleet of workers sharing one
//! database does not thunder in step.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use domainwatch_common::time::now_ms;

use crate::run::pipeline::{Pipeline, DAY_MS};

pub fn apply_jitter(base: Duration, jitter_fraction: f64) -> Duration {
    if jitter_fraction <= 0.0 {
        return base;
    }
    let jitter_max = base.as_secs_f64() * jitter_fraction.clamp(0.0, 1.0);
    let offset = rand_f64() * jitter_max;
    Duration::from_secs_f64(base.as_secs_f64() + offset)
}

fn rand_f64() -> f64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    let s = RandomState::new();
    let mut h = s.build_hasher();
    h.write_u64(0);
    (h.finish() as f64) / (u64::MAX as f64)
}

pub struct TaskHandle {
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Periodically sweep every enabled pattern. Failures are logged and the
/// loop keeps its cadence.
pub fn spawn_sweep_task(pipeline: Arc<Pipeline>) -> TaskHandle {
    let interval = Duration::from_secs(pipeline.config().schedule.sweep_interval_secs);
    let jitter = pipeline.config().schedule.jitter_fraction;
    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(apply_jitter(interval, jitter)).await;
            if let Err(e) = pipeline.sweep_all().await {
                tracing::error!(error = %e, "scheduled sweep failed");
            }
        }
    });
    TaskHandle { handle }
}

/// Periodically drop ledger rows older than the retention window. Purged
/// auctions have long ended, so a pattern re-matching one later only produces
/// a redundant alert, never a missed one.
pub fn spawn_retention_task(pipeline: Arc<Pipeline>) -> TaskHandle {
    let interval = Duration::from_secs(pipeline.config().schedule.retention_interval_secs);
    let jitter = pipeline.config().schedule.jitter_fraction;
    let retention_days = pipeline.config().limits.retention_days;
    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(apply_jitter(interval, jitter)).await;
            let cutoff = now_ms() - retention_days as i64 * DAY_MS;
            match pipeline.ledger.purge_older_than(cutoff).await {
                Ok(purged) if purged > 0 => {
                    tracing::info!(purged, retention_days, "purged expired alerts");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "alert retention purge failed"),
            }
        }
    });
    TaskHandle { handle }
}
