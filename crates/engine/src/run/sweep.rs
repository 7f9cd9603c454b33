//! Global sweep: periodically runs every enabled pattern across all owners
//! and fans new matches out as notifications. One broken pattern or owner
//! never stops the rest of the sweep.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use domainwatch_common::time::now_ms;

use crate::error::EngineError;
use crate::matching::MatchResult;
use crate::run::pipeline::{BatchPolicy, Pipeline};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub new_matches: u64,
    pub users_notified: u64,
    pub notifications_sent: u64,
}

impl Pipeline {
    /// Run every enabled pattern in the system against the recent corpus.
    /// Pattern-level failures are logged and skipped; only failing to list
    /// the patterns at all fails the sweep.
    pub async fn sweep_all(&self) -> Result<SweepReport, EngineError> {
        let started = Instant::now();
        let patterns = self.patterns.list_all_enabled().await.map_err(|e| {
            self.metrics.inc_runs_failed();
            EngineError::Storage(e.to_string())
        })?;

        // a sweep that cannot finish before the next one is due gets cut off;
        // alerts already inserted stay valid
        let mut policy = BatchPolicy::live(&self.config, now_ms());
        let cadence = self.config.schedule.sweep_interval_secs;
        if cadence > 0 {
            policy = policy.with_deadline(started + Duration::from_secs(cadence));
        }
        let mut by_owner: HashMap<String, Vec<MatchResult>> = HashMap::new();
        let mut failed = 0usize;
        let mut report = SweepReport::default();

        for pattern in &patterns {
            match self.run_pattern(pattern, &policy).await {
                Ok(run) => {
                    if !run.new_matches.is_empty() {
                        report.new_matches += run.new_matches.len() as u64;
                        by_owner
                            .entry(pattern.owner.clone())
                            .or_default()
                            .extend(run.new_matches);
                    }
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        owner = %pattern.owner,
                        pattern_id = %pattern.id,
                        error = %e,
                        "sweep skipped pattern"
                    );
                }
            }
        }

        if !by_owner.is_empty() {
            let fanout = self.fanout.dispatch(&by_owner).await;
            report.users_notified = fanout.users_notified;
            report.notifications_sent = fanout.notifications_sent;
            self.metrics.add_notifications_sent(fanout.notifications_sent);
            self.metrics.add_notifications_failed(fanout.deliveries_failed);
        }

        self.metrics.inc_runs_completed();
        self.metrics.record_run_latency(started);
        tracing::info!(
            patterns = patterns.len(),
            failed,
            new_matches = report.new_matches,
            users_notified = report.users_notified,
            "sweep finished"
        );

        Ok(report)
    }
}
