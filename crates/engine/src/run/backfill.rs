//! Backfill: a deep historical scan for a single pattern, run right after the
//! pattern is created or its filters change so the owner is not left waiting
//! for the next sweep. Ignores the recency window and pages with the deeper
//! backfill batch cap.

use std::collections::HashMap;
use std::time::Instant;

use crate::error::EngineError;
use crate::matching::MatchResult;
use crate::run::pipeline::{BatchPolicy, PatternRunFailure, Pipeline};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub matches_found: u64,
    pub duration_ms: u64,
}

impl Pipeline {
    /// Scan the whole corpus for one pattern the owner holds, ledger the hits
    /// and notify the owner about anything not alerted before.
    pub async fn backfill_pattern(
        &self,
        owner: &str,
        pattern_id: &str,
    ) -> Result<BackfillReport, EngineError> {
        let started = Instant::now();
        let pattern = self
            .patterns
            .get(owner, pattern_id)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?
            .ok_or_else(|| EngineError::PatternNotFound(pattern_id.to_string()))?;

        let policy = BatchPolicy::backfill(&self.config);
        let run = match self.run_pattern(&pattern, &policy).await {
            Ok(run) => run,
            Err(PatternRunFailure::Rejected(reason)) => {
                self.metrics.inc_runs_failed();
                return Err(EngineError::Validation(reason));
            }
            Err(PatternRunFailure::Inventory(e)) => {
                self.metrics.inc_runs_failed();
                return Err(EngineError::InventoryRead(e.to_string()));
            }
            Err(PatternRunFailure::Storage(e)) => {
                self.metrics.inc_runs_failed();
                return Err(EngineError::Storage(e.to_string()));
            }
        };

        if !run.new_matches.is_empty() {
            let by_owner: HashMap<String, Vec<MatchResult>> =
                HashMap::from([(owner.to_string(), run.new_matches.clone())]);
            let fanout = self.fanout.dispatch(&by_owner).await;
            self.metrics.add_notifications_sent(fanout.notifications_sent);
            self.metrics.add_notifications_failed(fanout.deliveries_failed);
        }

        self.metrics.inc_runs_completed();
        self.metrics.record_run_latency(started);

        let report = BackfillReport {
            matches_found: run.matches_found,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            owner,
            pattern_id,
            matches = report.matches_found,
            new = run.new_matches.len(),
            truncated = run.scan_truncated,
            duration_ms = report.duration_ms,
            "backfill finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use domainwatch_common::time::now_ms;

    use crate::config::EngineConfig;
    use crate::inventory::{AuctionRow, MemoryInventory};
    use crate::ledger::MemoryAlertLedger;
    use crate::metrics::EngineMetrics;
    use crate::notify::NotificationFanout;
    use crate::pattern::{MemoryPatternStore, Pattern, PatternStore, PatternType};

    fn pattern(id: &str, owner: &str, text: &str) -> Pattern {
        Pattern {
            id: id.into(),
            owner: owner.into(),
            pattern: text.into(),
            pattern_type: PatternType::Regex,
            description: "test".into(),
            min_price: 0.0,
            max_price: None,
            tld_filter: None,
            min_length: None,
            max_length: None,
            min_age: None,
            max_age: None,
            enabled: true,
            last_matched_at_ms: None,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    fn pipeline(patterns: Arc<MemoryPatternStore>, inventory: Arc<MemoryInventory>) -> Pipeline {
        Pipeline::new(
            patterns,
            inventory,
            Arc::new(MemoryAlertLedger::new()),
            NotificationFanout::new(None, None),
            EngineMetrics::new(),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn backfill_scans_beyond_recency_window() {
        let patterns = Arc::new(MemoryPatternStore::new());
        patterns.insert(&pattern("p-1", "alice", "^sho")).await.unwrap();

        let inventory = Arc::new(MemoryInventory::new());
        // far outside any live window
        inventory.push(AuctionRow {
            id: "a-1".into(),
            domain_name: "shop.com".into(),
            price: 25.0,
            tld: "com".into(),
            end_time_ms: now_ms() + 90 * 86_400_000,
            domain_age: None,
        });

        let pipe = pipeline(patterns, inventory);
        let report = pipe.backfill_pattern("alice", "p-1").await.unwrap();
        assert_eq!(report.matches_found, 1);
    }

    #[tokio::test]
    async fn unknown_pattern_is_not_found() {
        let pipe = pipeline(
            Arc::new(MemoryPatternStore::new()),
            Arc::new(MemoryInventory::new()),
        );
        let err = pipe.backfill_pattern("alice", "missing").await.unwrap_err();
        assert!(matches!(err, EngineError::PatternNotFound(_)));
    }

    #[tokio::test]
    async fn foreign_owner_cannot_backfill() {
        let patterns = Arc::new(MemoryPatternStore::new());
        patterns.insert(&pattern("p-1", "alice", "^sho")).await.unwrap();

        let pipe = pipeline(patterns, Arc::new(MemoryInventory::new()));
        let err = pipe.backfill_pattern("mallory", "p-1").await.unwrap_err();
        assert!(matches!(err, EngineError::PatternNotFound(_)));
    }
}
