//! On-demand check: run every enabled pattern for one owner, notify on new
//! matches. Calls are debounced per owner so a page refresh cannot trigger
//! back-to-back corpus scans.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use domainwatch_common::time::now_ms;

use crate::error::EngineError;
use crate::matching::MatchResult;
use crate::run::pipeline::{BatchPolicy, PatternRunFailure, Pipeline};

#[derive(Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    MatchesFound { matches: u64, new_matches: u64 },
    NoMatches,
    /// A run for this owner finished too recently; nothing was scanned.
    Debounced,
}

/// Per-owner minimum interval between runs.
pub struct Debouncer {
    last_run: DashMap<String, Instant>,
    min_interval: Duration,
}

impl Debouncer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_run: DashMap::new(),
            min_interval,
        }
    }

    /// Returns `true` and records the attempt if enough time has passed
    /// since the owner's last admitted run.
    pub fn admit(&self, owner: &str) -> bool {
        let now = Instant::now();
        let mut admitted = false;
        self.last_run
            .entry(owner.to_string())
            .and_modify(|last| {
                if now.duration_since(*last) >= self.min_interval {
                    *last = now;
                    admitted = true;
                }
            })
            .or_insert_with(|| {
                admitted = true;
                now
            });
        admitted
    }
}

impl Pipeline {
    /// Scan the corpus for all of one owner's enabled patterns and push/email
    /// a digest of anything new. A pattern that fails mid-run is logged and
    /// skipped; the rest of the owner's patterns still run.
    pub async fn check_owner_patterns(&self, owner: &str) -> Result<CheckOutcome, EngineError> {
        if !self.debounce.admit(owner) {
            tracing::debug!(owner, "check debounced");
            return Ok(CheckOutcome::Debounced);
        }

        let started = Instant::now();
        let patterns = self
            .patterns
            .list_enabled_for_owner(owner)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;

        let policy = BatchPolicy::live(&self.config, now_ms());
        let mut total_matches = 0u64;
        let mut new_matches: Vec<MatchResult> = Vec::new();

        for pattern in &patterns {
            match self.run_pattern(pattern, &policy).await {
                Ok(report) => {
                    total_matches += report.matches_found;
                    new_matches.extend(report.new_matches);
                }
                Err(PatternRunFailure::Storage(e)) => {
                    self.metrics.inc_runs_failed();
                    return Err(EngineError::Storage(e.to_string()));
                }
                Err(e) => {
                    tracing::warn!(owner, pattern_id = %pattern.id, error = %e, "pattern run skipped");
                }
            }
        }

        if !new_matches.is_empty() {
            let by_owner: HashMap<String, Vec<MatchResult>> =
                HashMap::from([(owner.to_string(), new_matches.clone())]);
            let report = self.fanout.dispatch(&by_owner).await;
            self.metrics.add_notifications_sent(report.notifications_sent);
            self.metrics.add_notifications_failed(report.deliveries_failed);
        }

        self.metrics.inc_runs_completed();
        self.metrics.record_run_latency(started);
        tracing::info!(
            owner,
            patterns = patterns.len(),
            matches = total_matches,
            new = new_matches.len(),
            "check finished"
        );

        if total_matches > 0 {
            Ok(CheckOutcome::MatchesFound {
                matches: total_matches,
                new_matches: new_matches.len() as u64,
            })
        } else {
            Ok(CheckOutcome::NoMatches)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::EngineConfig;
    use crate::inventory::{AuctionRow, MemoryInventory};
    use crate::ledger::MemoryAlertLedger;
    use crate::metrics::EngineMetrics;
    use crate::notify::NotificationFanout;
    use crate::pattern::{MemoryPatternStore, Pattern, PatternStore, PatternType};

    fn row(id: &str, name: &str, price: f64) -> AuctionRow {
        AuctionRow {
            id: id.into(),
            domain_name: name.into(),
            price,
            tld: "com".into(),
            end_time_ms: now_ms() + 60_000,
            domain_age: None,
        }
    }

    async fn seeded_pipeline(pattern_text: &str, rows: Vec<AuctionRow>) -> Pipeline {
        let patterns = Arc::new(MemoryPatternStore::new());
        let p = Pattern {
            id: "p-1".into(),
            owner: "alice".into(),
            pattern: pattern_text.into(),
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
        };
        patterns.insert(&p).await.unwrap();

        let inventory = Arc::new(MemoryInventory::new());
        inventory.extend(rows);

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
    async fn finds_matches_for_owner() {
        let pipe = seeded_pipeline(
            "^ai",
            vec![row("a-1", "aidog.com", 50.0), row("a-2", "claim.com", 10.0)],
        )
        .await;

        let first = pipe.check_owner_patterns("alice").await.unwrap();
        assert_eq!(
            first,
            CheckOutcome::MatchesFound {
                matches: 1,
                new_matches: 1
            }
        );
    }

    #[tokio::test]
    async fn second_call_within_interval_is_debounced() {
        let pipe = seeded_pipeline("^ai", vec![row("a-1", "aidog.com", 50.0)]).await;

        let first = pipe.check_owner_patterns("alice").await.unwrap();
        assert!(matches!(first, CheckOutcome::MatchesFound { .. }));
        let second = pipe.check_owner_patterns("alice").await.unwrap();
        assert_eq!(second, CheckOutcome::Debounced);
    }

    #[tokio::test]
    async fn debounce_is_per_owner() {
        let debouncer = Debouncer::new(Duration::from_secs(30));
        assert!(debouncer.admit("alice"));
        assert!(!debouncer.admit("alice"));
        assert!(debouncer.admit("bob"));
    }

    #[tokio::test]
    async fn zero_interval_always_admits() {
        let debouncer = Debouncer::new(Duration::ZERO);
        assert!(debouncer.admit("alice"));
        assert!(debouncer.admit("alice"));
    }

    #[tokio::test]
    async fn owner_with_no_match_gets_no_matches() {
        let pipe = seeded_pipeline("^zz", vec![row("a-1", "aidog.com", 50.0)]).await;

        let outcome = pipe.check_owner_patterns("alice").await.unwrap();
        assert_eq!(outcome, CheckOutcome::NoMatches);
    }
}
