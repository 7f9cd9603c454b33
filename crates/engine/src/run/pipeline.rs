//! Shared scan pipeline behind the on-demand check, the global sweep and
//! backfill. One pattern at a time: derive a literal pre-filter, page the
//! auction corpus in bounded batches, evaluate under a wall-clock budget and
//! record each hit in the alert ledger exactly once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use domainwatch_common::retry::{retry_async, RetryConfig};
use domainwatch_common::time::now_ms;

use crate::config::EngineConfig;
use crate::inventory::{AuctionQuery, InventoryError, InventorySource, OrderBy};
use crate::ledger::{AlertLedger, AlertRecord};
use crate::matching::{compile, evaluate, LiteralHint, MatchResult};
use crate::metrics::EngineMetrics;
use crate::notify::NotificationFanout;
use crate::pattern::{Pattern, PatternStore, RejectReason};
use crate::run::check::Debouncer;
use crate::storage::{self, StoreError};

pub(crate) const DAY_MS: i64 = 86_400_000;

/// How a single run pages through the corpus.
#[derive(Debug, Clone)]
pub struct BatchPolicy {
    pub batch_size: u64,
    pub max_batches: u32,
    /// Only consider auctions closing before this instant. `None` scans the
    /// whole corpus (backfill).
    pub ends_before_ms: Option<i64>,
    pub eval_budget: Duration,
    /// Hard stop for the whole run. Alerts inserted before the deadline stay
    /// valid; remaining batches are skipped.
    pub deadline: Option<Instant>,
}

impl BatchPolicy {
    /// Policy for live runs (check and sweep): recency-windowed, shallow.
    pub fn live(config: &EngineConfig, now: i64) -> Self {
        Self {
            batch_size: config.batching.batch_size,
            max_batches: config.batching.max_batches,
            ends_before_ms: Some(now + config.batching.sweep_window_days as i64 * DAY_MS),
            eval_budget: Duration::from_millis(config.limits.eval_budget_ms),
            deadline: None,
        }
    }

    /// Policy for backfill: no recency window, deeper batch cap.
    pub fn backfill(config: &EngineConfig) -> Self {
        Self {
            batch_size: config.batching.batch_size,
            max_batches: config.batching.backfill_max_batches,
            ends_before_ms: None,
            eval_budget: Duration::from_millis(config.limits.eval_budget_ms),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[derive(Debug)]
pub enum PatternRunFailure {
    /// The stored pattern no longer passes validation (limits tightened since
    /// it was saved, or a corrupt row).
    Rejected(RejectReason),
    Inventory(InventoryError),
    Storage(StoreError),
}

impl std::fmt::Display for PatternRunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "pattern rejected: {reason}"),
            Self::Inventory(e) => write!(f, "inventory read failed: {e}"),
            Self::Storage(e) => write!(f, "storage failed: {e}"),
        }
    }
}

impl std::error::Error for PatternRunFailure {}

/// Outcome of scanning the corpus for one pattern.
#[derive(Debug, Default)]
pub struct PatternRunReport {
    pub pattern_id: String,
    /// Every row the matcher accepted, including already-alerted duplicates.
    pub matches_found: u64,
    /// Matches recorded in the ledger for the first time this run.
    pub new_matches: Vec<MatchResult>,
    pub rows_scanned: u64,
    pub timed_out: bool,
    /// The scan stopped at the batch cap or deadline with corpus left over.
    pub scan_truncated: bool,
}

pub struct Pipeline {
    pub(crate) patterns: Arc<dyn PatternStore>,
    pub(crate) inventory: Arc<dyn InventorySource>,
    pub(crate) ledger: Arc<dyn AlertLedger>,
    pub(crate) fanout: NotificationFanout,
    pub(crate) metrics: Arc<EngineMetrics>,
    pub(crate) config: EngineConfig,
    pub(crate) debounce: Debouncer,
    read_retry: RetryConfig,
}

impl Pipeline {
    pub fn new(
        patterns: Arc<dyn PatternStore>,
        inventory: Arc<dyn InventorySource>,
        ledger: Arc<dyn AlertLedger>,
        fanout: NotificationFanout,
        metrics: Arc<EngineMetrics>,
        config: EngineConfig,
    ) -> Self {
        let debounce = Debouncer::new(Duration::from_secs(config.limits.debounce_secs));
        Self {
            patterns,
            inventory,
            ledger,
            fanout,
            metrics,
            config,
            debounce,
            read_retry: RetryConfig::default(),
        }
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scan the corpus for one pattern and ledger every hit. Duplicate hits
    /// are counted but not returned; `mark_matched` is best-effort.
    pub async fn run_pattern(
        &self,
        pattern: &Pattern,
        policy: &BatchPolicy,
    ) -> Result<PatternRunReport, PatternRunFailure> {
        let matcher = match compile(pattern) {
            Ok(m) => m,
            Err(reason) => {
                self.metrics.inc_patterns_rejected();
                tracing::warn!(
                    pattern_id = %pattern.id,
                    reason = %reason,
                    "stored pattern fails validation, skipping"
                );
                return Err(PatternRunFailure::Rejected(reason));
            }
        };
        self.metrics.inc_patterns_evaluated();

        let hint = LiteralHint::derive(&pattern.pattern, pattern.pattern_type);
        let mut query = base_query(pattern, policy);
        if let Some(hint) = &hint {
            query.name_contains_any = hint.tokens.clone();
        }
        // With token pushdown the candidate set is already narrow, so the
        // batch cap scales with the number of tokens. Without a hint the
        // recency-ordered scan keeps the flat cap and may truncate.
        let batch_cap = match &hint {
            Some(hint) => scaled_cap(policy.max_batches, hint.tokens.len()),
            None => policy.max_batches,
        };

        let mut report = PatternRunReport {
            pattern_id: pattern.id.clone(),
            ..Default::default()
        };

        let mut batches = 0u32;
        loop {
            if let Some(deadline) = policy.deadline {
                if Instant::now() >= deadline {
                    report.scan_truncated = true;
                    tracing::warn!(pattern_id = %pattern.id, batches, "run deadline reached mid-scan");
                    break;
                }
            }

            query.offset = batches as u64 * policy.batch_size;
            query.limit = policy.batch_size;
            let rows = retry_async(&self.read_retry, || self.inventory.list_auctions(&query))
                .await
                .map_err(PatternRunFailure::Inventory)?;
            batches += 1;

            let batch = evaluate(pattern, &matcher, &rows, policy.eval_budget);
            report.rows_scanned += batch.rows_scanned as u64;
            report.matches_found += batch.matches.len() as u64;
            self.metrics.add_rows_scanned(batch.rows_scanned as u64);

            for m in batch.matches {
                let record = AlertRecord {
                    owner: pattern.owner.clone(),
                    pattern_id: pattern.id.clone(),
                    auction_id: m.auction_id.clone(),
                    domain_name: m.domain_name.clone(),
                    alerted_at_ms: now_ms(),
                };
                match self.record_alert(&record).await {
                    Ok(true) => report.new_matches.push(m),
                    Ok(false) => self.metrics.add_duplicates_ignored(1),
                    Err(e) => return Err(PatternRunFailure::Storage(e)),
                }
            }

            if batch.timed_out {
                report.timed_out = true;
                report.scan_truncated = true;
                self.metrics.inc_evaluation_timeouts();
                tracing::warn!(
                    pattern_id = %pattern.id,
                    budget_ms = policy.eval_budget.as_millis() as u64,
                    "evaluation budget exhausted, rest of run skipped"
                );
                break;
            }
            if (rows.len() as u64) < policy.batch_size {
                break;
            }
            if batches >= batch_cap {
                report.scan_truncated = true;
                tracing::warn!(
                    pattern_id = %pattern.id,
                    batches,
                    "batch cap reached, deeper inventory not examined"
                );
                break;
            }
        }

        self.metrics.add_alerts_inserted(report.new_matches.len() as u64);
        if !report.new_matches.is_empty() {
            if let Err(e) = self.patterns.mark_matched(&pattern.id, now_ms()).await {
                tracing::warn!(pattern_id = %pattern.id, error = %e, "failed to update last match time");
            }
        }

        Ok(report)
    }

    /// One immediate retry on transient ledger failures. A duplicate-key
    /// outcome is not an error; `Ok(false)` means the alert already existed.
    async fn record_alert(&self, record: &AlertRecord) -> Result<bool, StoreError> {
        match self.ledger.insert_ignore(record).await {
            Err(e) if storage::is_transient(&e) => {
                tracing::warn!(error = %e, "transient ledger failure, retrying once");
                self.ledger.insert_ignore(record).await
            }
            other => other,
        }
    }
}

fn scaled_cap(per_token: u32, tokens: usize) -> u32 {
    per_token.saturating_mul(tokens.max(1) as u32)
}

fn base_query(pattern: &Pattern, policy: &BatchPolicy) -> AuctionQuery {
    AuctionQuery {
        min_price: (pattern.min_price > 0.0).then_some(pattern.min_price),
        max_price: pattern.max_price,
        tld: pattern.tld_filter.clone(),
        min_stem_length: pattern.min_length,
        max_stem_length: pattern.max_length,
        min_age: pattern.min_age,
        max_age: pattern.max_age,
        ends_before_ms: policy.ends_before_ms,
        order_by: OrderBy::EndingSoonest,
        ..Default::default()
    }
}
