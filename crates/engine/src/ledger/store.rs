use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::Arc;

use super::AlertRecord;
use crate::storage::StoreError;

#[async_trait]
pub trait AlertLedger: Send + Sync {
    /// Idempotent insert keyed on (owner, pattern_id, auction_id). Returns
    /// true when the record was new, false when the triple was already
    /// surfaced. Concurrent writers racing the same triple both succeed.
    async fn insert_ignore(&self, record: &AlertRecord) -> Result<bool, StoreError>;

    async fn delete_for_pattern(&self, pattern_id: &str) -> Result<u64, StoreError>;

    async fn delete_for_owner(&self, owner: &str) -> Result<u64, StoreError>;

    /// Drops records alerted before `cutoff_ms`, regardless of pattern state.
    async fn purge_older_than(&self, cutoff_ms: i64) -> Result<u64, StoreError>;

    async fn count_for_pattern(&self, pattern_id: &str) -> Result<u64, StoreError>;
}

pub struct PgAlertLedger {
    pool: PgPool,
}

impl PgAlertLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertLedger for PgAlertLedger {
    async fn insert_ignore(&self, record: &AlertRecord) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"INSERT INTO pattern_alerts
               (owner, pattern_id, auction_id, domain_name, alerted_at)
               VALUES ($1, $2, $3, $4, to_timestamp($5::double precision / 1000))
               ON CONFLICT (owner, pattern_id, auction_id) DO NOTHING"#,
        )
        .bind(&record.owner)
        .bind(&record.pattern_id)
        .bind(&record.auction_id)
        .bind(&record.domain_name)
        .bind(record.alerted_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_pattern(&self, pattern_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM pattern_alerts WHERE pattern_id = $1")
            .bind(pattern_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_for_owner(&self, owner: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM pattern_alerts WHERE owner = $1")
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn purge_older_than(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM pattern_alerts \
             WHERE alerted_at < to_timestamp($1::double precision / 1000)",
        )
        .bind(cutoff_ms)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_for_pattern(&self, pattern_id: &str) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pattern_alerts WHERE pattern_id = $1")
                .bind(pattern_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}

/// In-memory ledger keyed by the uniqueness triple.
#[derive(Clone, Default)]
pub struct MemoryAlertLedger {
    records: Arc<DashMap<(String, String, String), AlertRecord>>,
}

impl MemoryAlertLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertLedger for MemoryAlertLedger {
    async fn insert_ignore(&self, record: &AlertRecord) -> Result<bool, StoreError> {
        let key = record.key();
        if self.records.contains_key(&key) {
            return Ok(false);
        }
        // entry() keeps the race between the check and the insert convergent.
        let mut new = false;
        self.records.entry(key).or_insert_with(|| {
            new = true;
            record.clone()
        });
        Ok(new)
    }

    async fn delete_for_pattern(&self, pattern_id: &str) -> Result<u64, StoreError> {
        let before = self.records.len();
        self.records.retain(|(_, pid, _), _| pid != pattern_id);
        Ok((before - self.records.len()) as u64)
    }

    async fn delete_for_owner(&self, owner: &str) -> Result<u64, StoreError> {
        let before = self.records.len();
        self.records.retain(|(o, _, _), _| o != owner);
        Ok((before - self.records.len()) as u64)
    }

    async fn purge_older_than(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        let before = self.records.len();
        self.records.retain(|_, r| r.alerted_at_ms >= cutoff_ms);
        Ok((before - self.records.len()) as u64)
    }

    async fn count_for_pattern(&self, pattern_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.pattern_id == pattern_id)
            .count() as u64)
    }
}
