use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;

use super::record::{Pattern, PatternType};
use crate::storage::StoreError;

#[async_trait]
pub trait PatternStore: Send + Sync {
    async fn insert(&self, pattern: &Pattern) -> Result<(), StoreError>;
    async fn get(&self, owner: &str, id: &str) -> Result<Option<Pattern>, StoreError>;
    async fn update(&self, pattern: &Pattern) -> Result<bool, StoreError>;
    async fn delete(&self, owner: &str, id: &str) -> Result<bool, StoreError>;
    async fn delete_all_for_owner(&self, owner: &str) -> Result<u64, StoreError>;
    async fn list_enabled_for_owner(&self, owner: &str) -> Result<Vec<Pattern>, StoreError>;
    async fn list_all_enabled(&self) -> Result<Vec<Pattern>, StoreError>;
    async fn count_for_owner(&self, owner: &str) -> Result<usize, StoreError>;
    async fn mark_matched(&self, id: &str, at_ms: i64) -> Result<(), StoreError>;
}

pub struct PgPatternStore {
    pool: PgPool,
}

impl PgPatternStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_pattern(row: &PgRow) -> Result<Pattern, sqlx::Error> {
    let type_str: String = row.try_get("pattern_type")?;
    let pattern_type = PatternType::parse(&type_str)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown pattern_type: {type_str}").into()))?;
    let last_matched: Option<chrono::DateTime<chrono::Utc>> = row.try_get("last_matched_at")?;
    let created: chrono::DateTime<chrono::Utc> = row.try_get("created_at")?;
    let updated: chrono::DateTime<chrono::Utc> = row.try_get("updated_at")?;

    Ok(Pattern {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        pattern: row.try_get("pattern")?,
        pattern_type,
        description: row.try_get("description")?,
        min_price: row.try_get("min_price")?,
        max_price: row.try_get("max_price")?,
        tld_filter: row.try_get("tld_filter")?,
        min_length: row.try_get::<Option<i32>, _>("min_length")?.map(|v| v as u16),
        max_length: row.try_get::<Option<i32>, _>("max_length")?.map(|v| v as u16),
        min_age: row.try_get::<Option<i32>, _>("min_age")?.map(|v| v as u16),
        max_age: row.try_get::<Option<i32>, _>("max_age")?.map(|v| v as u16),
        enabled: row.try_get("enabled")?,
        last_matched_at_ms: last_matched.map(|t| t.timestamp_millis()),
        created_at_ms: created.timestamp_millis(),
        updated_at_ms: updated.timestamp_millis(),
    })
}

const SELECT_COLS: &str = "id, owner, pattern, pattern_type, description, min_price, max_price, \
     tld_filter, min_length, max_length, min_age, max_age, enabled, \
     last_matched_at, created_at, updated_at";

#[async_trait]
impl PatternStore for PgPatternStore {
    async fn insert(&self, pattern: &Pattern) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO patterns
               (id, owner, pattern, pattern_type, description, min_price, max_price,
                tld_filter, min_length, max_length, min_age, max_age, enabled,
                created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                       to_timestamp($14::double precision / 1000),
                       to_timestamp($15::double precision / 1000))"#,
        )
        .bind(&pattern.id)
        .bind(&pattern.owner)
        .bind(&pattern.pattern)
        .bind(pattern.pattern_type.as_str())
        .bind(&pattern.description)
        .bind(pattern.min_price)
        .bind(pattern.max_price)
        .bind(&pattern.tld_filter)
        .bind(pattern.min_length.map(|v| v as i32))
        .bind(pattern.max_length.map(|v| v as i32))
        .bind(pattern.min_age.map(|v| v as i32))
        .bind(pattern.max_age.map(|v| v as i32))
        .bind(pattern.enabled)
        .bind(pattern.created_at_ms)
        .bind(pattern.updated_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, owner: &str, id: &str) -> Result<Option<Pattern>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM patterns WHERE owner = $1 AND id = $2"
        ))
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_pattern).transpose().map_err(Into::into)
    }

    async fn update(&self, pattern: &Pattern) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"UPDATE patterns SET
                 pattern = $3, pattern_type = $4, description = $5, min_price = $6,
                 max_price = $7, tld_filter = $8, min_length = $9, max_length = $10,
                 min_age = $11, max_age = $12, enabled = $13,
                 updated_at = to_timestamp($14::double precision / 1000)
               WHERE owner = $1 AND id = $2"#,
        )
        .bind(&pattern.owner)
        .bind(&pattern.id)
        .bind(&pattern.pattern)
        .bind(pattern.pattern_type.as_str())
        .bind(&pattern.description)
        .bind(pattern.min_price)
        .bind(pattern.max_price)
        .bind(&pattern.tld_filter)
        .bind(pattern.min_length.map(|v| v as i32))
        .bind(pattern.max_length.map(|v| v as i32))
        .bind(pattern.min_age.map(|v| v as i32))
        .bind(pattern.max_age.map(|v| v as i32))
        .bind(pattern.enabled)
        .bind(pattern.updated_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, owner: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM patterns WHERE owner = $1 AND id = $2")
            .bind(owner)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_for_owner(&self, owner: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM patterns WHERE owner = $1")
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_enabled_for_owner(&self, owner: &str) -> Result<Vec<Pattern>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM patterns WHERE owner = $1 AND enabled ORDER BY created_at"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| row_to_pattern(r).map_err(Into::into))
            .collect()
    }

    async fn list_all_enabled(&self) -> Result<Vec<Pattern>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM patterns WHERE enabled ORDER BY owner, created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| row_to_pattern(r).map_err(Into::into))
            .collect()
    }

    async fn count_for_owner(&self, owner: &str) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patterns WHERE owner = $1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn mark_matched(&self, id: &str, at_ms: i64) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE patterns SET last_matched_at = to_timestamp($2::double precision / 1000) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// In-memory double used by tests and standalone mode.
#[derive(Clone, Default)]
pub struct MemoryPatternStore {
    patterns: Arc<DashMap<String, Pattern>>,
}

impl MemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PatternStore for MemoryPatternStore {
    async fn insert(&self, pattern: &Pattern) -> Result<(), StoreError> {
        self.patterns.insert(pattern.id.clone(), pattern.clone());
        Ok(())
    }

    async fn get(&self, owner: &str, id: &str) -> Result<Option<Pattern>, StoreError> {
        Ok(self
            .patterns
            .get(id)
            .filter(|p| p.owner == owner)
            .map(|p| p.clone()))
    }

    async fn update(&self, pattern: &Pattern) -> Result<bool, StoreError> {
        if self.patterns.contains_key(&pattern.id) {
            self.patterns.insert(pattern.id.clone(), pattern.clone());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn delete(&self, owner: &str, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .patterns
            .remove_if(id, |_, p| p.owner == owner)
            .is_some())
    }

    async fn delete_all_for_owner(&self, owner: &str) -> Result<u64, StoreError> {
        let before = self.patterns.len();
        self.patterns.retain(|_, p| p.owner != owner);
        Ok((before - self.patterns.len()) as u64)
    }

    async fn list_enabled_for_owner(&self, owner: &str) -> Result<Vec<Pattern>, StoreError> {
        let mut out: Vec<Pattern> = self
            .patterns
            .iter()
            .filter(|p| p.owner == owner && p.enabled)
            .map(|p| p.clone())
            .collect();
        out.sort_by_key(|p| p.created_at_ms);
        Ok(out)
    }

    async fn list_all_enabled(&self) -> Result<Vec<Pattern>, StoreError> {
        let mut out: Vec<Pattern> = self
            .patterns
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.clone())
            .collect();
        out.sort_by(|a, b| (&a.owner, a.created_at_ms).cmp(&(&b.owner, b.created_at_ms)));
        Ok(out)
    }

    async fn count_for_owner(&self, owner: &str) -> Result<usize, StoreError> {
        Ok(self.patterns.iter().filter(|p| p.owner == owner).count())
    }

    async fn mark_matched(&self, id: &str, at_ms: i64) -> Result<(), StoreError> {
        if let Some(mut p) = self.patterns.get_mut(id) {
            p.last_matched_at_ms = Some(at_ms);
        }
        Ok(())
    }
}
