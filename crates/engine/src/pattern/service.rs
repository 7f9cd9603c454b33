use std::sync::Arc;

use domainwatch_common::{id, time};

use super::record::{Pattern, PatternDraft, PatternType, PatternUpdate};
use super::store::PatternStore;
use super::validator;
use crate::error::EngineError;
use crate::ledger::AlertLedger;

/// Pattern lifecycle: validation before storage, the externally supplied
/// plan limit, and alert invalidation on filter edits. Authorization happened
/// before any call lands here; `owner` is trusted.
pub struct PatternService {
    store: Arc<dyn PatternStore>,
    ledger: Arc<dyn AlertLedger>,
}

impl PatternService {
    pub fn new(store: Arc<dyn PatternStore>, ledger: Arc<dyn AlertLedger>) -> Self {
        Self { store, ledger }
    }

    fn validate_text(pattern: &str, pattern_type: PatternType) -> Result<(), EngineError> {
        match pattern_type {
            PatternType::Regex => validator::validate(pattern)?,
            PatternType::Keyword => validator::validate_keyword(pattern)?,
        }
        Ok(())
    }

    /// `max_patterns` comes from the billing plan and is consumed as a plain
    /// integer; enforcement of how it is derived lives elsewhere.
    pub async fn create(
        &self,
        owner: &str,
        draft: PatternDraft,
        max_patterns: usize,
    ) -> Result<Pattern, EngineError> {
        Self::validate_text(&draft.pattern, draft.pattern_type)?;

        let existing = self.store.count_for_owner(owner).await?;
        if existing >= max_patterns {
            return Err(EngineError::PatternLimit { max: max_patterns });
        }

        let now = time::now_ms();
        let pattern = Pattern {
            id: id::generate(),
            owner: owner.to_string(),
            pattern: draft.pattern,
            pattern_type: draft.pattern_type,
            description: draft.description.unwrap_or_default(),
            min_price: draft.min_price.unwrap_or(0.0),
            max_price: draft.max_price,
            tld_filter: draft.tld_filter,
            min_length: draft.min_length,
            max_length: draft.max_length,
            min_age: draft.min_age,
            max_age: draft.max_age,
            enabled: true,
            last_matched_at_ms: None,
            created_at_ms: now,
            updated_at_ms: now,
        };
        self.store.insert(&pattern).await?;
        Ok(pattern)
    }

    /// Filter edits clear the pattern's existing alerts so the next run
    /// re-evaluates everything under the new filters. Cosmetic edits leave
    /// the ledger untouched.
    pub async fn update(
        &self,
        owner: &str,
        pattern_id: &str,
        update: PatternUpdate,
    ) -> Result<Pattern, EngineError> {
        let mut pattern = self
            .store
            .get(owner, pattern_id)
            .await?
            .ok_or_else(|| EngineError::PatternNotFound(pattern_id.to_string()))?;

        if let Some(text) = &update.pattern {
            Self::validate_text(text, pattern.pattern_type)?;
        }

        let invalidates = update.touches_filters();
        update.apply_to(&mut pattern, time::now_ms());
        self.store.update(&pattern).await?;

        if invalidates {
            let cleared = self.ledger.delete_for_pattern(&pattern.id).await?;
            tracing::info!(
                pattern_id = %pattern.id,
                cleared,
                "filter edit invalidated existing alerts"
            );
        }

        Ok(pattern)
    }

    pub async fn delete(&self, owner: &str, pattern_id: &str) -> Result<bool, EngineError> {
        let deleted = self.store.delete(owner, pattern_id).await?;
        if deleted {
            self.ledger.delete_for_pattern(pattern_id).await?;
        }
        Ok(deleted)
    }

    pub async fn delete_all(&self, owner: &str) -> Result<u64, EngineError> {
        let deleted = self.store.delete_all_for_owner(owner).await?;
        self.ledger.delete_for_owner(owner).await?;
        Ok(deleted)
    }

    /// User action: forget every alert, letting everything re-surface.
    pub async fn clear_alerts(&self, owner: &str) -> Result<u64, EngineError> {
        Ok(self.ledger.delete_for_owner(owner).await?)
    }
}
