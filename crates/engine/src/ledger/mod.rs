pub mod store;

use serde::{Deserialize, Serialize};

pub use store::{AlertLedger, MemoryAlertLedger, PgAlertLedger};

/// Default retention horizon for alert records. Advisory cleanup only; the
/// (owner, pattern_id, auction_id) uniqueness constraint, not recency, is the
/// source of truth for "already alerted".
pub const DEFAULT_RETENTION_DAYS: u32 = 8;

/// Persisted proof that a pattern already surfaced an auction to an owner.
/// Never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub owner: String,
    pub pattern_id: String,
    pub auction_id: String,
    pub domain_name: String,
    pub alerted_at_ms: i64,
}

impl AlertRecord {
    pub fn key(&self) -> (String, String, String) {
        (
            self.owner.clone(),
            self.pattern_id.clone(),
            self.auction_id.clone(),
        )
    }
}
