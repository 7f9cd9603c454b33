pub mod evaluator;
pub mod prefilter;

use serde::Serialize;

pub use evaluator::{compile, evaluate, EvalReport, Matcher};
pub use prefilter::LiteralHint;

/// One matched auction, produced per run. Not persisted beyond the
/// AlertRecord the ledger derives from it.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub auction_id: String,
    pub domain_name: String,
    pub price: f64,
    pub end_time_ms: i64,
    pub pattern_id: String,
    pub pattern_description: String,
}
