use crate::pattern::validator::RejectReason;

/// Run-level failure taxonomy. Failures scoped to a single pattern, owner or
/// batch are absorbed inside the pipeline and never reach this type; only
/// top-level storage unavailability and caller mistakes do.
#[derive(Debug)]
pub enum EngineError {
    /// Pattern rejected by the safety validator. Reported synchronously,
    /// never stored, never retried.
    Validation(RejectReason),
    /// A whole run could not read from the inventory source.
    InventoryRead(String),
    /// Pattern or ledger storage is unavailable.
    Storage(String),
    /// Owner exceeded their externally supplied pattern limit.
    PatternLimit { max: usize },
    /// Referenced pattern does not exist or belongs to another owner.
    PatternNotFound(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(r) => write!(f, "pattern rejected: {r}"),
            Self::InventoryRead(e) => write!(f, "inventory read: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::PatternLimit { max } => write!(f, "pattern limit reached ({max})"),
            Self::PatternNotFound(id) => write!(f, "pattern not found: {id}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<RejectReason> for EngineError {
    fn from(r: RejectReason) -> Self {
        Self::Validation(r)
    }
}

impl From<crate::storage::StoreError> for EngineError {
    fn from(e: crate::storage::StoreError) -> Self {
        Self::Storage(e.to_string())
    }
}
