pub mod record;
pub mod service;
pub mod store;
pub mod validator;

pub use record::{Pattern, PatternDraft, PatternType, PatternUpdate};
pub use service::PatternService;
pub use store::{MemoryPatternStore, PatternStore, PgPatternStore};
pub use validator::{validate, validate_keyword, RejectReason};
