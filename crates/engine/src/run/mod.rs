pub mod backfill;
pub mod check;
pub mod pipeline;
pub mod scheduler;
pub mod sweep;

pub use backfill::BackfillReport;
pub use check::{CheckOutcome, Debouncer};
pub use pipeline::{BatchPolicy, PatternRunFailure, PatternRunReport, Pipeline};
pub use scheduler::{spawn_retention_task, spawn_sweep_task, TaskHandle};
pub use sweep::SweepReport;
