pub mod api;
pub mod config;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod matching;
pub mod metrics;
pub mod notify;
pub mod pattern;
pub mod run;
pub mod storage;
