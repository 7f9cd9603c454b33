pub mod health;
pub mod metrics;
pub mod server;

pub use server::{router, serve};
