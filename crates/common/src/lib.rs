pub mod id;
pub mod retry;
pub mod signing;
pub mod time;
