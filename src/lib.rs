pub mod api;
pub mod chain;
pub mod config;
pub mod engine;
pub mod providers;
pub mod storage;
pub mod types;
pub mod verification;

pub use config::Config;
pub use types::*;
