// Core modules
pub mod api;
pub mod config;
pub mod execution;
pub mod models;
pub mod webhook;

// Re-export commonly used types
pub use api::{BitmexClient, Credentials, Exchange, ExchangeError, ExchangeResult};
pub use crate::config::Settings;
pub use execution::{ExecutionError, Executor, RolloverReport};
pub use models::*;
