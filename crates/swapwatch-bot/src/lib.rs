//! swapwatch command-line application.
//!
//! Watches exchange orders until they finish, records completions and runs
//! the signed relay:
//! - Configuration loading (TOML + env secrets)
//! - Polling sessions with event logging
//! - Price quotes seeding the rate baseline
//! - Completion record listing

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, QuoteReport, WatchOptions, WatchSummary};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
