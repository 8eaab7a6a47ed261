//! Integration tests for swapwatch-bot.
//!
//! These tests run the application against a local mock upstream:
//! - Polling sessions through to completion
//! - Fatal upstream responses
//! - Shutdown handling

pub mod common;
