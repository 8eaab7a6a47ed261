//! Core domain types for the swapwatch order tracker.
//!
//! This crate provides fundamental types used throughout the tracker:
//! - `OrderId`, `OrderToken`: upstream order identity and its capability credential
//! - `Amount`, `Rate`: precision-safe numeric types
//! - `OrderStatus`: internal lifecycle state machine
//! - `OrderSnapshot`: one normalized upstream observation
//! - `Order`, `Divergence`: reconciled order state and advisory mismatches

pub mod decimal;
pub mod error;
pub mod model;
pub mod order;
pub mod snapshot;
pub mod status;

pub use decimal::{Amount, Rate};
pub use error::{CoreError, Result};
pub use model::{Divergence, Order};
pub use order::{OrderId, OrderToken, OrderType};
pub use snapshot::{
    EmergencyChoice, EmergencyInfo, LegSnapshot, OrderSnapshot, OrderTimes, TxSnapshot,
};
pub use status::OrderStatus;
