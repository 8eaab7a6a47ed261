//! swapwatch-gateway - Signed relay for upstream order-status requests.
//!
//! Browser-facing clients cannot hold the API secret, so they post
//! `{id, token}` here and the relay signs and forwards the request.
//!
//! ```text
//! client --POST /bridge-status--> gateway --POST /order (X-API-KEY, X-API-SIGN)--> upstream
//! ```
//!
//! Routes:
//! - `POST /bridge-status`: validate, sign, forward once, relay the envelope
//! - `GET /health`: liveness
//! - `GET /metrics`: Prometheus text exposition
//!
//! # Usage
//!
//! ```ignore
//! use swapwatch_gateway::{run_server, GatewayConfig, GatewayState};
//!
//! let state = GatewayState::new(Arc::new(client), GatewayConfig::default());
//! run_server(state, async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```

mod config;
mod error;
mod server;
mod state;
mod types;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use server::{create_router, run_server, serve};
pub use state::GatewayState;
pub use types::{BridgeStatusRequest, DebugInfo, ErrorBody};
