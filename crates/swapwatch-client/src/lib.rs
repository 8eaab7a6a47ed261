//! Upstream exchange API client for swapwatch.
//!
//! - `Signer`: HMAC-SHA256 request signing
//! - `RetryPolicy`: bounded exponential backoff for transient failures
//! - `UpstreamClient`: signed order-status and price requests with typed errors
//! - `Transport`: pluggable HTTP layer (`ReqwestTransport`, `MockTransport`)

pub mod client;
pub mod envelope;
pub mod error;
pub mod quote;
pub mod retry;
pub mod signer;
pub mod transport;

pub use client::{ClientConfig, DynStatusSource, OrderStatusSource, UpstreamClient, ORDER_PATH};
pub use envelope::{parse_order_response, ApiEnvelope};
pub use error::{ApiError, ApiResult, ApplicationErrorKind, SignerError, SignerResult};
pub use quote::{parse_price_response, quote_drift, PriceQuote, QuoteRequest, PRICE_PATH};
pub use retry::RetryPolicy;
pub use signer::{SecretSource, SignedBody, Signer};
pub use transport::{
    BoxFuture, DynTransport, MockReply, MockTransport, ReqwestTransport, Transport,
    TransportError, TransportRequest, TransportResponse,
};
