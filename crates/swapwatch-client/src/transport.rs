//! HTTP transport abstraction for upstream requests.
//!
//! The client signs and classifies; the transport only moves bytes. This
//! keeps the retry and classification logic testable with [`MockTransport`].

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::trace;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Header carrying the API key.
pub const HEADER_API_KEY: &str = "X-API-KEY";
/// Header carrying the body signature.
pub const HEADER_API_SIGN: &str = "X-API-SIGN";
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=UTF-8";

/// Outgoing signed POST request.
#[derive(Clone)]
pub struct TransportRequest {
    pub url: String,
    pub api_key: String,
    pub signature: String,
    /// Exact bytes that were signed.
    pub body: String,
}

impl fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Body carries the order token, api_key is a credential.
        f.debug_struct("TransportRequest")
            .field("url", &self.url)
            .field("body_len", &self.body.len())
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// Canonical reason phrase, e.g. "Bad Gateway".
    pub reason: String,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown")
            .to_string();
        Self {
            status,
            reason,
            body: body.into(),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[inline]
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Transport-level failure (no HTTP response).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, reset, DNS failure.
    Network(String),
    /// Client-side timeout inside the transport.
    Timeout,
}

/// Trait for sending signed requests upstream.
pub trait Transport: Send + Sync {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportResponse, TransportError>>;
}

/// Arc wrapper for Transport trait objects.
pub type DynTransport = Arc<dyn Transport>;

// ============================================================================
// ReqwestTransport
// ============================================================================

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        Box::pin(async move {
            trace!(url = %request.url, body_len = request.body.len(), "POST upstream");

            let response = self
                .client
                .post(&request.url)
                .header(HEADER_API_KEY, &request.api_key)
                .header(HEADER_API_SIGN, &request.signature)
                .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_JSON)
                .header(reqwest::header::ACCEPT, "application/json")
                .body(request.body)
                .send()
                .await
                .map_err(map_reqwest_error)?;

            let status = response.status();
            let body = response.text().await.map_err(map_reqwest_error)?;

            Ok(TransportResponse {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body,
            })
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}

// ============================================================================
// MockTransport
// ============================================================================

/// Scripted reply for [`MockTransport`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(TransportResponse),
    Fail(TransportError),
    /// Never completes; exercises the per-call timeout.
    Hang,
}

impl MockReply {
    /// 200 response with a success envelope around `data`.
    pub fn order(data: serde_json::Value) -> Self {
        let body = serde_json::json!({"code": 0, "msg": "OK", "data": data});
        Self::Respond(TransportResponse::new(200, body.to_string()))
    }

    /// 200 response with an application error envelope.
    pub fn application_error(code: i64, msg: &str) -> Self {
        let body = serde_json::json!({"code": code, "msg": msg});
        Self::Respond(TransportResponse::new(200, body.to_string()))
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::Respond(TransportResponse::new(status, body))
    }
}

/// Mock transport for testing.
///
/// Replies are consumed in order; once the script is empty the fallback
/// reply (if any) is repeated, otherwise a network error is returned.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: parking_lot::Mutex<VecDeque<MockReply>>,
    fallback: parking_lot::Mutex<Option<MockReply>>,
    /// Recorded requests for verification.
    requests: parking_lot::Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock with a reply script.
    pub fn with_script(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let mock = Self::new();
        mock.script.lock().extend(replies);
        mock
    }

    /// Queue another reply.
    pub fn push(&self, reply: MockReply) {
        self.script.lock().push_back(reply);
    }

    /// Reply used once the script runs out.
    pub fn set_fallback(&self, reply: MockReply) {
        *self.fallback.lock() = Some(reply);
    }

    /// Get recorded requests.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next_reply(&self) -> MockReply {
        if let Some(reply) = self.script.lock().pop_front() {
            return reply;
        }
        self.fallback
            .lock()
            .clone()
            .unwrap_or_else(|| MockReply::Fail(TransportError::Network("mock script exhausted".into())))
    }
}

impl Transport for MockTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        Box::pin(async move {
            self.requests.lock().push(request);
            match self.next_reply() {
                MockReply::Respond(response) => Ok(response),
                MockReply::Fail(error) => Err(error),
                MockReply::Hang => std::future::pending().await,
            }
        })
    }
}
