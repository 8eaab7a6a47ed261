//! Signed upstream client.
//!
//! Builds a request body (order status or price quote), signs it, sends it
//! through a [`Transport`], and classifies the outcome. Transient failures are retried under the
//! configured [`RetryPolicy`]; everything else is returned immediately.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use swapwatch_core::{OrderId, OrderSnapshot, OrderToken};
use swapwatch_telemetry::Metrics;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::envelope::parse_order_response;
use crate::error::{ApiError, ApiResult};
use crate::quote::{parse_price_response, PriceQuote, QuoteRequest, PRICE_PATH};
use crate::retry::RetryPolicy;
use crate::signer::Signer;
use crate::transport::{
    BoxFuture, DynTransport, ReqwestTransport, TransportError, TransportRequest, TransportResponse,
};

/// Path of the order-status endpoint.
pub const ORDER_PATH: &str = "/order";

/// Upstream client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL, e.g. "https://ff.io/api/v2".
    pub base_url: String,
    pub api_key: Zeroizing<String>,
    /// Bound for each individual transport call.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: Zeroizing::new(api_key.into()),
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }

    /// Full URL for `path`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Order-status request body. Field order is part of the signature.
#[derive(Serialize)]
struct StatusRequest<'a> {
    id: &'a str,
    token: &'a str,
}

/// Source of fresh order snapshots.
///
/// The polling scheduler depends on this trait rather than on
/// [`UpstreamClient`] directly.
pub trait OrderStatusSource: Send + Sync {
    fn fetch_order_status<'a>(
        &'a self,
        id: &'a OrderId,
        token: &'a OrderToken,
    ) -> BoxFuture<'a, ApiResult<OrderSnapshot>>;
}

/// Arc wrapper for OrderStatusSource trait objects.
pub type DynStatusSource = Arc<dyn OrderStatusSource>;

/// Signed client for the upstream exchange API.
pub struct UpstreamClient {
    config: ClientConfig,
    signer: Arc<Signer>,
    transport: DynTransport,
}

impl UpstreamClient {
    /// Create a client with the production `reqwest` transport.
    ///
    /// # Errors
    /// `ApiError::Configuration` when the base URL or API key is empty or the
    /// HTTP client cannot be built.
    pub fn new(config: ClientConfig, signer: Arc<Signer>) -> ApiResult<Self> {
        let transport = ReqwestTransport::new(config.request_timeout)
            .map_err(|e| ApiError::Configuration(format!("{e:?}")))?;
        Self::with_transport(config, signer, Arc::new(transport))
    }

    /// Create a client over an arbitrary transport.
    pub fn with_transport(
        config: ClientConfig,
        signer: Arc<Signer>,
        transport: DynTransport,
    ) -> ApiResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(ApiError::Configuration("upstream base URL is empty".into()));
        }
        if config.api_key.trim().is_empty() {
            return Err(ApiError::Configuration("API key is empty".into()));
        }
        Ok(Self {
            config,
            signer,
            transport,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sign `body` and send it once to `path`.
    ///
    /// Returns the raw response regardless of HTTP status; only transport
    /// failures and the per-call timeout become errors. Used by the gateway
    /// relay, which forwards upstream statuses verbatim.
    pub async fn post_signed<T: Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> ApiResult<TransportResponse> {
        let signed = self.signer.sign_json(body)?;
        let request = TransportRequest {
            url: self.config.endpoint(path),
            api_key: self.config.api_key.to_string(),
            signature: signed.signature,
            body: signed.body,
        };

        let started = Instant::now();
        let timeout = self.config.request_timeout;
        let result = tokio::time::timeout(timeout, self.transport.send(request)).await;
        Metrics::upstream_latency(path, started.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(TransportError::Network(msg))) => Err(ApiError::Network(msg)),
            Ok(Err(TransportError::Timeout)) | Err(_) => Err(ApiError::Timeout(timeout)),
        }
    }

    /// Fetch and parse the current state of an order.
    ///
    /// Each attempt re-signs the body. Transient failures are retried with
    /// backoff; once the bound is hit the last error is wrapped in
    /// `ApiError::RetriesExhausted`.
    pub async fn fetch_order_status(
        &self,
        id: &OrderId,
        token: &OrderToken,
    ) -> ApiResult<OrderSnapshot> {
        let body = &StatusRequest {
            id: id.as_str(),
            token: token.expose(),
        };
        self.with_retries(ORDER_PATH, id.as_str(), || async move {
            let response = self.send_checked(ORDER_PATH, body).await?;
            parse_order_response(&response)
        })
        .await
    }

    /// Ask the upstream for a price estimate.
    ///
    /// Retried like [`fetch_order_status`](Self::fetch_order_status).
    pub async fn quote_price(&self, request: &QuoteRequest) -> ApiResult<PriceQuote> {
        request.validate()?;
        let body = &request.body();
        let subject = format!("{}->{}", request.from_currency, request.to_currency);
        self.with_retries(PRICE_PATH, &subject, || async move {
            let response = self.send_checked(PRICE_PATH, body).await?;
            parse_price_response(&response, request.order_type)
        })
        .await
    }

    async fn with_retries<T, F, Fut>(&self, path: &str, subject: &str, mut call: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let policy = self.config.retry;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(path, subject, attempt, "Sending upstream request");

            let error = match call().await {
                Ok(value) => {
                    Metrics::upstream_request("ok");
                    return Ok(value);
                }
                Err(e) => e,
            };
            Metrics::upstream_request(error.label());

            if !policy.is_retryable(&error) {
                return Err(error);
            }
            if !policy.allows_another(attempt) {
                warn!(path, subject, attempts = attempt, error = %error, "Upstream retries exhausted");
                return Err(ApiError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = policy.backoff(attempt);
            warn!(
                path,
                subject,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient upstream failure, retrying"
            );
            Metrics::upstream_retry();
            tokio::time::sleep(delay).await;
        }
    }

    /// Signed call that only accepts 2xx responses; returns the body.
    async fn send_checked<T: Serialize>(&self, path: &str, body: &T) -> ApiResult<String> {
        let response = self.post_signed(path, body).await?;

        if response.is_server_error() {
            return Err(ApiError::Server {
                status: response.status,
                body: response.body,
            });
        }
        if !response.is_success() {
            return Err(ApiError::Http {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response.body)
    }
}

impl OrderStatusSource for UpstreamClient {
    fn fetch_order_status<'a>(
        &'a self,
        id: &'a OrderId,
        token: &'a OrderToken,
    ) -> BoxFuture<'a, ApiResult<OrderSnapshot>> {
        Box::pin(UpstreamClient::fetch_order_status(self, id, token))
    }
}
