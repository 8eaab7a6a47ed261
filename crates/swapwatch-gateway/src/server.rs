//! HTTP server implementation using axum.

use std::future::Future;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use swapwatch_client::{TransportResponse, ORDER_PATH};
use swapwatch_telemetry::Metrics;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;
use crate::types::{BridgeStatusRequest, DebugInfo, RequestDetails, ResponseDetails, StatusRequest};

/// Create the axum router.
pub fn create_router(state: GatewayState) -> Router {
    Router::new()
        .route("/bridge-status", post(bridge_status))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics() -> Response {
    match Metrics::render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Relay one order-status request: validate, sign, forward once.
async fn bridge_status(State(state): State<GatewayState>, body: Bytes) -> Response {
    let request: BridgeStatusRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return error_response(GatewayError::InvalidRequest(e.to_string()), None),
    };
    let Some((id, token)) = request.credentials() else {
        return error_response(GatewayError::MissingCredentials, None);
    };

    info!(order_id = %id, "Relaying order status request");
    let upstream_body = StatusRequest { id, token };

    let mut debug_info = state.config().debug.then(|| DebugInfo {
        request_details: RequestDetails {
            url: state.client().config().endpoint(ORDER_PATH),
            method: "POST",
            order_id: id.to_string(),
            body_length: serde_json::to_vec(&upstream_body)
                .map(|b| b.len())
                .unwrap_or_default(),
        },
        response_details: None,
    });

    let response = match state.client().post_signed(ORDER_PATH, &upstream_body).await {
        Ok(response) => response,
        Err(e) => {
            warn!(order_id = %id, error = %e, "Upstream request failed");
            return error_response(GatewayError::Api(e), debug_info);
        }
    };

    if let Some(info) = debug_info.as_mut() {
        info.response_details = Some(ResponseDetails {
            status: response.status,
            status_text: response.reason.clone(),
            body_length: response.body.len(),
        });
    }

    match relay_body(response) {
        Ok(mut envelope) => {
            if let (Some(info), Value::Object(map)) = (debug_info, &mut envelope) {
                if let Ok(value) = serde_json::to_value(info) {
                    map.insert("debugInfo".to_string(), value);
                }
            }
            debug!(order_id = %id, "Upstream response relayed");
            Metrics::gateway_response(StatusCode::OK.as_u16());
            (StatusCode::OK, Json(envelope)).into_response()
        }
        Err(e) => {
            warn!(order_id = %id, error = %e, "Upstream response rejected");
            error_response(e, debug_info)
        }
    }
}

/// Upstream body as JSON, or the error to relay.
fn relay_body(response: TransportResponse) -> GatewayResult<Value> {
    if !response.is_success() {
        return Err(GatewayError::Upstream {
            status: response.status,
            reason: response.reason,
            details: response.body,
        });
    }
    serde_json::from_str(&response.body).map_err(|e| GatewayError::InvalidUpstreamBody(e.to_string()))
}

fn error_response(error: GatewayError, debug_info: Option<DebugInfo>) -> Response {
    let status = error.status_code();
    let mut body = error.body();
    body.debug_info = debug_info;
    Metrics::gateway_response(status.as_u16());
    (status, Json(body)).into_response()
}

/// Serve the relay on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> GatewayResult<()> {
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(GatewayError::Serve)
}

/// Bind the configured address and run the relay.
pub async fn run_server(
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> GatewayResult<()> {
    let addr = state.config().socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| GatewayError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!(%addr, debug = state.config().debug, "Starting gateway server");
    serve(listener, state, shutdown).await
}
