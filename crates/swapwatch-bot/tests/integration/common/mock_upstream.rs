//! Mock upstream exchange API for integration tests.
//!
//! Serves `POST /api/v2/{endpoint}` on an ephemeral port and:
//! - Replies from a script, then repeats a fallback
//! - Records each request's endpoint, API key, signature and body

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

/// Request as seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub signature: Option<String>,
    pub body: String,
}

#[derive(Default)]
struct MockState {
    script: Mutex<VecDeque<(u16, Value)>>,
    fallback: Mutex<Option<(u16, Value)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// A mock upstream server for testing.
pub struct MockUpstream {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockUpstream {
    /// Start a server on an available port with a reply script.
    pub async fn start(script: Vec<(u16, Value)>) -> Self {
        let state = Arc::new(MockState::default());
        state.script.lock().await.extend(script);

        let app = Router::new()
            .route("/api/v2/{endpoint}", post(handle_request))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL to configure the client with.
    pub fn base_url(&self) -> String {
        format!("http://{}/api/v2", self.addr)
    }

    /// Reply repeated once the script is exhausted.
    pub async fn set_fallback(&self, status: u16, body: Value) {
        *self.state.fallback.lock().await = Some((status, body));
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.state.requests.lock().await.len()
    }

    /// Shutdown the server.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// 200 reply with a success envelope for an order in `status`.
pub fn order_reply(status: &str) -> (u16, Value) {
    (
        200,
        json!({
            "code": 0,
            "msg": "OK",
            "data": {
                "id": "X1",
                "type": "float",
                "status": status,
                "time": {"reg": 1_700_000_000, "expiration": 1_700_001_800},
                "from": {"code": "BTC", "amount": "0.1", "address": "bc1qdeposit"},
                "to": {"code": "ETH", "amount": "1.6", "address": "0xdest"}
            }
        }),
    )
}

/// 200 reply with a price quote sending `send` BTC for `receive` ETH.
pub fn price_reply(send: &str, receive: &str) -> (u16, Value) {
    (
        200,
        json!({
            "code": 0,
            "msg": "OK",
            "data": {
                "from": {"code": "BTC", "amount": send},
                "to": {"code": "ETH", "amount": receive},
                "errors": []
            }
        }),
    )
}

async fn handle_request(
    State(state): State<Arc<MockState>>,
    Path(endpoint): Path<String>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.requests.lock().await.push(RecordedRequest {
        endpoint,
        api_key: header("x-api-key"),
        signature: header("x-api-sign"),
        body,
    });

    let next = state.script.lock().await.pop_front();
    let reply = match next {
        Some(reply) => Some(reply),
        None => state.fallback.lock().await.clone(),
    };
    match reply {
        Some((status, body)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body.to_string(),
        ),
        None => (StatusCode::SERVICE_UNAVAILABLE, "script exhausted".to_string()),
    }
}
