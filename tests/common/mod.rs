#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::get;
use eatpic_client::{ClientConfig, InMemorySecretStore, NetworkService, Session};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Barrier;

/// Scripted stand-in for the EatPic API.
pub struct MockApi {
    /// Bearer token `/api/feed` accepts; `None` rejects everything.
    pub accepted_token: Mutex<Option<String>>,
    pub refresh_response: Value,
    pub refresh_status: StatusCode,
    pub refresh_delay: Duration,
    pub feed_status_when_unauthorized: StatusCode,
    /// Holds the first N unauthorized responses until all N requests arrived.
    pub unauthorized_barrier: Option<(usize, Barrier)>,
    pub refresh_calls: AtomicUsize,
    pub feed_calls: AtomicUsize,
    pub unauthorized_hits: AtomicUsize,
    pub refresh_headers: Mutex<Vec<Option<String>>>,
    pub feed_bearers: Mutex<Vec<Option<String>>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            accepted_token: Mutex::new(Some("fresh".into())),
            refresh_response: refresh_success("fresh", "r2"),
            refresh_status: StatusCode::OK,
            refresh_delay: Duration::ZERO,
            feed_status_when_unauthorized: StatusCode::UNAUTHORIZED,
            unauthorized_barrier: None,
            refresh_calls: AtomicUsize::new(0),
            feed_calls: AtomicUsize::new(0),
            unauthorized_hits: AtomicUsize::new(0),
            refresh_headers: Mutex::new(Vec::new()),
            feed_bearers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_refresh_response(mut self, response: Value) -> Self {
        self.refresh_response = response;
        self
    }

    pub fn with_refresh_status(mut self, status: StatusCode) -> Self {
        self.refresh_status = status;
        self
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn with_accepted_token(self, token: Option<&str>) -> Self {
        *self.accepted_token.lock() = token.map(str::to_owned);
        self
    }

    pub fn with_unauthorized_status(mut self, status: StatusCode) -> Self {
        self.feed_status_when_unauthorized = status;
        self
    }

    pub fn with_unauthorized_barrier(mut self, parties: usize) -> Self {
        self.unauthorized_barrier = Some((parties, Barrier::new(parties)));
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn feed_calls(&self) -> usize {
        self.feed_calls.load(Ordering::SeqCst)
    }
}

pub fn refresh_success(access: &str, refresh: &str) -> Value {
    json!({
        "isSuccess": true,
        "code": "COMMON200",
        "message": "ok",
        "result": { "accessToken": access, "refreshToken": refresh }
    })
}

pub fn refresh_rejected() -> Value {
    json!({
        "isSuccess": false,
        "code": "AUTH4001",
        "message": "refresh token expired",
        "result": null
    })
}

async fn refresh(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    api.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let header = headers
        .get("Refresh-Token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    api.refresh_headers.lock().push(header);

    tokio::time::sleep(api.refresh_delay).await;
    (api.refresh_status, Json(api.refresh_response.clone()))
}

async fn feed(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    api.feed_calls.fetch_add(1, Ordering::SeqCst);
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned);
    api.feed_bearers.lock().push(bearer.clone());

    let accepted = api.accepted_token.lock().clone();
    if accepted.is_some() && bearer == accepted {
        return (
            StatusCode::OK,
            Json(json!({
                "isSuccess": true,
                "code": "COMMON200",
                "message": "ok",
                "result": { "items": [] }
            })),
        );
    }

    let hit = api.unauthorized_hits.fetch_add(1, Ordering::SeqCst);
    if let Some((parties, barrier)) = &api.unauthorized_barrier {
        if hit < *parties {
            barrier.wait().await;
        }
    }
    (
        api.feed_status_when_unauthorized,
        Json(json!({ "isSuccess": false, "code": "AUTH401", "message": "unauthorized" })),
    )
}

/// Serves `api` plus `extra` routes on an ephemeral port.
pub async fn spawn_server(api: Arc<MockApi>, extra: Router) -> SocketAddr {
    let app = Router::new()
        .route("/api/auth/reissue", get(refresh))
        .route("/api/feed", get(feed))
        .with_state(api)
        .merge(extra);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub fn config_for(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(format!("http://{addr}").parse().unwrap())
}

pub fn service_with_session(config: ClientConfig, session: Option<Session>) -> NetworkService {
    let service = NetworkService::new(config, Arc::new(InMemorySecretStore::new())).unwrap();
    if let Some(session) = session {
        assert!(service.sign_in(&session));
    }
    service
}
