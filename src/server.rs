//! Router assembly and shared application state (§1: external
//! collaborator "HTTP/WebSocket routing layer"). Grounded on the
//! enrichment daemon's `AppContext` + axum `Router::with_state` shape.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::crypto::CipherKind;
use crate::poll::registry::Registry;
use crate::session::Layout;

pub struct AppState {
    pub registry: Registry,
    pub key: [u8; 32],
    pub cipher: CipherKind,
    pub layout: Layout,
    pub upstream_host: String,
    pub upstream_port: u16,
    pub long_poll_total: Duration,
    pub long_poll_heartbeat: Duration,
    pub auth_key: Option<Vec<u8>>,
    /// Keyed by session token: the write half of each session's upstream
    /// TCP connection, so `upload`/`fin` handlers can push to it without
    /// holding the session's own lock for the duration of the write.
    pub upstream_writers: Mutex<HashMap<String, OwnedWriteHalf>>,
}

impl AppState {
    pub fn new(
        key: [u8; 32],
        cipher: CipherKind,
        layout: Layout,
        upstream_host: String,
        upstream_port: u16,
        session_idle_timeout: Duration,
        long_poll_total: Duration,
        long_poll_heartbeat: Duration,
        auth_key: Option<Vec<u8>>,
    ) -> Self {
        Self {
            registry: Registry::new(session_idle_timeout),
            key,
            cipher,
            layout,
            upstream_host,
            upstream_port,
            long_poll_total,
            long_poll_heartbeat,
            auth_key,
            upstream_writers: Mutex::new(HashMap::new()),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(crate::decoy::serve))
        .route("/session", get(crate::poll::handlers::session).post(crate::poll::handlers::session))
        .route("/stream", get(crate::poll::handlers::stream))
        .route("/api/v1/upload", post(crate::poll::handlers::upload))
        .route("/fin", post(crate::poll::handlers::fin))
        .route("/close", post(crate::poll::handlers::close))
        .route("/ws", get(crate::transport::ws::upgrade))
        .layer(axum::middleware::from_fn_with_state(state.clone(), crate::auth::require_signed_request))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
