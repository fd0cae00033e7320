//! axum handlers for the five poll-transport endpoints (§4.7, §6).
//!
//! Style grounded on the enrichment daemon's JSON-RPC handlers (params in,
//! `Result` out, errors bubbling to a top-level mapper) adapted to axum's
//! extractor-based REST handlers since this transport is plain HTTP, not
//! JSON-RPC.

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::TunnelError;
use crate::server::AppState;
use crate::session::Session;

#[derive(Deserialize)]
pub struct TokenQuery {
    token: String,
}

/// `POST|GET /session` — allocate a session, connect upstream, return its token.
pub async fn session(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, TunnelError> {
    let upstream = crate::transport::connector::connect(&state.upstream_host, state.upstream_port)
        .await
        .map_err(TunnelError::UpstreamConnect)?;

    let session = Session::create(state.key, state.cipher, state.layout);
    let (token, handle) = state.registry.create(session).await;

    let (read_half, write_half) = upstream.into_split();
    state.upstream_writers.lock().await.insert(token.clone(), write_half);

    // Upstream reads are handed to an mpsc channel and sealed by a separate
    // task that awaits the session's real lock, one chunk at a time, in the
    // order they arrived — a `try_lock` here would silently drop whatever
    // chunk loses the race against a concurrent `upload`/`stream`/`fin`/
    // `close` call, and this is a live TCP stream with no resend.
    let (chunk_tx, mut chunk_rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();

    let sealer_handle = handle.clone();
    tokio::spawn(async move {
        while let Some(chunk) = chunk_rx.recv().await {
            let mut entry = sealer_handle.entry.lock().await;
            if entry.session.seal(&chunk).is_err() {
                break;
            }
            drop(entry);
            sealer_handle.waiter.wake();
        }
    });

    let handle_for_reader = handle.clone();
    let token_for_reader = token.clone();
    let registry = state.registry.clone();
    tokio::spawn(async move {
        let result = crate::transport::connector::pump_upstream_reads(read_half, |chunk| {
            let _ = chunk_tx.send(chunk.to_vec());
        })
        .await;
        handle_for_reader.waiter.wake();
        if result.is_err() {
            registry.remove(&token_for_reader).await;
        }
    });

    Ok(format!("token={token}"))
}

/// `POST /api/v1/upload?token=...` — feed masked client bytes inbound.
///
/// Canonical poll-transport body encoding (§9 open question (a)):
/// newline-separated base64 lines, matching the `stream` response shape.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TokenQuery>,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, TunnelError> {
    let handle = state.registry.get(&q.token).await.ok_or(TunnelError::UnknownToken)?;

    let body_str = std::str::from_utf8(&body).map_err(|e| TunnelError::MalformedInput(e.to_string()))?;

    let mut plaintexts = Vec::new();
    {
        let mut entry = handle.entry.lock().await;
        entry.session.touch();
        for line in body_str.lines().filter(|l| !l.is_empty()) {
            let masked = base64::engine::general_purpose::STANDARD
                .decode(line)
                .map_err(|e| TunnelError::MalformedInput(e.to_string()))?;
            plaintexts.extend(entry.session.feed_masked(&masked)?);
        }
    }

    if !plaintexts.is_empty() {
        if let Some(writer) = state.upstream_writers.lock().await.get_mut(&q.token) {
            for p in plaintexts {
                writer.write_all(&p).await.map_err(TunnelError::UpstreamIo)?;
            }
        }
    }

    Ok(axum::http::StatusCode::OK)
}

/// `GET /stream?token=...` — long-poll for outbound data (§4.7's contract).
///
/// The response body is a true stream: each heartbeat or data line is
/// written to the channel as it's produced rather than accumulated and
/// sent once the whole poll window elapses, so a client watching the
/// connection sees the heartbeat within one heartbeat interval instead of
/// only at the very end of the long-poll window.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TokenQuery>,
) -> Result<Response, TunnelError> {
    let handle = state.registry.get(&q.token).await.ok_or(TunnelError::UnknownToken)?;

    {
        let entry = handle.entry.lock().await;
        if entry.phase.is_closed() {
            return Err(TunnelError::UnknownToken);
        }
    }

    let (line_tx, line_rx) = tokio::sync::mpsc::unbounded_channel::<std::io::Result<Bytes>>();
    let long_poll_total = state.long_poll_total;
    let long_poll_heartbeat = state.long_poll_heartbeat;

    tokio::spawn(async move {
        let deadline = Instant::now() + long_poll_total;

        loop {
            let drained = {
                let mut entry = handle.entry.lock().await;
                entry.session.touch();
                if entry.phase.is_closed() {
                    return;
                }
                entry.session.drain_outbound()
            };

            if !drained.is_empty() {
                for frame in drained {
                    let mut line = base64::engine::general_purpose::STANDARD.encode(frame);
                    line.push('\n');
                    if line_tx.send(Ok(Bytes::from(line))).is_err() {
                        return;
                    }
                }
                return;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }

            let tick = remaining.min(long_poll_heartbeat);
            match tokio::time::timeout(tick, handle.waiter.wait()).await {
                Ok(()) => continue, // woken — loop back and drain
                Err(_elapsed) => {
                    if Instant::now() >= deadline {
                        return;
                    }
                    if line_tx.send(Ok(Bytes::from_static(b"\n"))).is_err() {
                        return; // heartbeat
                    }
                }
            }
        }
    });

    let body = Body::from_stream(UnboundedReceiverStream::new(line_rx));
    Ok(Response::builder().status(StatusCode::OK).body(body).unwrap())
}

/// `POST /fin?token=...` — half-close the write direction upstream.
pub async fn fin(State(state): State<Arc<AppState>>, Query(q): Query<TokenQuery>) -> Result<impl IntoResponse, TunnelError> {
    let handle = state.registry.get(&q.token).await.ok_or(TunnelError::UnknownToken)?;
    {
        let mut entry = handle.entry.lock().await;
        entry.phase.on_fin();
        entry.session.touch();
    }
    if let Some(mut writer) = state.upstream_writers.lock().await.remove(&q.token) {
        let _ = writer.shutdown().await;
    }
    Ok(axum::http::StatusCode::OK)
}

/// `POST /close?token=...` — tear down the session.
pub async fn close(State(state): State<Arc<AppState>>, Query(q): Query<TokenQuery>) -> Result<impl IntoResponse, TunnelError> {
    let handle = state.registry.remove(&q.token).await.ok_or(TunnelError::UnknownToken)?;
    {
        let mut entry = handle.entry.lock().await;
        entry.session.close();
        entry.phase.on_close();
    }
    handle.waiter.wake();
    state.upstream_writers.lock().await.remove(&q.token);
    Ok(axum::http::StatusCode::OK)
}
