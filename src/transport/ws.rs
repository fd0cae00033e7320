//! Streaming transport (§6): each masked frame rides as one WebSocket
//! binary message instead of the poll transport's base64 text lines.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::io::AsyncWriteExt;

use crate::server::AppState;
use crate::session::Session;

pub async fn upgrade(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run(socket, state))
}

async fn run(socket: WebSocket, state: Arc<AppState>) {
    let upstream = match crate::transport::connector::connect(&state.upstream_host, state.upstream_port).await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "upstream connect failed for websocket session");
            return;
        }
    };
    let (mut upstream_read, mut upstream_write) = upstream.into_split();

    let mut session = Session::create(state.key, state.cipher, state.layout);
    let (mut ws_write, mut ws_read) = futures_util::StreamExt::split(socket);

    let (to_ws_tx, mut to_ws_rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();

    let upstream_reader = tokio::spawn(async move {
        let mut buf = [0u8; 8192];
        loop {
            match tokio::io::AsyncReadExt::read(&mut upstream_read, &mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => {
                    if to_ws_tx.send(buf[..n].to_vec()).is_err() {
                        return;
                    }
                }
            }
        }
    });

    loop {
        tokio::select! {
            upstream_chunk = to_ws_rx.recv() => {
                match upstream_chunk {
                    Some(chunk) => {
                        if session.seal(&chunk).is_err() {
                            break;
                        }
                        for masked in session.drain_outbound() {
                            if futures_util::SinkExt::send(&mut ws_write, Message::Binary(masked.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }
            ws_msg = futures_util::StreamExt::next(&mut ws_read) => {
                match ws_msg {
                    Some(Ok(Message::Binary(data))) => {
                        match session.feed_masked(&data) {
                            Ok(plaintexts) => {
                                for p in plaintexts {
                                    if upstream_write.write_all(&p).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Err(_) => break,
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    upstream_reader.abort();
    session.close();
}
