//! End-to-end tests against a real relay process-in-process: a bound axum
//! router, a real TCP "upstream" (an echo server), and a real client-side
//! `Session` driving the wire protocol the way `transport::client` does.
//!
//! Grounded on the teacher's `tests/utils/mod.rs` approach of exercising the
//! binary's real surface rather than its internals, adapted here to an
//! in-process HTTP client against a locally bound router since the relay's
//! "binary" is an HTTP/WebSocket server rather than a one-shot CLI.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use gridmask::crypto::CipherKind;
use gridmask::server::{build_router, AppState};
use gridmask::session::{Layout, Session};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const KEY: [u8; 32] = [0x5a; 32];

async fn spawn_echo_upstream() -> (String, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (mut sock, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match sock.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            if sock.write_all(&buf[..n]).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });
    (addr.ip().to_string(), addr.port())
}

async fn spawn_relay(long_poll_total: Duration, long_poll_heartbeat: Duration) -> String {
    let (upstream_host, upstream_port) = spawn_echo_upstream().await;

    let state = Arc::new(AppState::new(
        KEY,
        CipherKind::ChaCha20Poly1305,
        Layout::Ascii,
        upstream_host,
        upstream_port,
        Duration::from_secs(300),
        long_poll_total,
        long_poll_heartbeat,
        None,
    ));

    let router = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn encode_lines(frames: Vec<Vec<u8>>) -> String {
    let mut body = String::new();
    for frame in frames {
        body.push_str(&base64::engine::general_purpose::STANDARD.encode(frame));
        body.push('\n');
    }
    body
}

fn decode_lines(body: &str, session: &mut Session) -> Vec<u8> {
    let mut out = Vec::new();
    for line in body.lines().filter(|l| !l.is_empty()) {
        let masked = base64::engine::general_purpose::STANDARD.decode(line).unwrap();
        out.extend(session.feed_masked(&masked).unwrap().into_iter().flatten());
    }
    out
}

#[tokio::test]
async fn round_trip_through_upload_and_stream_echoes_the_upstream_reply() {
    let base = spawn_relay(Duration::from_secs(2), Duration::from_millis(200)).await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{base}/session")).send().await.unwrap();
    let body = resp.text().await.unwrap();
    let token = body.strip_prefix("token=").unwrap().to_string();

    let mut local_session = Session::create(KEY, CipherKind::ChaCha20Poly1305, Layout::Ascii);
    local_session.seal(b"hello upstream").unwrap();
    let upload_body = encode_lines(local_session.drain_outbound());

    let resp = client
        .post(format!("{base}/api/v1/upload?token={token}"))
        .body(upload_body)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let resp = client.get(format!("{base}/stream?token={token}")).send().await.unwrap();
    let body = resp.text().await.unwrap();
    let plaintext = decode_lines(&body, &mut local_session);
    assert_eq!(plaintext, b"hello upstream");

    client.post(format!("{base}/close?token={token}")).send().await.unwrap();
}

#[tokio::test]
async fn stream_returns_only_heartbeats_when_nothing_is_pending() {
    let base = spawn_relay(Duration::from_millis(500), Duration::from_millis(100)).await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{base}/session")).send().await.unwrap();
    let body = resp.text().await.unwrap();
    let token = body.strip_prefix("token=").unwrap().to_string();

    let started = std::time::Instant::now();
    let resp = client.get(format!("{base}/stream?token={token}")).send().await.unwrap();
    let body = resp.text().await.unwrap();
    let elapsed = started.elapsed();

    assert!(body.lines().all(|l| l.is_empty()), "expected only blank heartbeat lines, got {body:?}");
    assert!(elapsed >= Duration::from_millis(450), "long-poll returned too early: {elapsed:?}");

    client.post(format!("{base}/close?token={token}")).send().await.unwrap();
}

#[tokio::test]
async fn a_heartbeat_arrives_incrementally_well_before_the_poll_window_elapses() {
    use futures_util::StreamExt;

    // S5: a client watching the response body, not just its final buffered
    // form, must see a heartbeat within one heartbeat interval — the body
    // must be a genuine stream, not one big buffered write at the deadline.
    let base = spawn_relay(Duration::from_secs(5), Duration::from_millis(100)).await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{base}/session")).send().await.unwrap();
    let body = resp.text().await.unwrap();
    let token = body.strip_prefix("token=").unwrap().to_string();

    let started = std::time::Instant::now();
    let resp = client.get(format!("{base}/stream?token={token}")).send().await.unwrap();
    let mut chunks = resp.bytes_stream();
    let first_chunk = chunks.next().await.unwrap().unwrap();
    let elapsed = started.elapsed();

    assert_eq!(&first_chunk[..], b"\n", "first streamed chunk should be one heartbeat");
    assert!(elapsed < Duration::from_secs(1), "heartbeat took too long to arrive: {elapsed:?}");

    client.post(format!("{base}/close?token={token}")).send().await.unwrap();
}

#[tokio::test]
async fn an_unknown_token_is_rejected_on_every_endpoint() {
    let base = spawn_relay(Duration::from_secs(1), Duration::from_millis(200)).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/stream?token=deadbeef")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    let resp = client
        .post(format!("{base}/api/v1/upload?token=deadbeef"))
        .body("")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn frames_split_across_arbitrary_byte_boundaries_still_reassemble() {
    // S3: reassembly must not depend on where the transport happens to cut
    // the byte stream — check a handful of split points spanning small
    // frames and ones that straddle the 2-byte length prefix itself.
    let mut sender = Session::create(KEY, CipherKind::ChaCha20Poly1305, Layout::Ascii);

    sender.seal(b"first message").unwrap();
    sender.seal(b"second, a bit longer than the first one").unwrap();
    let framed: Vec<u8> = sender.drain_outbound().into_iter().flatten().collect();

    for split in [1usize, 2, 3, framed.len() / 2, framed.len() - 1] {
        let split = split.min(framed.len());
        let mut receiver = Session::create(KEY, CipherKind::ChaCha20Poly1305, Layout::Ascii);
        let mut out = Vec::new();
        out.extend(receiver.feed_masked(&framed[..split]).unwrap());
        out.extend(receiver.feed_masked(&framed[split..]).unwrap());
        assert_eq!(out, vec![b"first message".to_vec(), b"second, a bit longer than the first one".to_vec()]);
    }
}
