//! Client half of the streaming transport: accepts local application
//! connections (optionally via the SOCKS5 adapter) and bridges each one
//! through its own WebSocket session to the relay.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

use crate::crypto::CipherKind;
use crate::session::{Layout, Session};

pub struct ClientConfig {
    pub relay_ws_url: String,
    pub local_listen: String,
    pub key: [u8; 32],
    pub cipher: CipherKind,
    pub layout: Layout,
    pub auth_key: Option<Vec<u8>>,
}

pub async fn run(config: Arc<ClientConfig>) -> std::io::Result<()> {
    let listener = TcpListener::bind(&config.local_listen).await?;
    tracing::info!(addr = %config.local_listen, "client listening for local connections");

    loop {
        let (local_stream, peer) = listener.accept().await?;
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(local_stream, &config).await {
                tracing::warn!(%peer, error = %e, "client connection ended with an error");
            }
        });
    }
}

async fn handle_connection(mut local_stream: TcpStream, config: &ClientConfig) -> anyhow::Result<()> {
    // The SOCKS5 handshake is accepted for front-end compatibility, but the
    // destination is whatever the relay's own upstream config points at —
    // this tunnel always terminates at one fixed upstream endpoint.
    let _ = crate::socks5::handshake(&mut local_stream).await;

    let mut request = config.relay_ws_url.clone().into_client_request()?;
    if let Some(auth_key) = &config.auth_key {
        let signature = crate::auth::sign(auth_key, "/ws");
        request
            .headers_mut()
            .insert("Authorization", format!("Bearer {signature}").parse()?);
    }

    let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut session = Session::create(config.key, config.cipher, config.layout);

    let (mut local_read, mut local_write) = local_stream.into_split();
    let (to_ws_tx, mut to_ws_rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();

    let reader = tokio::spawn(async move {
        let mut buf = [0u8; 8192];
        loop {
            match local_read.read(&mut buf).await {
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
            chunk = to_ws_rx.recv() => {
                match chunk {
                    Some(chunk) => {
                        if session.seal(&chunk).is_err() {
                            break;
                        }
                        for masked in session.drain_outbound() {
                            if ws_write.send(Message::Binary(masked.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }
            msg = ws_read.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        match session.feed_masked(&data) {
                            Ok(plaintexts) => {
                                for p in plaintexts {
                                    if local_write.write_all(&p).await.is_err() {
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

    reader.abort();
    session.close();
    Ok(())
}
