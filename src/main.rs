use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use gridmask::config::{resolve_cipher, resolve_key, resolve_layout, Cli, Command, SharedArgs};
use gridmask::server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Keygen => {
            let mut key = [0u8; 32];
            rand::rng().fill_bytes(&mut key);
            println!("{}", hex::encode(key));
        }
        Command::Relay(args) => {
            setup_logging(&args.shared.log);
            run_relay(args).await?;
        }
        Command::Client(args) => {
            setup_logging(&args.shared.log);
            run_client(args).await?;
        }
    }

    Ok(())
}

fn setup_logging(level: &str) {
    tracing_subscriber::fmt().with_env_filter(level.to_owned()).compact().init();
}

fn resolve_shared(shared: &SharedArgs) -> anyhow::Result<([u8; 32], gridmask::crypto::CipherKind, gridmask::session::Layout, Option<Vec<u8>>)> {
    // The raw key material is wrapped even for its brief lifetime here so it
    // gets zeroized on drop rather than lingering in a plain `String`.
    let key_secret = SecretString::from(shared.key.clone());
    let key = resolve_key(key_secret.expose_secret()).map_err(|e| anyhow::anyhow!("{e}"))?;
    let cipher = resolve_cipher(&shared.cipher).map_err(|e| anyhow::anyhow!(e))?;
    let layout = resolve_layout(&shared.layout).map_err(|e| anyhow::anyhow!(e))?;
    let auth_key = shared.auth_key.as_ref().map(|k| k.as_bytes().to_vec());
    Ok((key, cipher, layout, auth_key))
}

async fn run_relay(args: gridmask::config::RelayArgs) -> anyhow::Result<()> {
    let (key, cipher, layout, auth_key) = resolve_shared(&args.shared)?;

    let state = Arc::new(AppState::new(
        key,
        cipher,
        layout,
        args.shared.upstream_host.clone(),
        args.shared.upstream_port,
        Duration::from_secs(args.shared.session_idle_timeout),
        Duration::from_secs(args.shared.long_poll_total),
        Duration::from_secs(args.shared.long_poll_heartbeat),
        auth_key,
    ));

    {
        let registry = state.registry.clone();
        tokio::spawn(registry.run_idle_sweep(Duration::from_secs(30)));
    }

    let router = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(addr = %args.listen, upstream = %args.shared.upstream_host, "relay listening");
    axum::serve(listener, router).await?;

    Ok(())
}

async fn run_client(args: gridmask::config::ClientArgs) -> anyhow::Result<()> {
    let (key, cipher, layout, auth_key) = resolve_shared(&args.shared)?;

    let relay_ws_url = format!(
        "{}/ws",
        args.relay_url.replacen("http://", "ws://", 1).replacen("https://", "wss://", 1)
    );

    let config = Arc::new(gridmask::transport::client::ClientConfig {
        relay_ws_url,
        local_listen: args.local_listen.clone(),
        key,
        cipher,
        layout,
        auth_key,
    });

    info!(listen = %args.local_listen, relay = %args.relay_url, "client listening");
    gridmask::transport::client::run(config).await?;

    Ok(())
}
