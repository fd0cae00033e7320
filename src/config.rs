//! CLI configuration (clap derive, following the teacher's daemon-style
//! subcommand layout rather than jolokia's hand-rolled `cmd/cli.rs`): the
//! symmetric key, cipher/layout selection, upstream endpoint, and the
//! poll-transport timing knobs from §6's options table.

use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};

use crate::crypto::CipherKind;
use crate::session::Layout;

#[derive(Parser)]
#[command(name = "gridmask", about = "Traffic-obfuscating TCP tunnel disguised as a Sudoku research dataset.", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print a freshly generated 32-byte key as hex, suitable for `--key`.
    Keygen,
    /// Run the relay: HTTP/WebSocket front end plus the outbound TCP connector.
    Relay(RelayArgs),
    /// Run the client half against a running relay.
    Client(ClientArgs),
}

#[derive(Parser)]
pub struct RelayArgs {
    /// Address to bind the HTTP/WebSocket listener on.
    #[arg(long, env = "GRIDMASK_LISTEN", default_value = "127.0.0.1:8443")]
    pub listen: String,

    #[command(flatten)]
    pub shared: SharedArgs,
}

#[derive(Parser)]
pub struct ClientArgs {
    /// Base URL of the relay (e.g. `http://127.0.0.1:8443`).
    #[arg(long, env = "GRIDMASK_RELAY_URL")]
    pub relay_url: String,

    /// Local address the client listens on for plaintext application traffic.
    #[arg(long, env = "GRIDMASK_LOCAL_LISTEN", default_value = "127.0.0.1:1080")]
    pub local_listen: String,

    #[command(flatten)]
    pub shared: SharedArgs,
}

#[derive(Parser)]
pub struct SharedArgs {
    /// Symmetric key: 64 hex chars, or an arbitrary string hashed with SHA-256.
    #[arg(long, env = "GRIDMASK_KEY")]
    pub key: String,

    #[arg(long, env = "GRIDMASK_CIPHER", default_value = "chacha20-poly1305")]
    pub cipher: String,

    #[arg(long, env = "GRIDMASK_LAYOUT", default_value = "ascii")]
    pub layout: String,

    /// Hostname of the TCP destination the relay connects out to.
    #[arg(long, env = "GRIDMASK_UPSTREAM_HOST")]
    pub upstream_host: String,

    #[arg(long, env = "GRIDMASK_UPSTREAM_PORT", default_value_t = 443)]
    pub upstream_port: u16,

    #[arg(long, env = "GRIDMASK_SESSION_IDLE_TIMEOUT", default_value_t = 300)]
    pub session_idle_timeout: u64,

    #[arg(long, env = "GRIDMASK_LONG_POLL_TOTAL", default_value_t = 25)]
    pub long_poll_total: u64,

    #[arg(long, env = "GRIDMASK_LONG_POLL_HEARTBEAT", default_value_t = 5)]
    pub long_poll_heartbeat: u64,

    /// HMAC key authenticating requests to the relay (separate from the
    /// tunnel's symmetric key — see `auth.rs`).
    #[arg(long, env = "GRIDMASK_AUTH_KEY")]
    pub auth_key: Option<String>,

    #[arg(long, env = "GRIDMASK_LOG", default_value = "info")]
    pub log: String,
}

#[derive(Debug)]
pub enum KeyError {
    WrongHexLength(usize),
    InvalidHex,
}

impl std::fmt::Display for KeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongHexLength(n) => write!(f, "hex key must be 64 chars, got {n}"),
            Self::InvalidHex => write!(f, "key looks like hex but failed to decode"),
        }
    }
}

impl std::error::Error for KeyError {}

/// §6: "symmetric key (hex, 64 chars → 32 bytes, or arbitrary string →
/// SHA-256 → 32 bytes)". A 64-char string of only hex digits is treated as
/// hex; anything else is hashed.
pub fn resolve_key(raw: &str) -> Result<[u8; 32], KeyError> {
    if raw.len() == 64 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        let bytes = hex::decode(raw).map_err(|_| KeyError::InvalidHex)?;
        return bytes.try_into().map_err(|v: Vec<u8>| KeyError::WrongHexLength(v.len()));
    }
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    Ok(hasher.finalize().into())
}

pub fn resolve_cipher(s: &str) -> Result<CipherKind, String> {
    CipherKind::parse(s).ok_or_else(|| format!("unknown cipher '{s}'"))
}

pub fn resolve_layout(s: &str) -> Result<Layout, String> {
    Layout::parse(s).ok_or_else(|| format!("unknown layout '{s}'"))
}
