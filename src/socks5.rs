//! Minimal CONNECT-only, no-auth SOCKS5 front end (§1: external
//! collaborator, "standalone SOCKS5 front-end adapter"). Accepts the
//! handshake and a `CONNECT` request, then hands the caller the raw
//! stream and the requested destination — forwarding it through a tunnel
//! session is the caller's job (the `client` subcommand).

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;
const REPLY_SUCCESS: u8 = 0x00;
const REPLY_COMMAND_NOT_SUPPORTED: u8 = 0x07;
const REPLY_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    UnsupportedVersion(u8),
    NoAcceptableMethod,
    UnsupportedCommand(u8),
    UnsupportedAddressType(u8),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{e}"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported SOCKS version {v}"),
            Self::NoAcceptableMethod => write!(f, "client offered no acceptable auth method"),
            Self::UnsupportedCommand(c) => write!(f, "unsupported SOCKS command {c} (only CONNECT)"),
            Self::UnsupportedAddressType(a) => write!(f, "unsupported address type {a}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

/// Performs the SOCKS5 handshake and `CONNECT` request on `stream`,
/// replying success, and returns the parsed destination. The caller owns
/// `stream` afterward and is expected to bridge it through a session.
pub async fn handshake(stream: &mut TcpStream) -> Result<Destination, Error> {
    let mut greeting = [0u8; 2];
    stream.read_exact(&mut greeting).await?;
    let [version, nmethods] = greeting;
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let mut methods = vec![0u8; nmethods as usize];
    stream.read_exact(&mut methods).await?;
    if !methods.contains(&METHOD_NO_AUTH) {
        stream.write_all(&[VERSION, 0xFF]).await?;
        return Err(Error::NoAcceptableMethod);
    }
    stream.write_all(&[VERSION, METHOD_NO_AUTH]).await?;

    let mut request_head = [0u8; 4];
    stream.read_exact(&mut request_head).await?;
    let [req_version, cmd, _reserved, atyp] = request_head;
    if req_version != VERSION {
        return Err(Error::UnsupportedVersion(req_version));
    }
    if cmd != CMD_CONNECT {
        reply(stream, REPLY_COMMAND_NOT_SUPPORTED).await?;
        return Err(Error::UnsupportedCommand(cmd));
    }

    let host = match atyp {
        ATYP_IPV4 => {
            let mut octets = [0u8; 4];
            stream.read_exact(&mut octets).await?;
            std::net::Ipv4Addr::from(octets).to_string()
        }
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            let mut domain = vec![0u8; len[0] as usize];
            stream.read_exact(&mut domain).await?;
            String::from_utf8_lossy(&domain).into_owned()
        }
        ATYP_IPV6 => {
            let mut octets = [0u8; 16];
            stream.read_exact(&mut octets).await?;
            std::net::Ipv6Addr::from(octets).to_string()
        }
        other => {
            reply(stream, REPLY_ADDRESS_TYPE_NOT_SUPPORTED).await?;
            return Err(Error::UnsupportedAddressType(other));
        }
    };

    let mut port_bytes = [0u8; 2];
    stream.read_exact(&mut port_bytes).await?;
    let port = u16::from_be_bytes(port_bytes);

    reply(stream, REPLY_SUCCESS).await?;

    Ok(Destination { host, port })
}

async fn reply(stream: &mut TcpStream, status: u8) -> std::io::Result<()> {
    // BND.ADDR/BND.PORT are left zeroed: this adapter doesn't bind a
    // distinct relay address, it tunnels through the existing session.
    let response = [VERSION, status, 0x00, ATYP_IPV4, 0, 0, 0, 0, 0, 0];
    stream.write_all(&response).await
}
