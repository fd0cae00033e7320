//! Outbound TCP connector: dials the configured upstream host/port and
//! hands back a split `tokio::net::TcpStream` half-pair, the same shape
//! the teacher reaches for with `tokio::net` elsewhere in the pack
//! (clawde-io-apps' `connectivity` module dials out over plain TCP/mDNS).

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

pub async fn connect(host: &str, port: u16) -> std::io::Result<TcpStream> {
    TcpStream::connect((host, port)).await
}

/// Pumps bytes from `upstream` into `on_read` until EOF or error, while
/// `writes` is drained into `upstream`. Used by both transport shapes to
/// bridge the decrypted byte stream to/from the real TCP destination.
pub async fn pump_upstream_reads<F>(mut upstream: tokio::net::tcp::OwnedReadHalf, mut on_read: F) -> std::io::Result<()>
where
    F: FnMut(&[u8]) + Send,
{
    let mut buf = [0u8; 8192];
    loop {
        let n = upstream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        on_read(&buf[..n]);
    }
}
