//! Top-level error type for the HTTP/WebSocket surface (§7). Internal
//! modules (crypto, codec, session) keep their own hand-written `Error`
//! enums; this type composes them with `thiserror` and maps each kind to
//! the transport status code the design note prescribes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("unknown or closed session token")]
    UnknownToken,

    #[error("malformed upload body: {0}")]
    MalformedInput(String),

    #[error("cryptographic failure: {0}")]
    CryptoFailure(#[from] crate::session::Error),

    #[error("upstream connect failed: {0}")]
    UpstreamConnect(#[source] std::io::Error),

    #[error("upstream I/O error: {0}")]
    UpstreamIo(#[source] std::io::Error),

    #[error("session registry exhausted")]
    ResourceExhausted,

    #[error("request authentication failed")]
    Unauthorized,
}

impl IntoResponse for TunnelError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UnknownToken => StatusCode::NOT_FOUND,
            Self::MalformedInput(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamConnect(_) => StatusCode::BAD_GATEWAY,
            Self::CryptoFailure(_) | Self::UpstreamIo(_) | Self::ResourceExhausted => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        tracing::warn!(error = %self, %status, "request failed");
        (status, self.to_string()).into_response()
    }
}
