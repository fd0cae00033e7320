//! HMAC request authenticator (§1: external collaborator). Grounded on the
//! teacher-adjacent daemon's Bearer-token `require_api_auth` middleware,
//! generalized from a static-token compare to an HMAC-SHA256 signature
//! over the request path so a passive observer of one request can't
//! replay it against a different endpoint.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

use crate::server::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Returns a lowercase-hex HMAC-SHA256 of `path` under `key`.
pub fn sign(key: &[u8], path: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(path.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn verify(key: &[u8], path: &str, candidate: &str) -> bool {
    let expected = sign(key, path);
    // Constant-time-ish: both sides are short hex strings of equal length,
    // so this mirrors the OR-accumulated compare used for the AEAD tag.
    expected.len() == candidate.len()
        && expected.bytes().zip(candidate.bytes()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

pub async fn require_signed_request(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let Some(auth_key) = state.auth_key.as_ref() else {
        return next.run(req).await;
    };

    let path = req.uri().path().to_owned();
    let signature = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match signature {
        Some(sig) if verify(auth_key, &path, sig) => next.run(req).await,
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}
