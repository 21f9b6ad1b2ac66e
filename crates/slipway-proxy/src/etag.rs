//! Conditional request middleware.
//!
//! Adds a strong `ETag` (body digest) to small buffered responses and
//! answers `If-None-Match` with `304 Not Modified`. Streaming responses
//! (no declared length) and large bodies are passed through untouched.
//! Orthogonal to the core handler and to the compression decorator.

use http::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_LENGTH, ETAG, IF_NONE_MATCH};
use http::{Method, Response, StatusCode};
use http_body_util::BodyExt;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::relay::{empty, full, ProxyBody};

/// Largest declared body length the middleware will buffer for hashing.
pub const MAX_BUFFERED: u64 = 64 * 1024;

/// Apply ETag generation and `If-None-Match` handling to a response.
pub async fn apply(
    method: &Method,
    request_headers: &HeaderMap,
    response: Response<ProxyBody>,
) -> Response<ProxyBody> {
    if method != Method::GET && method != Method::HEAD {
        return response;
    }
    if response.status() != StatusCode::OK {
        return response;
    }
    if response.headers().contains_key(ETAG) || response.headers().contains_key(CONTENT_ENCODING) {
        return response;
    }
    let Some(length) = declared_length(response.headers()) else {
        return response;
    };
    if length > MAX_BUFFERED {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(error = %e, "backend body failed while hashing");
            return Response::builder()
                .status(StatusCode::BAD_GATEWAY)
                .body(full("502 Bad Gateway\n"))
                .expect("static response");
        }
    };

    let digest = Sha256::digest(&bytes);
    let etag = format!("\"{}\"", hex::encode(digest));
    let etag_value = match HeaderValue::from_str(&etag) {
        Ok(value) => value,
        Err(_) => return Response::from_parts(parts, full(bytes)),
    };

    if matches(request_headers.get(IF_NONE_MATCH), &etag) {
        let mut not_modified = Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .body(empty())
            .expect("static response");
        not_modified.headers_mut().insert(ETAG, etag_value);
        return not_modified;
    }

    parts.headers.insert(ETAG, etag_value);
    Response::from_parts(parts, full(bytes))
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
}

fn matches(if_none_match: Option<&HeaderValue>, etag: &str) -> bool {
    let Some(value) = if_none_match.and_then(|v| v.to_str().ok()) else {
        return false;
    };
    value
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate == etag)
}
