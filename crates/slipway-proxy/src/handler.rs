//! The host-routed request handler.
//!
//! Resolves the request's host against the route table, rewrites the
//! target to the live backend, injects forwarding headers, and relays the
//! response. Unknown hosts get a fixed 404 without any backend contact;
//! backend transport errors become 502; anything else that fails before a
//! response exists becomes 500. Internal error text never reaches the
//! client.

use std::net::IpAddr;

use http::header::{HeaderValue, CONTENT_TYPE, HOST, STRICT_TRANSPORT_SECURITY};
use http::uri::Uri;
use http::{Request, Response, StatusCode};
use hyper::body::{Body, Incoming};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, error, warn};

use slipway_routes::{RouteEntry, RouteTable};

use crate::relay::{self, BoxError, ProxyBody};
use crate::{compress, etag};

/// Middleware toggles around the core handler.
#[derive(Debug, Clone, Copy)]
pub struct ProxyOptions {
    /// Negotiate gzip/deflate response compression.
    pub compress: bool,
    /// Generate ETags and answer `If-None-Match`.
    pub etag: bool,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            compress: true,
            etag: true,
        }
    }
}

/// Per-request proxy logic over a shared outbound client.
pub struct ProxyHandler<B = Incoming> {
    routes: RouteTable,
    client: Client<HttpConnector, B>,
    options: ProxyOptions,
}

impl<B> ProxyHandler<B>
where
    B: Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    pub fn new(routes: RouteTable, options: ProxyOptions) -> Self {
        Self {
            routes,
            client: Client::builder(TokioExecutor::new()).build_http(),
            options,
        }
    }

    /// Serve one request. Always produces a response; failures are
    /// mapped to status codes here.
    pub async fn handle(
        &self,
        req: Request<B>,
        peer: IpAddr,
        proto: &'static str,
    ) -> Response<ProxyBody> {
        let method = req.method().clone();
        let request_headers = req.headers().clone();

        let Some(host) = request_host(&req) else {
            return not_found();
        };
        let Some(route) = self.routes.lookup(&host) else {
            debug!(%host, "no route for host");
            return not_found();
        };

        let response = match self.forward(req, &route, peer, proto).await {
            Ok(response) => response,
            Err(ForwardError::Transport(e)) => {
                warn!(%host, backend = %route.authority(), error = %e, "backend unreachable");
                return bad_gateway();
            }
            Err(ForwardError::Internal(detail)) => {
                error!(%host, %detail, "request forwarding failed");
                return internal_error();
            }
        };

        // Decorators are orthogonal; ETag hashes the uncompressed body,
        // so it runs inside the compression wrapper.
        let response = if self.options.etag {
            etag::apply(&method, &request_headers, response).await
        } else {
            response
        };
        if self.options.compress {
            compress::apply(&request_headers, response)
        } else {
            response
        }
    }

    async fn forward(
        &self,
        req: Request<B>,
        route: &RouteEntry,
        peer: IpAddr,
        proto: &'static str,
    ) -> Result<Response<ProxyBody>, ForwardError> {
        let (mut parts, body) = req.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| "/".to_owned());
        let target = format!("http://{}{}", route.authority(), path_and_query);
        parts.uri = target
            .parse::<Uri>()
            .map_err(|e| ForwardError::Internal(format!("backend uri '{target}': {e}")))?;

        append_forwarded_for(&mut parts.headers, peer);
        parts
            .headers
            .insert("x-forwarded-proto", HeaderValue::from_static(proto));

        let outbound = Request::from_parts(parts, body);
        let response = self
            .client
            .request(outbound)
            .await
            .map_err(ForwardError::Transport)?;

        let (mut parts, body) = response.into_parts();
        parts.headers.insert(
            STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000"),
        );
        Ok(Response::from_parts(parts, relay::relay(body)))
    }
}

enum ForwardError {
    Transport(hyper_util::client::legacy::Error),
    Internal(String),
}

/// The routing host: absolute-form URI first, then the `Host` header,
/// lowercased with any port stripped.
fn request_host<B>(req: &Request<B>) -> Option<String> {
    if let Some(host) = req.uri().host() {
        return Some(host.to_ascii_lowercase());
    }
    let value = req.headers().get(HOST)?.to_str().ok()?;
    let host = if let Some(rest) = value.strip_prefix('[') {
        // Bracketed IPv6 literal.
        rest.split(']').next().unwrap_or(rest)
    } else {
        value.split(':').next().unwrap_or(value)
    };
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

fn append_forwarded_for(headers: &mut http::HeaderMap, peer: IpAddr) {
    let value = match headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {peer}"),
        None => peer.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert("x-forwarded-for", value);
    }
}

fn plaintext(status: StatusCode, body: &'static str) -> Response<ProxyBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(relay::full(body))
        .expect("static response")
}

fn not_found() -> Response<ProxyBody> {
    plaintext(
        StatusCode::NOT_FOUND,
        "no application configured for this host\n",
    )
}

fn bad_gateway() -> Response<ProxyBody> {
    plaintext(StatusCode::BAD_GATEWAY, "backend unavailable\n")
}

fn internal_error() -> Response<ProxyBody> {
    plaintext(StatusCode::INTERNAL_SERVER_ERROR, "internal error\n")
}
