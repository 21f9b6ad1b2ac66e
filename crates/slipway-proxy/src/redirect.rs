//! Plaintext listener behavior.
//!
//! The HTTP listener serves exactly two things: ACME HTTP-01 challenge
//! responses from the shared challenge store, and permanent redirects of
//! everything else to the HTTPS equivalent URL (same path and query,
//! scheme swapped, TLS port substituted, 443 omitted).

use http::header::{HeaderValue, CONTENT_TYPE, HOST, LOCATION};
use http::{Request, Response, StatusCode};

use slipway_certs::ChallengeStore;

use crate::relay::{self, ProxyBody};

/// Path prefix the ACME server validates HTTP-01 challenges under.
pub const ACME_CHALLENGE_PREFIX: &str = "/.well-known/acme-challenge/";

/// Handle one plaintext request.
pub fn handle_plain<B>(
    req: &Request<B>,
    challenges: &ChallengeStore,
    https_port: u16,
) -> Response<ProxyBody> {
    let path = req.uri().path();
    if let Some(token) = path.strip_prefix(ACME_CHALLENGE_PREFIX) {
        return match challenges.key_auth(token) {
            Some(key_auth) => Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "text/plain")
                .body(relay::full(key_auth))
                .expect("static response"),
            None => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(relay::full("unknown challenge token\n"))
                .expect("static response"),
        };
    }

    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let location = redirect_url(host, path_and_query, https_port);
    let mut response = Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .body(relay::empty())
        .expect("static response");
    if let Ok(value) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

/// The HTTPS URL a plaintext request is redirected to.
pub fn redirect_url(host_header: &str, path_and_query: &str, https_port: u16) -> String {
    // Strip any port from the incoming Host header.
    let host = if let Some(rest) = host_header.strip_prefix('[') {
        rest.split(']').next().unwrap_or(rest)
    } else {
        host_header.split(':').next().unwrap_or(host_header)
    };

    if https_port == 443 {
        format!("https://{host}{path_and_query}")
    } else {
        format!("https://{host}:{https_port}{path_and_query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};

    fn plain_request(path: &str, host: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .uri(path)
            .header(HOST, host)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[test]
    fn redirect_preserves_path_and_query() {
        assert_eq!(
            redirect_url("a.example.com:80", "/some/path?q=1", 443),
            "https://a.example.com/some/path?q=1"
        );
    }

    #[test]
    fn redirect_substitutes_nonstandard_tls_port() {
        assert_eq!(
            redirect_url("a.example.com", "/", 8443),
            "https://a.example.com:8443/"
        );
    }

    #[test]
    fn default_tls_port_is_omitted() {
        assert_eq!(redirect_url("a.example.com", "/", 443), "https://a.example.com/");
    }

    #[tokio::test]
    async fn pending_challenge_is_answered() {
        let challenges = ChallengeStore::new();
        challenges.insert("tok123", "tok123.key-auth");

        let req = plain_request(
            "/.well-known/acme-challenge/tok123",
            "a.example.com",
        );
        let response = handle_plain(&req, &challenges, 443);

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"tok123.key-auth"));
    }

    #[test]
    fn unknown_challenge_token_is_404() {
        let challenges = ChallengeStore::new();
        let req = plain_request("/.well-known/acme-challenge/nope", "a.example.com");
        let response = handle_plain(&req, &challenges, 443);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn everything_else_redirects_to_https() {
        let challenges = ChallengeStore::new();
        let req = plain_request("/dashboard?tab=2", "a.example.com:80");
        let response = handle_plain(&req, &challenges, 8443);

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers().get(LOCATION).unwrap().to_str().unwrap(),
            "https://a.example.com:8443/dashboard?tab=2"
        );
    }
}
