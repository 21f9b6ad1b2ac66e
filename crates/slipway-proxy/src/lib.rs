//! slipway-proxy — the TLS-terminating, host-routed reverse proxy.
//!
//! Every inbound request resolves its `Host` against the route table and
//! is forwarded to the single live backend for that host. Responses are
//! relayed frame by frame so streaming backends (SSE, chunked transfer)
//! reach the client while they are still being produced; trailers are
//! copied after the body completes. The plaintext listener answers ACME
//! HTTP-01 challenges and redirects everything else to HTTPS.

pub mod compress;
pub mod etag;
pub mod handler;
pub mod redirect;
pub mod relay;
pub mod server;

pub use handler::{ProxyHandler, ProxyOptions};
pub use relay::{BoxError, ProxyBody};
pub use server::{serve_https, serve_redirect};
