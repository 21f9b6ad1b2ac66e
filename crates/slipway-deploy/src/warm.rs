//! Post-swap warmup.
//!
//! Issues a fixed number of sequential requests against the freshly
//! promoted backend and reports latency. Warmup failures are logged by
//! the caller and never roll a deploy back.

use std::time::Duration;

use anyhow::Context;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use tracing::debug;

/// Number of sequential warmup requests issued per deploy.
pub const WARM_REQUESTS: u32 = 5;

/// Latency summary over one warmup run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarmReport {
    pub requests: u32,
    pub min: Duration,
    pub max: Duration,
    pub avg: Duration,
}

/// Run `requests` sequential GETs against `authority` (`ip:port`).
pub async fn run(host: &str, authority: &str, requests: u32) -> anyhow::Result<WarmReport> {
    let mut latencies = Vec::with_capacity(requests as usize);
    for attempt in 0..requests {
        let started = tokio::time::Instant::now();
        let status = warm_request(host, authority).await?;
        let elapsed = started.elapsed();
        debug!(%host, attempt, %status, ?elapsed, "warmup request");
        latencies.push(elapsed);
    }

    let min = latencies.iter().min().copied().unwrap_or_default();
    let max = latencies.iter().max().copied().unwrap_or_default();
    let total: Duration = latencies.iter().sum();
    let avg = total / requests.max(1);

    Ok(WarmReport {
        requests,
        min,
        max,
        avg,
    })
}

async fn warm_request(host: &str, authority: &str) -> anyhow::Result<http::StatusCode> {
    let stream = tokio::net::TcpStream::connect(authority)
        .await
        .with_context(|| format!("warmup connect to {authority}"))?;
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .context("warmup handshake")?;

    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method("GET")
        .uri("/")
        .header("host", host)
        .header("user-agent", "slipway-warm/0.1")
        .body(Empty::<bytes::Bytes>::new())?;

    let response = sender.send_request(req).await.context("warmup request")?;
    let status = response.status();
    // Drain the body so the connection completes cleanly.
    let _ = response.into_body().collect().await;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::service::service_fn;

    async fn spawn_backend() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let svc = service_fn(|_req| async {
                        Ok::<_, hyper::Error>(hyper::Response::new(Full::new(
                            bytes::Bytes::from_static(b"ok"),
                        )))
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(io, svc)
                        .await;
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn warmup_reports_latency_bounds() {
        let addr = spawn_backend().await;
        let report = run("a.example.com", &addr.to_string(), 3).await.unwrap();

        assert_eq!(report.requests, 3);
        assert!(report.min <= report.avg);
        assert!(report.avg <= report.max);
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_error() {
        // Reserved-but-unused port.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(run("a.example.com", &addr.to_string(), 1).await.is_err());
    }
}
