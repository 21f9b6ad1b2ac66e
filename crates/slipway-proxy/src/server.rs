//! Listener loops.
//!
//! One TLS listener serving all proxied traffic and one plaintext
//! listener for ACME challenges and HTTPS redirects. Both follow the
//! accept/spawn/watch-shutdown shape; a failed TLS handshake drops the
//! connection (fail closed, never plaintext).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

use slipway_certs::ChallengeStore;

use crate::handler::ProxyHandler;
use crate::redirect;

/// Serve proxied traffic over TLS until the shutdown signal.
pub async fn serve_https(
    bind_addr: SocketAddr,
    tls_config: Arc<rustls::ServerConfig>,
    handler: Arc<ProxyHandler>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .context("failed to bind TLS listener")?;
    let acceptor = TlsAcceptor::from(tls_config);

    info!(addr = %bind_addr, "TLS listener ready");

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                let (stream, peer_addr) = accept_result.context("accept failed")?;
                let acceptor = acceptor.clone();
                let handler = Arc::clone(&handler);

                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(tls_stream) => tls_stream,
                        Err(e) => {
                            debug!(%peer_addr, error = %e, "TLS handshake refused");
                            return;
                        }
                    };

                    let io = TokioIo::new(tls_stream);
                    let svc = service_fn(move |req: hyper::Request<Incoming>| {
                        let handler = Arc::clone(&handler);
                        async move {
                            Ok::<_, std::convert::Infallible>(
                                handler.handle(req, peer_addr.ip(), "https").await,
                            )
                        }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                        debug!(%peer_addr, error = %e, "connection ended with error");
                    }
                });
            }
            _ = shutdown.changed() => {
                info!("TLS listener shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Serve the plaintext listener (ACME challenges + redirects) until the
/// shutdown signal.
pub async fn serve_redirect(
    bind_addr: SocketAddr,
    challenges: ChallengeStore,
    https_port: u16,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .context("failed to bind plaintext listener")?;

    info!(addr = %bind_addr, "plaintext listener ready");

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                let (stream, peer_addr) = accept_result.context("accept failed")?;
                let challenges = challenges.clone();

                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let svc = service_fn(move |req: hyper::Request<Incoming>| {
                        let challenges = challenges.clone();
                        async move {
                            Ok::<_, std::convert::Infallible>(redirect::handle_plain(
                                &req,
                                &challenges,
                                https_port,
                            ))
                        }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                        error!(%peer_addr, error = %e, "plaintext connection error");
                    }
                });
            }
            _ = shutdown.changed() => {
                info!("plaintext listener shutting down");
                break;
            }
        }
    }

    Ok(())
}
