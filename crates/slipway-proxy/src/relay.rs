//! Frame relay between backend and client.
//!
//! The backend body is pumped into a bounded channel by a task tied to
//! the request: each frame is forwarded as soon as it arrives, so the
//! client observes data while the backend is still producing it, and
//! trailer frames pass through after the data ends. The pump stops the
//! moment the body completes or the client hangs up (the channel closes),
//! leaving no per-request background work behind.

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Body, Frame};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Error type carried by relayed bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified response body type for everything the proxy serves.
pub type ProxyBody = BoxBody<Bytes, BoxError>;

/// Frames buffered between backend and client before backpressure.
const RELAY_DEPTH: usize = 16;

/// A complete in-memory body.
pub fn full(content: impl Into<Bytes>) -> ProxyBody {
    Full::new(content.into())
        .map_err(|never| match never {})
        .boxed()
}

/// An empty body.
pub fn empty() -> ProxyBody {
    full(Bytes::new())
}

/// Relay a backend body to the client frame by frame.
pub fn relay<B>(backend: B) -> ProxyBody
where
    B: Body<Data = Bytes> + Send + Unpin + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel::<Result<Frame<Bytes>, BoxError>>(RELAY_DEPTH);

    tokio::spawn(async move {
        let mut backend = backend;
        loop {
            match backend.frame().await {
                Some(Ok(frame)) => {
                    // A closed channel means the client went away; stop
                    // pulling from the backend.
                    if tx.send(Ok(frame)).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    let _ = tx.send(Err(Box::new(e))).await;
                    break;
                }
                None => break,
            }
        }
    });

    StreamBody::new(ReceiverStream::new(rx)).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    /// Body built from a scripted frame sequence.
    struct Scripted {
        frames: Vec<Frame<Bytes>>,
    }

    impl Body for Scripted {
        type Data = Bytes;
        type Error = std::convert::Infallible;

        fn poll_frame(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
            if self.frames.is_empty() {
                std::task::Poll::Ready(None)
            } else {
                std::task::Poll::Ready(Some(Ok(self.frames.remove(0))))
            }
        }
    }

    #[tokio::test]
    async fn data_and_trailers_pass_through() {
        let mut trailers = HeaderMap::new();
        trailers.insert("grpc-status", "0".parse().unwrap());
        let scripted = Scripted {
            frames: vec![
                Frame::data(Bytes::from_static(b"hello ")),
                Frame::data(Bytes::from_static(b"world")),
                Frame::trailers(trailers.clone()),
            ],
        };

        let collected = relay(scripted).collect().await.unwrap();
        assert_eq!(
            collected.trailers().map(|t| t.get("grpc-status").cloned()),
            Some(trailers.get("grpc-status").cloned())
        );
        assert_eq!(collected.to_bytes(), Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn dropping_the_client_stops_the_pump() {
        let scripted = Scripted {
            frames: (0..1000)
                .map(|_| Frame::data(Bytes::from_static(b"chunk")))
                .collect(),
        };
        let body = relay(scripted);
        // Client goes away immediately; the pump must not spin forever.
        drop(body);
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn full_body_round_trips() {
        let collected = full("payload").collect().await.unwrap();
        assert_eq!(collected.to_bytes(), Bytes::from_static(b"payload"));
    }
}
