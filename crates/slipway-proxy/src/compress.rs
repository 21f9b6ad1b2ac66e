//! Response compression middleware.
//!
//! Negotiates gzip/deflate from `Accept-Encoding` and compresses
//! compressible content types on the fly: each relayed data frame is
//! flushed through the encoder, so streaming responses stay streaming.
//! Orthogonal to the core handler and to the ETag decorator.

use std::io::Write;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use http::header::{
    HeaderMap, HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, VARY,
};
use http::Response;
use http_body_util::BodyExt;
use hyper::body::{Body, Frame};

use crate::relay::{BoxError, ProxyBody};

/// Negotiated response encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gzip,
    Deflate,
}

impl Encoding {
    fn header_value(self) -> HeaderValue {
        match self {
            Encoding::Gzip => HeaderValue::from_static("gzip"),
            Encoding::Deflate => HeaderValue::from_static("deflate"),
        }
    }
}

/// Pick an encoding from the client's `Accept-Encoding`, gzip preferred.
pub fn negotiate(request_headers: &HeaderMap) -> Option<Encoding> {
    let accept = request_headers.get(ACCEPT_ENCODING)?.to_str().ok()?;
    let mut deflate = false;
    for entry in accept.split(',') {
        let token = entry.split(';').next().unwrap_or("").trim();
        if token.eq_ignore_ascii_case("gzip") {
            return Some(Encoding::Gzip);
        }
        if token.eq_ignore_ascii_case("deflate") {
            deflate = true;
        }
    }
    deflate.then_some(Encoding::Deflate)
}

/// Content types worth compressing.
pub fn compressible(content_type: Option<&HeaderValue>) -> bool {
    let Some(value) = content_type.and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let mime = value.split(';').next().unwrap_or("").trim();
    mime.starts_with("text/")
        || mime == "application/json"
        || mime == "application/javascript"
        || mime == "application/xml"
        || mime == "image/svg+xml"
}

/// Wrap a response in negotiated compression when it qualifies.
pub fn apply(request_headers: &HeaderMap, response: Response<ProxyBody>) -> Response<ProxyBody> {
    let Some(encoding) = negotiate(request_headers) else {
        return response;
    };
    if response.headers().contains_key(CONTENT_ENCODING) {
        return response;
    }
    if !compressible(response.headers().get(CONTENT_TYPE)) {
        return response;
    }
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    parts.headers.insert(CONTENT_ENCODING, encoding.header_value());
    parts
        .headers
        .append(VARY, HeaderValue::from_static("accept-encoding"));

    let compressed = CompressBody::new(body, encoding).boxed();
    Response::from_parts(parts, compressed)
}

enum Encoder {
    Gzip(GzEncoder<Vec<u8>>),
    Deflate(ZlibEncoder<Vec<u8>>),
}

impl Encoder {
    fn new(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Gzip => Encoder::Gzip(GzEncoder::new(Vec::new(), Compression::default())),
            Encoding::Deflate => {
                Encoder::Deflate(ZlibEncoder::new(Vec::new(), Compression::default()))
            }
        }
    }

    /// Compress one chunk and flush what the encoder has produced so far.
    fn push(&mut self, data: &[u8]) -> Result<Bytes, BoxError> {
        match self {
            Encoder::Gzip(encoder) => {
                encoder.write_all(data)?;
                encoder.flush()?;
                Ok(std::mem::take(encoder.get_mut()).into())
            }
            Encoder::Deflate(encoder) => {
                encoder.write_all(data)?;
                encoder.flush()?;
                Ok(std::mem::take(encoder.get_mut()).into())
            }
        }
    }

    fn finish(self) -> Result<Bytes, BoxError> {
        let tail = match self {
            Encoder::Gzip(encoder) => encoder.finish()?,
            Encoder::Deflate(encoder) => encoder.finish()?,
        };
        Ok(tail.into())
    }
}

/// Body adapter compressing data frames and passing trailers through.
struct CompressBody {
    inner: Option<ProxyBody>,
    encoder: Option<Encoder>,
    trailers: Option<HeaderMap>,
}

impl CompressBody {
    fn new(inner: ProxyBody, encoding: Encoding) -> Self {
        Self {
            inner: Some(inner),
            encoder: Some(Encoder::new(encoding)),
            trailers: None,
        }
    }
}

impl Body for CompressBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        loop {
            if let Some(inner) = self.inner.as_mut() {
                match ready!(Pin::new(inner).poll_frame(cx)) {
                    Some(Ok(frame)) => match frame.into_data() {
                        Ok(data) => {
                            let encoder =
                                self.encoder.as_mut().expect("encoder outlives inner body");
                            match encoder.push(&data) {
                                Ok(chunk) if chunk.is_empty() => continue,
                                Ok(chunk) => return Poll::Ready(Some(Ok(Frame::data(chunk)))),
                                Err(e) => return Poll::Ready(Some(Err(e))),
                            }
                        }
                        Err(frame) => {
                            self.trailers = frame.into_trailers().ok();
                            self.inner = None;
                        }
                    },
                    Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                    None => self.inner = None,
                }
                continue;
            }

            if let Some(encoder) = self.encoder.take() {
                match encoder.finish() {
                    Ok(tail) if tail.is_empty() => continue,
                    Ok(tail) => return Poll::Ready(Some(Ok(Frame::data(tail)))),
                    Err(e) => return Poll::Ready(Some(Err(e))),
                }
            }

            if let Some(trailers) = self.trailers.take() {
                return Poll::Ready(Some(Ok(Frame::trailers(trailers))));
            }

            return Poll::Ready(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::full;
    use std::io::Read;

    fn request_headers(accept: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, accept.parse().unwrap());
        headers
    }

    fn text_response(body: &str) -> Response<ProxyBody> {
        Response::builder()
            .status(200)
            .header(CONTENT_TYPE, "text/plain")
            .header(CONTENT_LENGTH, body.len())
            .body(full(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: Response<ProxyBody>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[test]
    fn gzip_preferred_over_deflate() {
        assert_eq!(
            negotiate(&request_headers("deflate, gzip;q=0.8")),
            Some(Encoding::Gzip)
        );
        assert_eq!(
            negotiate(&request_headers("deflate")),
            Some(Encoding::Deflate)
        );
        assert_eq!(negotiate(&request_headers("br")), None);
        assert_eq!(negotiate(&HeaderMap::new()), None);
    }

    #[test]
    fn content_type_gating() {
        assert!(compressible(Some(
            &"text/html; charset=utf-8".parse().unwrap()
        )));
        assert!(compressible(Some(&"application/json".parse().unwrap())));
        assert!(!compressible(Some(&"image/png".parse().unwrap())));
        assert!(!compressible(Some(
            &"application/octet-stream".parse().unwrap()
        )));
        assert!(!compressible(None));
    }

    #[tokio::test]
    async fn gzip_round_trip() {
        let body = "hello hello hello hello hello";
        let response = apply(&request_headers("gzip"), text_response(body));

        assert_eq!(
            response.headers().get(CONTENT_ENCODING).unwrap(),
            HeaderValue::from_static("gzip")
        );
        assert!(response.headers().get(CONTENT_LENGTH).is_none());

        let compressed = body_bytes(response).await;
        let mut decoder = flate2::read::GzDecoder::new(compressed.as_ref());
        let mut decoded = String::new();
        decoder.read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, body);
    }

    #[tokio::test]
    async fn deflate_round_trip() {
        let body = "the quick brown fox jumps over the lazy dog";
        let response = apply(&request_headers("deflate"), text_response(body));

        let compressed = body_bytes(response).await;
        let mut decoder = flate2::read::ZlibDecoder::new(compressed.as_ref());
        let mut decoded = String::new();
        decoder.read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, body);
    }

    #[tokio::test]
    async fn incompressible_content_type_is_untouched() {
        let response = Response::builder()
            .status(200)
            .header(CONTENT_TYPE, "image/png")
            .body(full("pngbytes"))
            .unwrap();
        let response = apply(&request_headers("gzip"), response);

        assert!(response.headers().get(CONTENT_ENCODING).is_none());
        assert_eq!(body_bytes(response).await, Bytes::from_static(b"pngbytes"));
    }

    #[tokio::test]
    async fn already_encoded_response_is_untouched() {
        let mut response = text_response("content");
        response
            .headers_mut()
            .insert(CONTENT_ENCODING, HeaderValue::from_static("br"));
        let response = apply(&request_headers("gzip"), response);

        assert_eq!(
            response.headers().get(CONTENT_ENCODING).unwrap(),
            HeaderValue::from_static("br")
        );
    }

    #[tokio::test]
    async fn no_accept_encoding_is_untouched() {
        let response = apply(&HeaderMap::new(), text_response("content"));
        assert!(response.headers().get(CONTENT_ENCODING).is_none());
        assert_eq!(body_bytes(response).await, Bytes::from_static(b"content"));
    }
}
