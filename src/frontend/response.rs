//! Conversion of a completed [`ProxyResponse`] into an axum response.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use futures_util::stream;

use crate::http::response::{BodyStream, ProxyResponse, ResponseBody};

/// Headers the server framing layer owns.
const HOP_BY_HOP: &[&str] = &["connection", "content-length", "transfer-encoding", "keep-alive"];

/// Split a raw header line into a typed pair. Lines that are not valid
/// HTTP headers are dropped.
fn parse_line(line: &str) -> Option<(HeaderName, HeaderValue)> {
    let (name, value) = line.split_once(':')?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).ok()?;
    let value = HeaderValue::from_str(value.trim()).ok()?;
    Some((name, value))
}

fn stream_body(source: BodyStream) -> Body {
    let chunks = stream::unfold(Some(source), |state| async move {
        let mut source = state?;
        match source.next_chunk().await {
            Ok(Some(chunk)) => Some((Ok(chunk), Some(source))),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Body stream failed mid-response");
                Some((Err(e), None))
            }
        }
    });
    Body::from_stream(chunks)
}

/// Status from the response code; a miss becomes `502`, anything axum
/// cannot represent becomes `500`.
pub fn status_of(resp: &ProxyResponse) -> StatusCode {
    let (code, _) = resp.status_line_parts();
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Convert for sending back to the client. A live stream is relayed chunk
/// by chunk and closed when the client body is dropped.
pub async fn into_http_response(mut resp: ProxyResponse) -> Response {
    let status = status_of(&resp);

    let mut builder = Response::builder().status(status);
    for line in resp.headers() {
        match parse_line(line) {
            Some((name, _)) if HOP_BY_HOP.contains(&name.as_str()) => {}
            Some((name, value)) => builder = builder.header(name, value),
            None => tracing::debug!(line = %line, "Dropped malformed header line"),
        }
    }

    let body = match resp.take_stream() {
        Some(source) => stream_body(source),
        None if matches!(resp.body_ref(), ResponseBody::Empty) => Body::empty(),
        None => Body::from(resp.body().await),
    };

    builder.body(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to assemble response");
        let mut fallback = Response::new(Body::empty());
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let (name, value) = parse_line("X-Thing:  a b ").unwrap();
        assert_eq!(name.as_str(), "x-thing");
        assert_eq!(value, "a b");
        assert!(parse_line("no colon here").is_none());
        assert!(parse_line("bad name: x").is_none());
    }

    #[tokio::test]
    async fn test_miss_becomes_bad_gateway() {
        let response = into_http_response(ProxyResponse::new()).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_headers_and_stream_relayed() {
        let mut resp = ProxyResponse::new();
        resp.set_code(201);
        resp.add_headers(["content-type: text/plain", "Connection: close", "X-A: 1"]);
        resp.set_stream(BodyStream::Reader(Box::new(std::io::Cursor::new(b"streamed".to_vec()))));

        let response = into_http_response(resp).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(response.headers()["x-a"], "1");
        assert!(response.headers().get("connection").is_none());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"streamed");
    }

    #[tokio::test]
    async fn test_materialized_body_and_proxy_miss() {
        let mut resp = ProxyResponse::new();
        resp.set_code(404);
        resp.set_reason(crate::http::response::PROXY_MISSED_REASON);
        resp.set_body("gone");

        let response = into_http_response(resp).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"gone");
    }
}
