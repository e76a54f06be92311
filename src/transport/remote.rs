//! Network forwarding over HTTP(S).
//!
//! # Responsibilities
//! - Build a one-shot client from the request's transport options
//! - Send method, headers and (for POST/PUT) the encoded body
//! - Copy status and header lines into the response, stream the body
//!
//! # Design Decisions
//! - No pooling: every forward builds its own client with idle pooling off
//!   and sends `Connection: close`
//! - Redirects are returned to the caller unless following is enabled
//! - TLS verification is off unless the request opts in
//! - Failure to connect leaves the response untouched (code 0); it is a
//!   miss, not an origin error
//! - An origin that was reached but answered with a response head hyper
//!   cannot parse gets [`STATUS_UNPARSABLE`]
//! - reqwest delivers header names lower-cased; lines are copied in that form

use reqwest::redirect::Policy;

use crate::http::body::EncodedBody;
use crate::http::request::{ProxyRequest, TransportOptions};
use crate::http::response::{BodyStream, ProxyResponse, STATUS_UNPARSABLE};

/// Status code from a status line such as `HTTP/1.1 200 OK`.
///
/// Anything without a numeric second token in `100..=999` yields
/// [`STATUS_UNPARSABLE`].
pub fn parse_status_line(line: Option<&str>) -> u16 {
    line.and_then(|l| l.split_whitespace().nth(1))
        .and_then(|token| token.parse::<u16>().ok())
        .filter(|code| (100..=999).contains(code))
        .unwrap_or(STATUS_UNPARSABLE)
}

pub(crate) fn build_client(options: &TransportOptions) -> reqwest::Result<reqwest::Client> {
    let redirect = if options.follow_redirects {
        Policy::limited(options.max_redirects)
    } else {
        Policy::none()
    };

    reqwest::Client::builder()
        .redirect(redirect)
        .danger_accept_invalid_certs(!options.verify_peer)
        .danger_accept_invalid_hostnames(!options.verify_peer_name)
        .connect_timeout(options.timeout)
        .read_timeout(options.timeout)
        .pool_max_idle_per_host(0)
        .http1_only()
        .build()
}

/// The origin was never reached, or never answered in time.
fn is_unreachable(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_builder() || err.is_redirect()
}

fn sends_body(method: &str) -> bool {
    matches!(method, "POST" | "PUT")
}

/// Forward `req` to its network origin.
pub async fn fetch(req: &ProxyRequest, resp: &mut ProxyResponse) {
    let url = req.uri().full_url();

    let client = match build_client(req.options()) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            return;
        }
    };

    let method = match reqwest::Method::from_bytes(req.method().as_bytes()) {
        Ok(method) => method,
        Err(e) => {
            tracing::warn!(method = %req.method(), error = %e, "Invalid request method");
            return;
        }
    };

    let encoded = if sends_body(req.method()) {
        match req.body() {
            Some(body) => match body.encode(req.header("Content-Type")).await {
                Ok(encoded) => Some(encoded),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Failed to encode request body");
                    return;
                }
            },
            None => Some(EncodedBody {
                bytes: bytes::Bytes::new(),
                content_type: None,
            }),
        }
    } else {
        None
    };

    let mut builder = client.request(method, url);
    for (name, value) in req.headers().iter() {
        if name.eq_ignore_ascii_case("Connection") || name.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        if encoded.as_ref().is_some_and(|e| e.content_type.is_some())
            && name.eq_ignore_ascii_case("Content-Type")
        {
            continue;
        }
        builder = builder.header(name, value);
    }
    builder = builder.header("Connection", "close");

    if let Some(encoded) = encoded {
        if let Some(content_type) = encoded.content_type {
            builder = builder.header("Content-Type", content_type);
        }
        builder = builder
            .header("Content-Length", encoded.bytes.len().to_string())
            .body(encoded.bytes);
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) if is_unreachable(&e) => {
            tracing::warn!(url = %url, error = %e, "Origin unreachable");
            return;
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Unparsable origin response");
            resp.set_code(STATUS_UNPARSABLE);
            return;
        }
    };

    let status_line = format!("{:?} {}", response.version(), response.status());
    resp.set_code(parse_status_line(Some(&status_line)));
    for (name, value) in response.headers() {
        resp.add_header(format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes())));
    }

    tracing::debug!(url = %url, status = resp.code(), "Origin responded");
    resp.set_stream(BodyStream::Remote(response));
}
