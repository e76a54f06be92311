//! Forwarding transport: the innermost pipeline stage.
//!
//! # Data Flow
//! ```text
//! prepared ProxyRequest
//!     → scheme http/https → remote.rs (one-shot client, streamed body)
//!     → anything else     → local.rs (traversal check, file open)
//!     → ProxyResponse (code, raw header lines, body stream)
//! ```
//!
//! # Outcomes
//! - `0`: origin unreachable, headers empty (recoverable miss)
//! - `299`: origin answered with an unparsable status line
//! - `403`: `..` in the target path, rejected before any I/O
//! - `404`: local file missing or unreadable
//! - anything else: the origin's own status

pub mod local;
pub mod remote;

use std::time::Instant;

use futures_util::future::BoxFuture;

use crate::http::request::ProxyRequest;
use crate::http::response::ProxyResponse;
use crate::observability::metrics;
use crate::pipeline::{Filter, Next};

pub use remote::parse_status_line;

/// Performs the actual forward. Installed as the pipeline's terminal stage.
#[derive(Debug, Clone, Default)]
pub struct ForwardTransport {
    /// Append a `ProxyUrl` header naming the forwarded target.
    pub debug: bool,
}

impl ForwardTransport {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// Forward `req`, filling `resp`.
    pub async fn send(&self, req: &ProxyRequest, resp: &mut ProxyResponse) {
        let start = Instant::now();
        let uri = req.uri();

        if uri.is_remote() {
            if local::has_traversal_segment(uri.path()) {
                tracing::warn!(url = %uri, "Rejected path traversal");
                resp.set_code(403);
            } else {
                remote::fetch(req, resp).await;
            }
        } else {
            local::open(uri.path(), resp).await;
        }

        if self.debug {
            resp.add_header(format!("ProxyUrl: {}", uri.full_url()));
        }
        metrics::record_forward(resp.code(), start);
    }
}

impl Filter for ForwardTransport {
    fn call<'a>(
        &'a self,
        req: &'a mut ProxyRequest,
        resp: &'a mut ProxyResponse,
        _next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move { self.send(req, resp).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::uri::RequestUri;

    #[tokio::test]
    async fn test_remote_traversal_rejected() {
        let transport = ForwardTransport::default();
        let req = ProxyRequest::get("http://127.0.0.1:9/api/../admin");
        let mut resp = ProxyResponse::new();
        transport.send(&req, &mut resp).await;
        assert_eq!(resp.code(), 403);
    }

    #[tokio::test]
    async fn test_local_traversal_rejected() {
        let transport = ForwardTransport::default();
        let req = ProxyRequest::new("GET", RequestUri::from_local_file("/srv/../../etc/passwd"));
        let mut resp = ProxyResponse::new();
        transport.send(&req, &mut resp).await;
        assert_eq!(resp.code(), 403);
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_miss() {
        let transport = ForwardTransport::new(true);
        let req = ProxyRequest::get("http://127.0.0.1:1/nothing");
        let mut resp = ProxyResponse::new();
        transport.send(&req, &mut resp).await;
        assert!(resp.is_miss());
        assert_eq!(resp.headers(), &["ProxyUrl: http://127.0.0.1:1/nothing"]);
    }
}
