//! Download presentation and timeouts.
//!
//! # Design Decisions
//! - Download headers are only applied when the origin answered exactly `200`
//! - The filename falls back to the last path segment, then to `download`
//! - `Content-Disposition` is encoded per client family. The agent is the
//!   inbound client's, falling back to the request's `User-Agent` as it
//!   stood before downstream filters ran

use std::time::Duration;

use futures_util::future::BoxFuture;
use url::form_urlencoded;

use crate::http::request::ProxyRequest;
use crate::http::response::ProxyResponse;
use crate::pipeline::{Filter, Next};

pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(7200);

const FALLBACK_NAME: &str = "download";

/// Strip characters that cannot appear in a filename or a header value.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '<' | '>' | '\\' | '/' | '|' | ':' | '"' | '*' | '?'))
        .collect()
}

fn percent_encode(name: &str) -> String {
    form_urlencoded::byte_serialize(name.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// `Content-Disposition` value for `name`, encoded for the client named by
/// `user_agent`.
pub fn content_disposition(name: &str, user_agent: Option<&str>) -> String {
    let ua = user_agent.unwrap_or_default().to_ascii_lowercase();
    if ua.contains("firefox") {
        format!("attachment; filename*=\"utf8''{name}\"")
    } else if ["msie", "trident", "edge"].iter().any(|family| ua.contains(family)) {
        format!("attachment; filename=\"{}\"", percent_encode(name))
    } else {
        format!("attachment; filename=\"{name}\"")
    }
}

/// Replace content headers so clients treat the body as a file named `name`.
pub fn set_download_headers(resp: &mut ProxyResponse, name: &str, user_agent: Option<&str>) {
    resp.set_header("Content-Type", "application/octet-stream");
    resp.set_header("Content-Transfer-Encoding", "binary");
    resp.set_header("Content-Disposition", &content_disposition(name, user_agent));
}

/// Marks a successful response as a file download.
#[derive(Debug, Clone)]
pub struct Download {
    file_name: Option<String>,
    timeout: Duration,
}

impl Download {
    pub fn new(file_name: Option<String>) -> Self {
        Self {
            file_name,
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn resolve_name(&self, req: &ProxyRequest) -> String {
        let raw = match self.file_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => req
                .uri()
                .path()
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string(),
        };
        let name = sanitize_file_name(&raw);
        if name.is_empty() {
            FALLBACK_NAME.to_string()
        } else {
            name
        }
    }
}

impl Filter for Download {
    fn call<'a>(
        &'a self,
        req: &'a mut ProxyRequest,
        resp: &'a mut ProxyResponse,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            req.set_timeout(self.timeout);
            let agent = req
                .client_agent()
                .or_else(|| req.header("User-Agent"))
                .map(str::to_string);
            next.run(req, resp).await;

            if resp.code() != 200 {
                return;
            }
            let name = self.resolve_name(req);
            tracing::debug!(file_name = %name, "Serving as download");
            set_download_headers(resp, &name, agent.as_deref());
        })
    }
}

/// Overrides the per-request transport timeout.
#[derive(Debug, Clone, Copy)]
pub struct SetTimeout(pub Duration);

impl Filter for SetTimeout {
    fn call<'a>(
        &'a self,
        req: &'a mut ProxyRequest,
        resp: &'a mut ProxyResponse,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            req.set_timeout(self.0);
            next.run(req, resp).await;
        })
    }
}
