//! Cache suppression in both directions.

use futures_util::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::http::request::ProxyRequest;
use crate::http::response::ProxyResponse;
use crate::pipeline::{Filter, Next};

static CACHE_VALIDATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(Last-Modified|ETag|Cache-Control|Expires)\s*:").expect("static pattern")
});

/// Strips conditional request headers on the way in and cache validators
/// on the way out, so neither side can serve from cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl Filter for NoCache {
    fn call<'a>(
        &'a self,
        req: &'a mut ProxyRequest,
        resp: &'a mut ProxyResponse,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            req.remove_headers(&["If-None-Match", "If-Modified-Since"]);
            req.set_header("Cache-Control", "no-cache");

            next.run(req, resp).await;

            let removed = resp.remove_headers_matching(&CACHE_VALIDATORS);
            tracing::trace!(removed, "Stripped cache headers");
        })
    }
}
