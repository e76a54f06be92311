//! Target rewriting.
//!
//! # Responsibilities
//! - Map a local path prefix onto a remote origin (`/manager/*` → `http://app.com/api/*`)
//! - Replace the target outright
//!
//! # Design Decisions
//! - Authority parts (scheme, userinfo, host, port) always come from the
//!   origin; query and fragment stay as received
//! - A path outside the prefix is either appended whole (permissive) or
//!   rejected as a proxy miss (strict); a rejected request is left unmodified
//! - Path joins keep exactly one `/` between base and remainder

use futures_util::future::BoxFuture;

use crate::http::request::ProxyRequest;
use crate::http::response::{ProxyResponse, PROXY_MISSED_REASON};
use crate::http::uri::RequestUri;
use crate::pipeline::{Filter, Next};

/// What to do with a path that does not start with the prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissPolicy {
    /// Append the whole incoming path to the origin base path.
    AppendWholePath,
    /// Stop the pipeline with a `404 Proxy Missed`.
    Reject,
}

/// Rewrites a path prefix onto a remote origin.
#[derive(Debug, Clone)]
pub struct RelativePath {
    prefix: String,
    origin: RequestUri,
    policy: MissPolicy,
}

impl RelativePath {
    /// `hit_header` selects the permissive policy, matching the historical
    /// flag name.
    pub fn new(prefix: impl Into<String>, origin: &str, hit_header: bool) -> Self {
        Self {
            prefix: prefix.into(),
            origin: RequestUri::parse(origin),
            policy: if hit_header {
                MissPolicy::AppendWholePath
            } else {
                MissPolicy::Reject
            },
        }
    }

    pub fn with_policy(mut self, policy: MissPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn policy(&self) -> MissPolicy {
        self.policy
    }

    /// Rewrite `uri` in place. Returns `false`, leaving `uri` untouched, on a
    /// strict miss.
    pub fn rewrite(&self, uri: &mut RequestUri) -> bool {
        let base = self.origin.path();
        let target = match uri.path().strip_prefix(self.prefix.as_str()) {
            Some(rest) => join_path(base, rest),
            None => match self.policy {
                MissPolicy::AppendWholePath => join_path(base, uri.path()),
                MissPolicy::Reject => return false,
            },
        };

        uri.set_scheme(self.origin.scheme())
            .set_user(self.origin.user())
            .set_pass(self.origin.pass())
            .set_host(self.origin.host())
            .set_port(self.origin.port())
            .set_path(target);
        true
    }
}

fn join_path(base: &str, rest: &str) -> String {
    if rest.is_empty() {
        return base.to_string();
    }
    let base = base.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    format!("{base}/{rest}")
}

impl Filter for RelativePath {
    fn call<'a>(
        &'a self,
        req: &'a mut ProxyRequest,
        resp: &'a mut ProxyResponse,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if !self.rewrite(req.uri_mut()) {
                tracing::warn!(path = %req.uri().path(), prefix = %self.prefix, "Proxy missed");
                resp.set_code(404);
                resp.set_reason(PROXY_MISSED_REASON);
                return;
            }
            tracing::debug!(target = %req.uri(), "Rewrote target");
            next.run(req, resp).await;
        })
    }
}

/// Replaces the target with a fixed URL.
#[derive(Debug, Clone)]
pub struct SetUrl {
    url: String,
}

impl SetUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Filter for SetUrl {
    fn call<'a>(
        &'a self,
        req: &'a mut ProxyRequest,
        resp: &'a mut ProxyResponse,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            req.set_uri(RequestUri::parse(&self.url));
            next.run(req, resp).await;
        })
    }
}
