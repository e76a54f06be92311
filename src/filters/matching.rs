//! Conditional filters driven by regular expressions.
//!
//! # Design Decisions
//! - Request-side matchers (URL, path) run before forwarding and hand the
//!   continuation to the handler, which decides whether to proceed
//! - Response-side matchers always run downstream first; the hook only
//!   runs when a header line matched
//! - Captures are passed as `Vec<Option<String>>`, index 0 being the whole
//!   match and unmatched optional groups being `None`

use futures_util::future::BoxFuture;
use regex::Regex;

use crate::error::ProxyResult;
use crate::http::request::ProxyRequest;
use crate::http::response::ProxyResponse;
use crate::pipeline::{Filter, Next};

pub type Captures = Vec<Option<String>>;

type RouteHandler = Box<
    dyn for<'a> Fn(&'a mut ProxyRequest, &'a mut ProxyResponse, Next<'a>, Captures) -> BoxFuture<'a, ()>
        + Send
        + Sync,
>;

type ResponseHook = Box<
    dyn for<'a> Fn(&'a mut ProxyRequest, &'a mut ProxyResponse, Captures) -> BoxFuture<'a, ()>
        + Send
        + Sync,
>;

fn captures(pattern: &Regex, haystack: &str) -> Option<Captures> {
    pattern.captures(haystack).map(|caps| {
        caps.iter()
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    Url,
    Path,
}

/// Runs a handler when the request URL (or path) matches.
pub struct MatchRequest {
    pattern: Regex,
    subject: Subject,
    handler: RouteHandler,
}

impl MatchRequest {
    /// Match against the full rendered URL.
    pub fn url<F>(pattern: &str, handler: F) -> ProxyResult<Self>
    where
        F: for<'a> Fn(&'a mut ProxyRequest, &'a mut ProxyResponse, Next<'a>, Captures) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            subject: Subject::Url,
            handler: Box::new(handler),
        })
    }

    /// Match against the path component only.
    pub fn path<F>(pattern: &str, handler: F) -> ProxyResult<Self>
    where
        F: for<'a> Fn(&'a mut ProxyRequest, &'a mut ProxyResponse, Next<'a>, Captures) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            subject: Subject::Path,
            handler: Box::new(handler),
        })
    }
}

impl Filter for MatchRequest {
    fn call<'a>(
        &'a self,
        req: &'a mut ProxyRequest,
        resp: &'a mut ProxyResponse,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        let haystack = match self.subject {
            Subject::Url => req.uri().full_url(),
            Subject::Path => req.uri().path(),
        };
        match captures(&self.pattern, haystack) {
            Some(caps) => (self.handler)(req, resp, next, caps),
            None => Box::pin(next.run(req, resp)),
        }
    }
}

/// Runs a hook against the first response header line matching a pattern.
pub struct MatchResponseHeader {
    pattern: Regex,
    remove_match: bool,
    hook: ResponseHook,
}

impl MatchResponseHeader {
    pub fn new<F>(pattern: &str, remove_match: bool, hook: F) -> ProxyResult<Self>
    where
        F: for<'a> Fn(&'a mut ProxyRequest, &'a mut ProxyResponse, Captures) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        Ok(Self::from_regex(Regex::new(pattern)?, remove_match, hook))
    }

    /// Match the `Content-Type` line containing `content_type`, ignoring
    /// case. The matched line is kept.
    pub fn content_type<F>(content_type: &str, hook: F) -> ProxyResult<Self>
    where
        F: for<'a> Fn(&'a mut ProxyRequest, &'a mut ProxyResponse, Captures) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        let pattern = format!(r"(?i)^\s*Content-Type\s*:.*?{}", regex::escape(content_type));
        Ok(Self::from_regex(Regex::new(&pattern)?, false, hook))
    }

    fn from_regex<F>(pattern: Regex, remove_match: bool, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut ProxyRequest, &'a mut ProxyResponse, Captures) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        Self {
            pattern,
            remove_match,
            hook: Box::new(hook),
        }
    }
}

impl Filter for MatchResponseHeader {
    fn call<'a>(
        &'a self,
        req: &'a mut ProxyRequest,
        resp: &'a mut ProxyResponse,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            next.run(req, resp).await;

            let Some((index, caps)) = resp.find_header(&self.pattern) else {
                return;
            };
            if self.remove_match {
                resp.remove_header_at(index);
            }
            (self.hook)(req, resp, caps).await;
        })
    }
}
