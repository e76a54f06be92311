//! Filter capability and the continuation handed to each filter.
//!
//! A filter receives the shared request and response plus a [`Next`] value.
//! Work done before `next.run(..).await` happens on the way in; work done
//! after it happens on the way out, once everything downstream has finished.
//! Not calling `next` ends the chain there.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::request::ProxyRequest;
use crate::http::response::ProxyResponse;

/// A middleware stage.
pub trait Filter: Send + Sync {
    fn call<'a>(
        &'a self,
        req: &'a mut ProxyRequest,
        resp: &'a mut ProxyResponse,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()>;
}

/// The remainder of the chain after the current filter.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    rest: &'a [Arc<dyn Filter>],
    terminal: Option<&'a dyn Filter>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(rest: &'a [Arc<dyn Filter>], terminal: Option<&'a dyn Filter>) -> Self {
        Self { rest, terminal }
    }

    /// A continuation that does nothing.
    pub fn noop() -> Self {
        Self {
            rest: &[],
            terminal: None,
        }
    }

    /// Run the remaining stages. The terminal stage runs after every filter.
    pub async fn run(self, req: &mut ProxyRequest, resp: &mut ProxyResponse) {
        match self.rest.split_first() {
            Some((first, rest)) => {
                first
                    .call(req, resp, Next::new(rest, self.terminal))
                    .await
            }
            None => {
                if let Some(terminal) = self.terminal {
                    terminal.call(req, resp, Next::noop()).await
                }
            }
        }
    }
}

/// A filter backed by a closure returning a boxed future.
///
/// ```ignore
/// let f = filter_fn(|req, resp, next| Box::pin(async move {
///     req.set_header("X-Trace", "1");
///     next.run(req, resp).await;
/// }));
/// ```
pub struct FilterFn<F>(F);

pub fn filter_fn<F>(f: F) -> FilterFn<F>
where
    F: for<'a> Fn(&'a mut ProxyRequest, &'a mut ProxyResponse, Next<'a>) -> BoxFuture<'a, ()>
        + Send
        + Sync,
{
    FilterFn(f)
}

impl<F> Filter for FilterFn<F>
where
    F: for<'a> Fn(&'a mut ProxyRequest, &'a mut ProxyResponse, Next<'a>) -> BoxFuture<'a, ()>
        + Send
        + Sync,
{
    fn call<'a>(
        &'a self,
        req: &'a mut ProxyRequest,
        resp: &'a mut ProxyResponse,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        (self.0)(req, resp, next)
    }
}

/// Synchronous mutation applied before the rest of the chain runs.
pub struct Before<F>(pub F);

impl<F> Filter for Before<F>
where
    F: Fn(&mut ProxyRequest, &mut ProxyResponse) + Send + Sync,
{
    fn call<'a>(
        &'a self,
        req: &'a mut ProxyRequest,
        resp: &'a mut ProxyResponse,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            (self.0)(req, resp);
            next.run(req, resp).await;
        })
    }
}

/// Synchronous mutation applied after the rest of the chain completed.
pub struct After<F>(pub F);

impl<F> Filter for After<F>
where
    F: Fn(&mut ProxyRequest, &mut ProxyResponse) + Send + Sync,
{
    fn call<'a>(
        &'a self,
        req: &'a mut ProxyRequest,
        resp: &'a mut ProxyResponse,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            next.run(req, resp).await;
            (self.0)(req, resp);
        })
    }
}
