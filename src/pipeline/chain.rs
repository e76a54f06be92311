//! Pipeline assembly and execution.

use std::sync::Arc;

use crate::error::{ProxyError, ProxyResult};
use crate::http::request::{InboundSnapshot, ProxyRequest, TransportOptions};
use crate::http::response::ProxyResponse;
use crate::pipeline::filter::{Filter, Next};
use crate::transport::ForwardTransport;

/// Supplies the inbound request when `forward` is called without one.
pub trait InboundSource: Send + Sync {
    fn snapshot(&self) -> Option<InboundSnapshot>;
}

/// An ordered filter list with the forwarding transport as its innermost
/// stage.
#[derive(Clone)]
pub struct Pipeline {
    filters: Vec<Arc<dyn Filter>>,
    transport: Arc<dyn Filter>,
    source: Option<Arc<dyn InboundSource>>,
    options: TransportOptions,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            transport: Arc::new(ForwardTransport::default()),
            source: None,
            options: TransportOptions::default(),
        }
    }

    /// Append a filter. Filters run in the order they were added.
    pub fn add_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn push(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    /// Replace the innermost stage.
    pub fn with_transport(mut self, transport: impl Filter + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn InboundSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Transport options applied to requests captured from the source.
    pub fn with_options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run the filters without the transport, ending at a no-op.
    pub async fn execute(&self, req: &mut ProxyRequest, resp: &mut ProxyResponse) {
        Next::new(&self.filters, None).run(req, resp).await
    }

    /// Forward `request` (or one captured from the inbound source) through
    /// every filter and the transport, returning the completed response.
    pub async fn forward(&self, request: Option<ProxyRequest>) -> ProxyResult<ProxyResponse> {
        let mut request = match request {
            Some(request) => request,
            None => {
                let snapshot = self
                    .source
                    .as_ref()
                    .and_then(|source| source.snapshot())
                    .ok_or(ProxyError::NoRequest)?;
                ProxyRequest::from_snapshot(snapshot, self.options.clone())
            }
        };

        let mut response = ProxyResponse::new();
        tracing::debug!(
            method = %request.method(),
            url = %request.uri(),
            filters = self.filters.len(),
            "Running pipeline"
        );
        Next::new(&self.filters, Some(self.transport.as_ref()))
            .run(&mut request, &mut response)
            .await;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::filter::{filter_fn, After, Before};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(log: &Log, name: &'static str) -> impl Filter + 'static {
        let log = log.clone();
        filter_fn(move |req, resp, next| {
            let log = log.clone();
            Box::pin(async move {
                log.lock().unwrap().push(format!("{name}:in"));
                next.run(req, resp).await;
                log.lock().unwrap().push(format!("{name}:out"));
            })
        })
    }

    fn terminal(log: &Log) -> impl Filter + 'static {
        let log = log.clone();
        Before(move |_req: &mut ProxyRequest, resp: &mut ProxyResponse| {
            log.lock().unwrap().push("terminal".into());
            resp.set_code(200);
        })
    }

    #[tokio::test]
    async fn test_onion_order() {
        let log: Log = Arc::default();
        let pipeline = Pipeline::new()
            .add_filter(recording(&log, "f1"))
            .add_filter(recording(&log, "f2"))
            .add_filter(recording(&log, "f3"))
            .with_transport(terminal(&log));

        let resp = pipeline.forward(Some(ProxyRequest::get("http://a/"))).await.unwrap();
        assert_eq!(resp.code(), 200);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["f1:in", "f2:in", "f3:in", "terminal", "f3:out", "f2:out", "f1:out"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest() {
        let log: Log = Arc::default();
        let stop = filter_fn(|_req, resp, _next| {
            Box::pin(async move {
                resp.set_code(403);
            })
        });
        let pipeline = Pipeline::new()
            .add_filter(recording(&log, "f1"))
            .add_filter(stop)
            .add_filter(recording(&log, "f3"))
            .with_transport(terminal(&log));

        let resp = pipeline.forward(Some(ProxyRequest::get("http://a/"))).await.unwrap();
        assert_eq!(resp.code(), 403);
        assert_eq!(*log.lock().unwrap(), vec!["f1:in", "f1:out"]);
    }

    #[tokio::test]
    async fn test_pipeline_is_reusable() {
        let log: Log = Arc::default();
        let pipeline = Pipeline::new()
            .add_filter(After(|_req: &mut ProxyRequest, resp: &mut ProxyResponse| {
                resp.add_header("X-Seen: 1");
            }))
            .with_transport(terminal(&log));

        for _ in 0..2 {
            let resp = pipeline.forward(Some(ProxyRequest::get("http://a/"))).await.unwrap();
            assert_eq!(resp.headers(), &["X-Seen: 1"]);
        }
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_forward_without_request_or_source() {
        let err = Pipeline::new().forward(None).await.unwrap_err();
        assert!(matches!(err, ProxyError::NoRequest));
    }

    struct FixedSource;

    impl InboundSource for FixedSource {
        fn snapshot(&self) -> Option<InboundSnapshot> {
            Some(InboundSnapshot {
                method: Some("delete".into()),
                target: "/items/7".into(),
                host: Some("front.local".into()),
                ..InboundSnapshot::default()
            })
        }
    }

    #[tokio::test]
    async fn test_forward_captures_from_source() {
        let seen: Arc<Mutex<Option<String>>> = Arc::default();
        let seen_in = seen.clone();
        let pipeline = Pipeline::new()
            .with_source(Arc::new(FixedSource))
            .with_transport(Before(move |req: &mut ProxyRequest, _resp: &mut ProxyResponse| {
                *seen_in.lock().unwrap() = Some(format!("{} {}", req.method(), req.uri()));
            }));

        pipeline.forward(None).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("DELETE http://front.local/items/7"));
    }

    #[tokio::test]
    async fn test_execute_has_no_transport() {
        let log: Log = Arc::default();
        let pipeline = Pipeline::new()
            .add_filter(recording(&log, "only"))
            .with_transport(terminal(&log));
        let mut req = ProxyRequest::get("http://a/");
        let mut resp = ProxyResponse::new();
        pipeline.execute(&mut req, &mut resp).await;
        assert_eq!(*log.lock().unwrap(), vec!["only:in", "only:out"]);
        assert!(resp.is_miss());
    }
}
