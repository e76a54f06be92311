//! Outbound request model.
//!
//! # Responsibilities
//! - Carry method, target, normalized headers, body and transport options
//!   through the filter pipeline
//! - Build the initial request from an inbound snapshot handed over by the
//!   front controller
//!
//! # Design Decisions
//! - Nothing here reads ambient process state; the snapshot is explicit
//! - `Host` and `Connection` are dropped on capture, the transport
//!   derives both from the target
//! - Ambient timeouts are floored at ten seconds; filters may set any value

use std::time::Duration;

use bytes::Bytes;

use crate::http::body::{FormBody, RequestBody};
use crate::http::headers::HeaderMap;
use crate::http::uri::RequestUri;

/// Lowest timeout accepted from ambient configuration.
pub const MIN_AMBIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Connect and read timeout.
    pub timeout: Duration,
    /// Redirect limit when following is enabled.
    pub max_redirects: usize,
    /// Follow `Location` responses instead of returning them.
    pub follow_redirects: bool,
    /// Verify the origin certificate chain.
    pub verify_peer: bool,
    /// Verify the origin certificate name.
    pub verify_peer_name: bool,
}

impl TransportOptions {
    /// Options using an ambient timeout, floored at [`MIN_AMBIENT_TIMEOUT`].
    pub fn with_ambient_timeout(timeout: Duration) -> Self {
        Self {
            timeout: timeout.max(MIN_AMBIENT_TIMEOUT),
            ..Self::default()
        }
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: MIN_AMBIENT_TIMEOUT,
            max_redirects: 3,
            follow_redirects: false,
            verify_peer: false,
            verify_peer_name: false,
        }
    }
}

/// Raw inbound request data supplied by the front controller.
#[derive(Debug, Clone, Default)]
pub struct InboundSnapshot {
    /// Request method in any case; `GET` when absent.
    pub method: Option<String>,
    /// Request target as received (`/path?query`).
    pub target: String,
    /// `Host` header value, possibly carrying a port.
    pub host: Option<String>,
    /// Local port the request arrived on.
    pub port: Option<u16>,
    /// Header pairs with arbitrary name casing.
    pub headers: Vec<(String, String)>,
    /// Body bytes exactly as received.
    pub body: Bytes,
    /// Form fields and uploaded files, when the collaborator already parsed
    /// a multipart body.
    pub form: Option<FormBody>,
}

/// A request flowing through the pipeline.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    method: String,
    uri: RequestUri,
    headers: HeaderMap,
    body: Option<RequestBody>,
    options: TransportOptions,
    client_agent: Option<String>,
}

impl ProxyRequest {
    pub fn new(method: &str, uri: RequestUri) -> Self {
        Self {
            method: normalize_method(method),
            uri,
            headers: HeaderMap::new(),
            body: None,
            options: TransportOptions::default(),
            client_agent: None,
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new("GET", RequestUri::parse(url))
    }

    /// Build from a front-controller snapshot.
    pub fn from_snapshot(snapshot: InboundSnapshot, options: TransportOptions) -> Self {
        let method = snapshot.method.as_deref().unwrap_or("GET");
        let mut uri = RequestUri::parse(&snapshot.target);

        let scheme = if snapshot.port == Some(443) { "https" } else { "http" };
        uri.set_scheme(scheme);
        if let Some(host) = snapshot.host.as_deref() {
            let authority = RequestUri::parse(&format!("//{host}"));
            uri.set_host(authority.host());
            uri.set_port(authority.port().or(snapshot.port));
        } else {
            uri.set_port(snapshot.port);
        }

        let mut headers: HeaderMap = snapshot.headers.into_iter().collect();
        headers.remove("Host");
        headers.remove("Connection");
        let client_agent = headers.get("User-Agent").map(str::to_string);

        let content_type = headers.get("Content-Type").unwrap_or("").to_string();
        let body = match snapshot.form {
            Some(mut form) => {
                form.multipart |= content_type.to_ascii_lowercase().contains("multipart");
                Some(RequestBody::Form(form))
            }
            None if snapshot.body.is_empty() => None,
            None => Some(RequestBody::from_content(&content_type, snapshot.body)),
        };

        let mut request = Self::new(method, uri);
        request.headers = headers;
        request.body = body;
        request.options = options;
        request.client_agent = client_agent;
        request
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn set_method(&mut self, method: &str) {
        self.method = normalize_method(method);
    }

    pub fn uri(&self) -> &RequestUri {
        &self.uri
    }

    pub fn uri_mut(&mut self) -> &mut RequestUri {
        &mut self.uri
    }

    pub fn set_uri(&mut self, uri: RequestUri) {
        self.uri = uri;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    pub fn set_headers<K: AsRef<str>, V: Into<String>>(&mut self, headers: impl IntoIterator<Item = (K, V)>) {
        for (name, value) in headers {
            self.headers.set(name.as_ref(), value);
        }
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.remove(name);
    }

    pub fn remove_headers<S: AsRef<str>>(&mut self, names: &[S]) {
        self.headers.remove_many(names);
    }

    /// Drop every header not in `allowed` (plus `Accept` and `Content-Type`).
    pub fn retain_headers<S: AsRef<str>>(&mut self, allowed: &[S]) {
        self.headers.retain_only(allowed);
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub fn body_mut(&mut self) -> Option<&mut RequestBody> {
        self.body.as_mut()
    }

    pub fn set_body(&mut self, body: Option<RequestBody>) {
        self.body = body;
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut TransportOptions {
        &mut self.options
    }

    /// `User-Agent` the inbound client declared, unaffected by header filters.
    pub fn client_agent(&self) -> Option<&str> {
        self.client_agent.as_deref()
    }

    pub fn set_client_agent(&mut self, agent: Option<String>) {
        self.client_agent = agent;
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.options.timeout = timeout;
    }
}

fn normalize_method(method: &str) -> String {
    let method = method.trim();
    if method.is_empty() {
        "GET".to_string()
    } else {
        method.to_ascii_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::body::FormValue;

    fn snapshot() -> InboundSnapshot {
        InboundSnapshot {
            method: Some("post".into()),
            target: "/manager/user/query?role=admin".into(),
            host: Some("front.local:8080".into()),
            port: Some(8080),
            headers: vec![
                ("HOST".into(), "front.local:8080".into()),
                ("connection".into(), "keep-alive".into()),
                ("content_type".into(), "application/x-www-form-urlencoded".into()),
                ("user-agent".into(), "curl/8".into()),
            ],
            body: Bytes::from_static(b"a=1"),
            form: None,
        }
    }

    #[test]
    fn test_method_normalized() {
        let mut req = ProxyRequest::new("patch", RequestUri::parse("http://a/"));
        assert_eq!(req.method(), "PATCH");
        req.set_method("");
        assert_eq!(req.method(), "GET");
    }

    #[test]
    fn test_from_snapshot() {
        let req = ProxyRequest::from_snapshot(snapshot(), TransportOptions::default());
        assert_eq!(req.method(), "POST");
        assert_eq!(req.uri().full_url(), "http://front.local:8080/manager/user/query?role=admin");
        assert!(req.header("Host").is_none());
        assert!(req.header("Connection").is_none());
        assert_eq!(req.header("User-Agent"), Some("curl/8"));
        assert_eq!(req.client_agent(), Some("curl/8"));
        match req.body() {
            Some(RequestBody::Form(form)) => {
                assert_eq!(form.fields, vec![("a".to_string(), FormValue::Text("1".into()))]);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_https_on_443() {
        let snap = InboundSnapshot {
            target: "/x".into(),
            host: Some("secure.local".into()),
            port: Some(443),
            ..InboundSnapshot::default()
        };
        let req = ProxyRequest::from_snapshot(snap, TransportOptions::default());
        assert_eq!(req.method(), "GET");
        assert_eq!(req.uri().scheme(), "https");
        assert!(req.body().is_none());
    }

    #[test]
    fn test_snapshot_with_parsed_multipart() {
        let mut snap = snapshot();
        snap.headers[2].1 = "multipart/form-data; boundary=abc".into();
        snap.form = Some(FormBody::new().field("aa", "aa"));
        let req = ProxyRequest::from_snapshot(snap, TransportOptions::default());
        match req.body() {
            Some(RequestBody::Form(form)) => assert!(form.is_multipart()),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_ambient_timeout_floor() {
        let opts = TransportOptions::with_ambient_timeout(Duration::from_secs(3));
        assert_eq!(opts.timeout, Duration::from_secs(10));
        let opts = TransportOptions::with_ambient_timeout(Duration::from_secs(60));
        assert_eq!(opts.timeout, Duration::from_secs(60));
        assert_eq!(opts.max_redirects, 3);
        assert!(!opts.follow_redirects);
        assert!(!opts.verify_peer);
    }

    #[test]
    fn test_whitelist() {
        let mut req = ProxyRequest::get("http://a/");
        req.set_headers([("Accept", "*/*"), ("Cookie", "c"), ("X-Keep", "1")]);
        req.retain_headers(&["x_keep"]);
        assert!(req.header("Cookie").is_none());
        assert_eq!(req.header("X-Keep"), Some("1"));
        assert_eq!(req.header("accept"), Some("*/*"));
    }
}
