//! HTTP front controller.
//!
//! # Responsibilities
//! - Create the axum Router with a catch-all handler
//! - Capture each inbound request into an [`InboundSnapshot`]
//! - Dispatch to the mount owning the path and forward exactly once
//! - Relay the completed response, streaming the body

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::error::ProxyResult;
use crate::frontend::mounts::MountTable;
use crate::frontend::response::into_http_response;
use crate::http::request::InboundSnapshot;
use crate::pipeline::InboundSource;

/// Inbound bodies larger than this are rejected with `413`.
pub const MAX_INBOUND_BODY: usize = 64 * 1024 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub mounts: Arc<MountTable>,
    pub local_port: Option<u16>,
}

/// One captured request, handed to the pipeline on first use.
struct CapturedRequest(Mutex<Option<InboundSnapshot>>);

impl InboundSource for CapturedRequest {
    fn snapshot(&self) -> Option<InboundSnapshot> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Front controller for the configured mounts.
pub struct ProxyServer {
    mounts: Arc<MountTable>,
}

impl ProxyServer {
    pub fn new(config: &ProxyConfig) -> ProxyResult<Self> {
        Ok(Self {
            mounts: Arc::new(MountTable::from_config(config)?),
        })
    }

    pub fn router(&self, local_port: Option<u16>) -> Router {
        let state = AppState {
            mounts: self.mounts.clone(),
            local_port,
        };
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr: SocketAddr = listener.local_addr()?;
        tracing::info!(address = %addr, mounts = self.mounts.len(), "Front controller starting");

        let app = self.router(Some(addr.port()));
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Front controller stopped");
        Ok(())
    }
}

async fn snapshot(request: Request<Body>, local_port: Option<u16>) -> Result<InboundSnapshot, StatusCode> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, MAX_INBOUND_BODY)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;

    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()));

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    Ok(InboundSnapshot {
        method: Some(parts.method.as_str().to_string()),
        target: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
        host,
        port: local_port,
        headers,
        body,
        form: None,
    })
}

/// Dispatch to the owning mount and forward once.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let path = request.uri().path().to_string();

    let Some(mount) = state.mounts.resolve(&path) else {
        tracing::warn!(path = %path, "No mount matched");
        return (StatusCode::NOT_FOUND, "No matching mount").into_response();
    };

    let captured = match snapshot(request, state.local_port).await {
        Ok(captured) => captured,
        Err(status) => return status.into_response(),
    };
    tracing::debug!(mount = %mount.name, path = %path, "Dispatching request");

    let source = Arc::new(CapturedRequest(Mutex::new(Some(captured))));
    match mount.pipeline.clone().with_source(source).forward(None).await {
        Ok(resp) => into_http_response(resp).await,
        Err(e) => {
            tracing::error!(mount = %mount.name, error = %e, "Forward failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use tower::ServiceExt;

    fn server() -> ProxyServer {
        let config = parse_config(
            r#"
            [[mounts]]
            name = "strict"
            path_prefix = "/strict"
            origin = "http://127.0.0.1:1/base"
            strict = true
            "#,
        )
        .unwrap();
        ProxyServer::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_unmatched_path_is_not_found() {
        let response = server()
            .router(None)
            .oneshot(Request::get("/elsewhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_bad_gateway() {
        let response = server()
            .router(None)
            .oneshot(
                Request::get("/strict/x")
                    .header("host", "front.local")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_snapshot_capture() {
        let request = Request::post("/a/b?c=1")
            .header("host", "front.local:8443")
            .header("x-custom", "v")
            .body(Body::from("payload"))
            .unwrap();
        let snap = snapshot(request, Some(8080)).await.unwrap();
        assert_eq!(snap.method.as_deref(), Some("POST"));
        assert_eq!(snap.target, "/a/b?c=1");
        assert_eq!(snap.host.as_deref(), Some("front.local:8443"));
        assert_eq!(snap.port, Some(8080));
        assert_eq!(&snap.body[..], b"payload");
        assert!(snap.headers.iter().any(|(k, v)| k == "x-custom" && v == "v"));
    }

    #[test]
    fn test_captured_request_taken_once() {
        let source = CapturedRequest(Mutex::new(Some(InboundSnapshot::default())));
        assert!(source.snapshot().is_some());
        assert!(source.snapshot().is_none());
    }
}
