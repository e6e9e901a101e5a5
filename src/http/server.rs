//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy and admin handlers
//! - Wire up middleware (request ID, tracing, timeout)
//! - Select a backend per request and forward to it
//! - Report each forwarded request's outcome to the selector
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::GatewayConfig;
use crate::http::error::GatewayError;
use crate::http::request::{forward_path, read_body, upstream_headers, upstream_uri};
use crate::http::response::from_upstream;
use crate::load_balancer::{BackendSelector, Selection};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub selector: Arc<BackendSelector>,
    pub client: Client<HttpConnector, Body>,
    pub upstream_timeout: Duration,
    pub max_body_size: usize,
    pub server_errors_are_failures: bool,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a server forwarding through `selector`.
    pub fn new(config: GatewayConfig, selector: Arc<BackendSelector>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            selector,
            client,
            upstream_timeout: Duration::from_secs(config.timeouts.request_secs),
            max_body_size: config.limits.max_body_size,
            server_errors_are_failures: config.circuit_breaker.server_errors_are_failures,
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/v1/proxy/{service}", any(proxy_handler))
            .route("/v1/proxy/{service}/{*path}", any(proxy_handler));

        if config.admin.enabled {
            router = router.merge(admin::router());
        }

        // The handler bounds body buffering and the upstream call by request_secs each.
        let inbound_timeout = Duration::from_secs(config.timeouts.request_secs + config.timeouts.connect_secs);

        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(inbound_timeout)),
        )
    }

    /// The configured router, for serving or driving directly.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            services = self.config.services.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ProxyPath {
    service: String,
}

/// Main proxy handler.
/// Selects a backend for the service, forwards the request, reports the outcome.
async fn proxy_handler(
    State(state): State<AppState>,
    Path(ProxyPath { service }): Path<ProxyPath>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().clone();
    let method_str = method.to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        service = %service,
        path = %request.uri().path(),
        "Proxying request"
    );

    let (parts, body) = request.into_parts();
    let body = match read_body(body, state.max_body_size, state.upstream_timeout).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(request_id = %request_id, error = %err, "Failed to read request body");
            metrics::record_request(&service, &method_str, err.status().as_u16(), start_time);
            return err.into_response();
        }
    };

    // 1. Select Backend
    let selection = match state.selector.select(&service) {
        Ok(selection) => selection,
        Err(e) => {
            tracing::warn!(request_id = %request_id, service = %service, error = %e, "Backend selection failed");
            let err = GatewayError::from(e);
            metrics::record_request(&service, &method_str, err.status().as_u16(), start_time);
            return err.into_response();
        }
    };
    let backend = selection.url().to_string();

    // 2. Build upstream request
    let uri = match upstream_uri(selection.url(), forward_path(parts.uri.path()), parts.uri.query()) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, backend = %backend, error = %e, "Invalid upstream URI");
            state.selector.report_failure(selection);
            let err = GatewayError::Upstream(e.to_string());
            metrics::record_request(&service, &method_str, err.status().as_u16(), start_time);
            return err.into_response();
        }
    };

    let mut upstream = Request::new(Body::from(body));
    *upstream.method_mut() = method;
    *upstream.uri_mut() = uri;
    *upstream.headers_mut() = upstream_headers(&parts.headers);

    tracing::info!(request_id = %request_id, service = %service, backend = %backend, uri = %upstream.uri(), "Forwarding request");

    // 3. Forward. Detached so the outcome is reported even if the inbound
    // timeout drops this handler.
    let exchange = Exchange {
        request_id,
        service,
        backend,
        method: method_str,
        start_time,
    };
    match tokio::spawn(forward(state, selection, upstream, exchange)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Forwarding task failed");
            GatewayError::Upstream(e.to_string()).into_response()
        }
    }
}

/// Per-request context carried into the forwarding task.
struct Exchange {
    request_id: String,
    service: String,
    backend: String,
    method: String,
    start_time: Instant,
}

/// Send `upstream` to the selected backend and report the outcome.
async fn forward(state: AppState, selection: Selection, upstream: Request<Body>, exchange: Exchange) -> Response {
    let Exchange {
        request_id,
        service,
        backend,
        method,
        start_time,
    } = exchange;

    match tokio::time::timeout(state.upstream_timeout, state.client.request(upstream)).await {
        Ok(Ok(response)) => {
            let status = response.status();
            let failed = state.server_errors_are_failures
                && matches!(
                    status,
                    StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
                );
            if failed {
                tracing::warn!(request_id = %request_id, backend = %backend, status = %status, "Backend reported unavailability");
                state.selector.report_failure(selection);
            } else {
                state.selector.report_success(selection);
            }

            tracing::debug!(request_id = %request_id, backend = %backend, status = %status, "Upstream responded");
            metrics::record_request(&service, &method, status.as_u16(), start_time);
            from_upstream(response)
        }
        Ok(Err(e)) => {
            tracing::error!(request_id = %request_id, backend = %backend, error = %e, "Upstream error");
            state.selector.report_failure(selection);
            let err = GatewayError::Upstream(e.to_string());
            metrics::record_request(&service, &method, err.status().as_u16(), start_time);
            err.into_response()
        }
        Err(_) => {
            tracing::error!(request_id = %request_id, backend = %backend, "Upstream timeout");
            state.selector.report_failure(selection);
            let err = GatewayError::UpstreamTimeout(state.upstream_timeout.as_secs());
            metrics::record_request(&service, &method, err.status().as_u16(), start_time);
            err.into_response()
        }
    }
}
