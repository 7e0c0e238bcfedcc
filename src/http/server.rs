//! HTTP server setup and the gateway pipeline.
//!
//! # Responsibilities
//! - Build the gateway and management routers with their middleware
//! - Serve both listeners until shutdown
//! - Run every gateway request through identify → admit → dispatch → forward
//! - Forward requests to the selected backend and stream the response back
//! - Hold the backend's connection slot until the response body completes

use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, Version},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::config::ProxyConfig;
use crate::error::LbError;
use crate::health::HealthMonitor;
use crate::http::request::{
    client_identity, propagate_request_id_layer, request_id, set_request_id_layer,
};
use crate::lifecycle::Shutdown;
use crate::load_balancer::backend::{target_uri, BackendConnectionGuard};
use crate::load_balancer::{BackendPool, Dispatcher};
use crate::observability::metrics;
use crate::security::headers::{append_forwarded_for, strip_hop_by_hop};
use crate::security::{ClientEntry, LimiterConfig, RateLimiter};
use crate::storage::{ClientRecord, ClientStore};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub limiter: Arc<RateLimiter>,
    pub store: Arc<dyn ClientStore>,
    pub client: Client<HttpConnector, Body>,
}

/// The balancer's two HTTP surfaces: the gateway and the management API.
pub struct HttpServer {
    state: AppState,
    config: ProxyConfig,
}

impl HttpServer {
    /// Build the pool, limiter and HTTP client from `config`.
    ///
    /// Must be called inside a Tokio runtime so the limiter can start its
    /// refill worker.
    pub fn new(config: ProxyConfig, store: Arc<dyn ClientStore>) -> Result<Self, LbError> {
        let pool = BackendPool::new(
            &config.backends.endpoints,
            config.backends.strategy,
            Duration::from_secs(config.health_check.interval_secs),
        )?;
        let limiter = RateLimiter::new(LimiterConfig::from(&config.rate_limit));
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            dispatcher: Arc::new(Dispatcher::new(Arc::new(pool))),
            limiter: Arc::new(limiter),
            store,
            client,
        };

        Ok(Self { state, config })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Every path and method is handled by the gateway pipeline.
    pub fn proxy_router(&self) -> Router {
        let router = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(self.state.clone());
        with_http_layers(router)
    }

    pub fn admin_router(&self) -> Router {
        let router =
            crate::admin::setup_admin_router(self.state.clone(), self.config.admin.max_body_size);
        with_http_layers(router)
    }

    /// Serve both listeners until `shutdown` fires.
    ///
    /// The health monitor is started first; the limiter's refill worker is
    /// stopped once both servers have drained.
    pub async fn run(
        self,
        proxy: TcpListener,
        admin: TcpListener,
        shutdown: &Shutdown,
    ) -> Result<(), std::io::Error> {
        tracing::info!(
            proxy = %proxy.local_addr()?,
            admin = %admin.local_addr()?,
            "HTTP server starting"
        );

        let monitor = HealthMonitor::new(
            self.state.dispatcher.pool().clone(),
            self.config.health_check.path.clone(),
        )
        .spawn();

        let mut proxy_signal = shutdown.subscribe();
        let mut admin_signal = shutdown.subscribe();

        let proxy_server = axum::serve(
            proxy,
            self.proxy_router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = proxy_signal.recv().await;
        });
        let admin_server = axum::serve(
            admin,
            self.admin_router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = admin_signal.recv().await;
        });

        let result = tokio::try_join!(proxy_server.into_future(), admin_server.into_future());

        monitor.abort();
        self.state.limiter.stop();
        tracing::info!("HTTP server stopped");

        result.map(|_| ())
    }
}

fn with_http_layers(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id(request)
                )
            }))
            .layer(propagate_request_id_layer()),
    )
}

/// Gateway handler.
/// Provisions the caller, charges its bucket, then forwards to a backend.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let client = client_identity(&peer);

    if let ClientEntry::Created(bucket) = state.limiter.check_and_add_default(&client) {
        metrics::record_client_registered("gateway");
        let record = ClientRecord::new(client.as_str(), bucket);
        if let Err(e) = state.store.record_client(&record).await {
            // the bucket stays; only the durable record is missing
            tracing::error!(client = %client, error = %e, "Failed to persist new client");
            metrics::record_request(500, "none", start);
            return LbError::from(e).into_response();
        }
        tracing::debug!(client = %client, "New client provisioned");
    }

    if !state.limiter.allow(&client) {
        tracing::debug!(client = %client, "Rate limit exceeded");
        metrics::record_rate_limited();
        metrics::record_request(429, "none", start);
        return LbError::RateLimitExceeded.into_response();
    }

    let slot = match state.dispatcher.next_backend() {
        Ok(slot) => slot,
        Err(e) => {
            tracing::warn!(client = %client, "No healthy backends");
            metrics::record_request(503, "none", start);
            return e.into_response();
        }
    };
    let backend = slot.url().clone();

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    match forward(&state.client, &backend, request, peer.ip()).await {
        Ok(response) => {
            metrics::record_request(response.status().as_u16(), backend.as_str(), start);
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, hold_until_complete(body, slot))
        }
        Err(e) => {
            tracing::warn!(
                backend = %backend,
                host = %host,
                error = %e,
                "Upstream request failed"
            );
            metrics::record_request(502, backend.as_str(), start);
            e.into_response()
        }
    }
}

/// Keep the backend's connection slot until `body` ends or is dropped.
fn hold_until_complete(body: Body, slot: BackendConnectionGuard) -> Body {
    let stream = body.into_data_stream().map(move |chunk| {
        let _slot = &slot;
        chunk
    });
    Body::from_stream(stream)
}

/// Send `request` to `backend` and hand back its response, body streamed.
async fn forward(
    client: &Client<HttpConnector, Body>,
    backend: &Url,
    request: Request<Body>,
    client_ip: IpAddr,
) -> Result<Response, LbError> {
    let (mut parts, body) = request.into_parts();

    parts.uri = target_uri(backend, parts.uri.path(), parts.uri.query())
        .map_err(|e| LbError::Upstream(format!("invalid upstream uri: {e}")))?;
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    append_forwarded_for(&mut parts.headers, client_ip);

    let response = client
        .request(Request::from_parts(parts, body))
        .await
        .map_err(|e| LbError::Upstream(e.to_string()))?;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}
