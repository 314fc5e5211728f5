//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Dispatch WebSocket upgrades to the relay, everything else to the
//!   replay middleware
//! - Swap in a new proxy when the configuration changes
//! - Serve until the shutdown signal
//!
//! # Design Decisions
//! - The current proxy lives in an `ArcSwap`; every request loads it once
//!   and keeps that instance until it completes
//! - Replay runs in its own task writing into a streaming sink; the client
//!   response starts as soon as a successful attempt writes its head
//! - A request that cannot be captured gets a response whose body fails, so
//!   the connection is torn down instead of reporting success
//! - If the client gives up before a head arrives, the replay task is
//!   cancelled so no further attempts reach the backend

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::Response,
    routing::any,
    Router,
};
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::request::{append_forwarded_for, request_id, MakeRequestUuid};
use crate::http::websocket::{is_websocket, proxy_upgrade};
use crate::observability::metrics;
use crate::proxy::{Proxy, ProxyOptions};
use crate::replay::{ChannelSink, ReplayMiddleware};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub middleware: Arc<ArcSwap<ReplayMiddleware<Proxy>>>,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a server proxying as described by `config`.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let proxy = Proxy::new(ProxyOptions::from_config(&config))?;
        Ok(Self::with_middleware(config, proxy.into_middleware()))
    }

    /// Create a server around a prepared middleware.
    ///
    /// Only `listener` and `timeouts` are read from `config`.
    pub fn with_middleware(config: ProxyConfig, middleware: ReplayMiddleware<Proxy>) -> Self {
        let state = AppState {
            middleware: Arc::new(ArcSwap::from_pointee(middleware)),
        };
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The router, for driving the server without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Build a proxy from `config` and make it serve all new requests.
    pub fn apply_config(&self, config: &ProxyConfig) -> Result<(), ProxyError> {
        apply_config(&self.state.middleware, config)
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let current = self.state.middleware.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                if let Err(e) = apply_config(&current, &config) {
                    tracing::error!(error = %e, "Rejected reloaded configuration");
                }
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn apply_config(
    current: &ArcSwap<ReplayMiddleware<Proxy>>,
    config: &ProxyConfig,
) -> Result<(), ProxyError> {
    let proxy = Proxy::new(ProxyOptions::from_config(config))?;
    current.store(Arc::new(proxy.into_middleware()));
    tracing::info!(
        attempts = config.upstream.retries,
        retry_period_ms = config.upstream.retry_period_ms,
        "Proxy configuration reloaded"
    );
    Ok(())
}

/// Main proxy handler.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let request_id = request_id(request.headers()).to_string();

    append_forwarded_for(request.headers_mut(), peer.ip());
    let middleware = state.middleware.load_full();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
        "Proxying request"
    );

    if is_websocket(request.headers()) {
        let response = proxy_upgrade(middleware.handler(), request).await;
        metrics::record_request(method.as_str(), response.status().as_u16(), start_time);
        return response;
    }

    let (mut sink, pending) = ChannelSink::new();
    let task_request_id = request_id.clone();
    let task = ReplayTask::spawn(async move {
        match middleware.serve(request, &mut sink).await {
            Ok(plays) => {
                tracing::debug!(
                    request_id = %task_request_id,
                    attempts = plays.len(),
                    "Request served"
                );
                sink.finish();
            }
            Err(e) => {
                tracing::warn!(request_id = %task_request_id, error = %e, "Aborting request");
            }
        }
    });

    let response = match pending.into_response().await {
        Some(response) => response,
        None => aborted_response(),
    };
    // The head is out; the task keeps streaming the body.
    task.detach();

    metrics::record_request(method.as_str(), response.status().as_u16(), start_time);
    response
}

/// Replay task for one request, cancelled if the client stops waiting for
/// the response head (timeout or disconnect).
struct ReplayTask(Option<JoinHandle<()>>);

impl ReplayTask {
    fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(Some(tokio::spawn(task)))
    }

    fn detach(mut self) {
        self.0.take();
    }
}

impl Drop for ReplayTask {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

/// Response whose body errors immediately, tearing down the connection.
fn aborted_response() -> Response {
    let body = Body::from_stream(futures_util::stream::once(async {
        Err::<Bytes, _>(io::Error::other("request could not be captured for replay"))
    }));
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
}
