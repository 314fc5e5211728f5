//! Proxy core.
//!
//! # Data Flow
//! ```text
//! ProxyOptions
//!     → Proxy::new (validate retries and backend source once)
//!
//! Per HTTP attempt (driven by the replay middleware):
//!     → resolve (routing::resolver: balancer or static backend)
//!     → rewrite (routing::rewrite or a custom Rewriter)
//!     → forward.rs (hyper client, response streamed into the sink)
//!
//! Per WebSocket upgrade:
//!     → http::websocket (resolve + rewrite, then relay frames)
//! ```
//!
//! # Design Decisions
//! - A built proxy is immutable; configuration reloads build a new one
//! - Resolution failures answer `502` so the attempt counts as failed
//! - The proxy knows nothing about retries; the middleware owns them
//! - `https` and `wss` backends share one rustls client configuration

pub mod forward;
pub mod tls;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{request::Parts, Request};
use url::Url;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::load_balancer::{build_balancer, Balancer};
use crate::replay::{ReplayHandler, ReplayMiddleware, ResponseSink, DEFAULT_BODY_LIMIT};
use crate::resilience::retries::RetryPolicy;
use crate::routing::{default_rewriter, BackendResolver, Rewriter};

pub use forward::{bad_gateway, strip_hop_by_hop, HttpForwarder};

/// Construction options for a [`Proxy`].
#[derive(Clone)]
pub struct ProxyOptions {
    /// Attempts per request, at least 1.
    pub retries: u32,
    /// Wait after each failed attempt.
    pub retry_period: Duration,
    /// Per-request backend selection. Mutually exclusive with `backend`.
    pub balancer: Option<Arc<dyn Balancer>>,
    /// Fixed backend URL. Mutually exclusive with `balancer`.
    pub backend: Option<String>,
    pub rewriter: Rewriter,
    /// Largest request body captured for replay.
    pub body_limit: usize,
    /// TLS for `https`/`wss` backends. Defaults to the bundled web roots.
    pub tls: Option<Arc<rustls::ClientConfig>>,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            retries: 1,
            retry_period: Duration::from_millis(100),
            balancer: None,
            backend: None,
            rewriter: default_rewriter(),
            body_limit: DEFAULT_BODY_LIMIT,
            tls: None,
        }
    }
}

impl ProxyOptions {
    /// Proxy with a fixed backend.
    pub fn with_backend(backend: impl Into<String>) -> Self {
        Self {
            backend: Some(backend.into()),
            ..Self::default()
        }
    }

    /// Proxy selecting a backend per request.
    pub fn with_balancer(balancer: Arc<dyn Balancer>) -> Self {
        Self {
            balancer: Some(balancer),
            ..Self::default()
        }
    }

    /// Options described by a loaded configuration file.
    pub fn from_config(config: &ProxyConfig) -> Self {
        let upstream = &config.upstream;
        Self {
            retries: upstream.retries,
            retry_period: Duration::from_millis(upstream.retry_period_ms),
            balancer: upstream
                .balancer
                .as_ref()
                .map(|b| build_balancer(b.strategy, b.hosts.clone())),
            backend: upstream.backend.clone(),
            rewriter: default_rewriter(),
            body_limit: config.security.max_body_size,
            tls: None,
        }
    }
}

/// Immutable reverse proxy: resolves, rewrites and forwards requests.
#[derive(Clone)]
pub struct Proxy {
    resolver: BackendResolver,
    rewriter: Rewriter,
    policy: RetryPolicy,
    body_limit: usize,
    forwarder: HttpForwarder,
    tls: Arc<rustls::ClientConfig>,
}

impl Proxy {
    pub fn new(options: ProxyOptions) -> Result<Self, ProxyError> {
        let policy = RetryPolicy::new(options.retries, options.retry_period)
            .map_err(|e| ProxyError::InvalidRetryConfig(e.0))?;
        let resolver = BackendResolver::new(options.balancer, options.backend)?;
        let tls = match options.tls {
            Some(tls) => tls,
            None => tls::client_config()?,
        };

        Ok(Self {
            resolver,
            rewriter: options.rewriter,
            policy,
            body_limit: options.body_limit,
            forwarder: HttpForwarder::new(tls.clone()),
            tls,
        })
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn resolver(&self) -> &BackendResolver {
        &self.resolver
    }

    /// TLS settings used when dialing `https` and `wss` backends.
    pub fn tls(&self) -> &Arc<rustls::ClientConfig> {
        &self.tls
    }

    /// Destination for `request`, computed fresh on every call.
    pub fn resolve(&self, request: &Parts) -> Result<Url, ProxyError> {
        self.resolver.resolve(request)
    }

    /// Point `request` at `destination` with the configured rewriter.
    pub fn rewrite(&self, request: &mut Parts, destination: &Url) {
        (self.rewriter)(request, destination)
    }

    /// Wrap the proxy in a replay middleware using its own retry policy.
    pub fn into_middleware(self) -> ReplayMiddleware<Proxy> {
        let (policy, body_limit) = (self.policy, self.body_limit);
        ReplayMiddleware::new(policy, self).with_body_limit(body_limit)
    }
}

#[async_trait]
impl ReplayHandler for Proxy {
    async fn serve(&self, request: Request<Body>, sink: &mut dyn ResponseSink) {
        let (mut parts, body) = request.into_parts();

        let destination = match self.resolve(&parts) {
            Ok(destination) => destination,
            Err(e) => {
                tracing::warn!(uri = %parts.uri, error = %e, "Failed to resolve backend");
                bad_gateway(sink);
                return;
            }
        };

        self.rewrite(&mut parts, &destination);
        tracing::debug!(destination = %destination, "Forwarding request");
        self.forwarder
            .forward(Request::from_parts(parts, body), sink)
            .await;
    }
}
