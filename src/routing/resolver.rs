//! Backend resolution.
//!
//! # Responsibilities
//! - Obtain a raw backend per request (balancer or static backend)
//! - Normalize and validate it into an absolute URL
//! - Build the destination URL for this request (scheme family, mount path)
//!
//! # Design Decisions
//! - Resolution runs on every request; balancer output is never cached
//! - The static backend is normalized once at construction so a bad
//!   configuration fails before traffic is served

use std::fmt;
use std::sync::Arc;

use axum::http::request::Parts;
use url::Url;

use crate::error::ProxyError;
use crate::http::websocket::is_websocket;
use crate::load_balancer::Balancer;
use crate::routing::url::{http_scheme, join_paths, normalize_url, validate_url, websocket_scheme};

/// Where raw backend strings come from.
#[derive(Clone)]
pub enum BackendSource {
    /// A strategy queried per request.
    Balancer(Arc<dyn Balancer>),
    /// A single, already normalized backend URL.
    Static(String),
}

impl fmt::Debug for BackendSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendSource::Balancer(b) => f.debug_tuple("Balancer").field(&b.name()).finish(),
            BackendSource::Static(url) => f.debug_tuple("Static").field(url).finish(),
        }
    }
}

/// Resolves the destination URL of each request.
#[derive(Debug, Clone)]
pub struct BackendResolver {
    source: BackendSource,
}

impl BackendResolver {
    /// Create a resolver from exactly one of a balancer or a static backend.
    pub fn new(
        balancer: Option<Arc<dyn Balancer>>,
        backend: Option<String>,
    ) -> Result<Self, ProxyError> {
        let backend = backend.filter(|b| !b.is_empty());

        let source = match (balancer, backend) {
            (Some(_), Some(_)) => return Err(ProxyError::ConflictingBackend),
            (None, None) => return Err(ProxyError::MissingBackend),
            (Some(balancer), None) => BackendSource::Balancer(balancer),
            (None, Some(raw)) => {
                let normalized = normalize_url(&raw);
                if normalized.is_empty() {
                    return Err(ProxyError::InvalidUrl(raw));
                }
                validate_url(&normalized)?;
                BackendSource::Static(normalized)
            }
        };

        Ok(Self { source })
    }

    pub fn source(&self) -> &BackendSource {
        &self.source
    }

    /// Select, normalize and validate the backend for this request.
    pub fn backend_host(&self, request: &Parts) -> Result<Url, ProxyError> {
        let raw = match &self.source {
            BackendSource::Balancer(balancer) => balancer.select(request)?,
            BackendSource::Static(backend) => backend.clone(),
        };

        let normalized = normalize_url(&raw);
        if normalized.is_empty() {
            return Err(ProxyError::InvalidUrl(raw));
        }
        validate_url(&normalized)?;

        Ok(Url::parse(&normalized)?)
    }

    /// Full destination URL for this request.
    pub fn resolve(&self, request: &Parts) -> Result<Url, ProxyError> {
        let host = self.backend_host(request)?;
        full_backend_url(request, &host)
    }
}

/// Build the destination for `request` relative to a backend base URL.
///
/// The backend path acts as a mount prefix for the request path. The scheme
/// is taken from the WebSocket family for upgrade requests.
pub fn full_backend_url(request: &Parts, host: &Url) -> Result<Url, ProxyError> {
    let scheme = if is_websocket(&request.headers) {
        websocket_scheme(host.scheme())
    } else {
        http_scheme(host.scheme())
    };

    let mut destination = host.clone();
    destination
        .set_scheme(scheme)
        .map_err(|_| ProxyError::InvalidUrl(host.to_string()))?;
    destination.set_path(&join_paths(host.path(), request.uri.path()));

    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::{test_parts, RoundRobin};
    use axum::http::Request;

    fn ws_parts(path: &str) -> Parts {
        let (parts, _) = Request::builder()
            .uri(path)
            .header("upgrade", "WebSocket")
            .header("connection", "Upgrade")
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn static_backend_joins_request_path() {
        let resolver = BackendResolver::new(None, Some("example.com".into())).unwrap();
        let url = resolver.resolve(&test_parts("/a/b")).unwrap();
        assert_eq!(url.as_str(), "http://example.com/a/b");
        assert_eq!(url.path(), "/a/b");
    }

    #[test]
    fn backend_path_is_a_mount_prefix() {
        let resolver = BackendResolver::new(None, Some("example.com/api".into())).unwrap();
        let url = resolver.resolve(&test_parts("/a")).unwrap();
        assert_eq!(url.path(), "/api/a");
    }

    #[test]
    fn websocket_requests_get_ws_schemes() {
        let resolver = BackendResolver::new(None, Some("https://example.com:8443".into())).unwrap();
        let url = resolver.resolve(&ws_parts("/chat")).unwrap();
        assert_eq!(url.as_str(), "wss://example.com:8443/chat");

        let resolver = BackendResolver::new(None, Some("ws://10.0.0.5:9000".into())).unwrap();
        let url = resolver.resolve(&test_parts("/plain")).unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.5:9000/plain");
    }

    #[test]
    fn balancer_output_is_resolved_per_request() {
        let balancer: Arc<dyn Balancer> = Arc::new(RoundRobin::new(vec![
            "10.0.0.1:8080".into(),
            "10.0.0.2:8080".into(),
        ]));
        let resolver = BackendResolver::new(Some(balancer), None).unwrap();

        let first = resolver.resolve(&test_parts("/x")).unwrap();
        let second = resolver.resolve(&test_parts("/x")).unwrap();
        assert_eq!(first.as_str(), "http://10.0.0.1:8080/x");
        assert_eq!(second.as_str(), "http://10.0.0.2:8080/x");
    }

    #[test]
    fn balancer_errors_propagate() {
        let balancer: Arc<dyn Balancer> = Arc::new(RoundRobin::new(Vec::new()));
        let resolver = BackendResolver::new(Some(balancer), None).unwrap();
        assert!(matches!(
            resolver.resolve(&test_parts("/")),
            Err(ProxyError::EmptyBalancerPool { .. })
        ));
    }

    #[test]
    fn invalid_balancer_output_is_rejected() {
        let balancer: Arc<dyn Balancer> =
            Arc::new(|_: &Parts| -> Result<String, ProxyError> { Ok("https://".into()) });
        let resolver = BackendResolver::new(Some(balancer), None).unwrap();
        assert!(matches!(
            resolver.resolve(&test_parts("/")),
            Err(ProxyError::InvalidUrl(_))
        ));
    }

    #[test]
    fn construction_requires_exactly_one_source() {
        assert!(matches!(
            BackendResolver::new(None, None),
            Err(ProxyError::MissingBackend)
        ));
        assert!(matches!(
            BackendResolver::new(None, Some(String::new())),
            Err(ProxyError::MissingBackend)
        ));
        assert!(matches!(
            BackendResolver::new(None, Some("http://".into())),
            Err(ProxyError::InvalidUrl(_))
        ));

        let balancer: Arc<dyn Balancer> = Arc::new(RoundRobin::new(vec!["a".into()]));
        assert!(matches!(
            BackendResolver::new(Some(balancer), Some("example.com".into())),
            Err(ProxyError::ConflictingBackend)
        ));
    }
}
