//! Replayable request snapshot.

use axum::body::Body;
use axum::http::{header, uri::Authority, HeaderMap, Method, Request, Uri, Version};
use bytes::Bytes;

use crate::error::ProxyError;

/// Immutable blueprint of an inbound request.
///
/// The body is drained once at capture time; every call to
/// [`request`](Self::request) builds an independent copy.
#[derive(Debug, Clone)]
pub struct Target {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
}

impl Target {
    /// Drain `request` into a target, reading at most `limit` body bytes.
    pub async fn capture(request: Request<Body>, limit: usize) -> Result<Self, ProxyError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, limit)
            .await
            .map_err(|e| ProxyError::BodyReadFailed(e.to_string()))?;

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Build a fresh request equivalent to the captured one.
    ///
    /// For absolute URIs a captured `Host` header overrides the authority.
    pub fn request(&self) -> Result<Request<Body>, ProxyError> {
        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(self.request_uri())
            .version(self.version)
            .body(Body::from(self.body.clone()))?;

        *request.headers_mut() = self.headers.clone();
        Ok(request)
    }

    fn request_uri(&self) -> Uri {
        let Some(host) = self.headers.get(header::HOST) else {
            return self.uri.clone();
        };
        if self.uri.scheme().is_none() {
            return self.uri.clone();
        }

        let Ok(authority) = Authority::try_from(host.as_bytes()) else {
            tracing::debug!(host = ?host, "Ignoring unparsable Host header");
            return self.uri.clone();
        };

        let mut parts = self.uri.clone().into_parts();
        parts.authority = Some(authority);
        Uri::from_parts(parts).unwrap_or_else(|_| self.uri.clone())
    }
}
