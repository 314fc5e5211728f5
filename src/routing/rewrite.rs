//! Outbound request rewriting.

use std::sync::Arc;

use axum::http::{header, request::Parts, HeaderValue, Uri};
use url::Url;

/// Adjusts an outbound request so it targets a resolved destination.
pub type Rewriter = Arc<dyn Fn(&mut Parts, &Url) + Send + Sync>;

/// The rewriter used when none is configured.
pub fn default_rewriter() -> Rewriter {
    Arc::new(rewrite_request)
}

/// Point `request` at `destination`.
///
/// Scheme, authority and path come from the destination, the inbound query
/// string is kept and the `Host` header is set to the destination authority.
/// Method, other headers and body are left alone.
pub fn rewrite_request(request: &mut Parts, destination: &Url) {
    let authority = authority(destination);

    let path_and_query = match request.uri.query() {
        Some(query) => format!("{}?{}", destination.path(), query),
        None => destination.path().to_string(),
    };

    match Uri::builder()
        .scheme(destination.scheme())
        .authority(authority.as_str())
        .path_and_query(path_and_query)
        .build()
    {
        Ok(uri) => request.uri = uri,
        Err(e) => {
            tracing::warn!(destination = %destination, error = %e, "Failed to rewrite request uri");
            return;
        }
    }

    if let Ok(host) = HeaderValue::from_str(&authority) {
        request.headers.insert(header::HOST, host);
    }
}

/// `host[:port]` of a URL, with IPv6 hosts bracketed.
pub fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}
